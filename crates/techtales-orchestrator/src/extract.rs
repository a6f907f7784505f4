//! Structured-response extraction.
//!
//! Language models asked for JSON tend to wrap it in prose or Markdown code
//! fences. [`extract`] recovers the first value of the requested [`Shape`]:
//! fenced regions are tried first, then the raw text is scanned for a
//! balanced bracket span. String literals are opaque to the scanner, so
//! brackets inside them never end a span early.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, TechTalesError};

/// Matches a fenced code block with an optional language tag.
#[allow(clippy::unwrap_used)] // literal pattern
static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[ \t]*[A-Za-z0-9_+.\-]*[ \t]*\r?\n?(.*?)```").unwrap());

/// The kind of JSON value a caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A `{ ... }` value.
    Object,
    /// A `[ ... ]` value.
    Array,
}

impl Shape {
    const fn open(self) -> u8 {
        match self {
            Self::Object => b'{',
            Self::Array => b'[',
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Object => write!(f, "object"),
            Self::Array => write!(f, "array"),
        }
    }
}

/// A value recovered from model text, with the byte range it occupied.
///
/// For fenced values the range covers the whole fence, markers included.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// The parsed value.
    pub value: Value,
    /// Byte range of the source text the value came from.
    pub range: Range<usize>,
}

/// Recovers the first value of `shape` from raw model text.
///
/// # Errors
///
/// Returns `MalformedResponse` when no balanced span of the requested shape
/// parses as JSON.
pub fn extract(raw: &str, shape: Shape) -> Result<Value> {
    locate(raw, shape)
        .map(|found| found.value)
        .ok_or_else(|| TechTalesError::malformed(format!("no parseable JSON {shape} found")))
}

/// Like [`extract`], then deserializes the value into `T`.
pub fn extract_as<T: DeserializeOwned>(raw: &str, shape: Shape) -> Result<T> {
    let value = extract(raw, shape)?;
    serde_json::from_value(value)
        .map_err(|e| TechTalesError::malformed(format!("unexpected {shape} layout: {e}")))
}

/// Finds the first value of `shape` and where it sits in `raw`.
pub fn locate(raw: &str, shape: Shape) -> Option<Extraction> {
    for fence in FENCE.captures_iter(raw) {
        let (Some(whole), Some(interior)) = (fence.get(0), fence.get(1)) else {
            continue;
        };
        let found = parse_exact(interior.as_str(), shape)
            .or_else(|| scan(interior.as_str(), shape).map(|e| e.value));
        if let Some(value) = found {
            return Some(Extraction {
                value,
                range: whole.range(),
            });
        }
    }

    scan(raw, shape)
}

/// Parses `text` as a whole, accepting it only if it has the right shape.
fn parse_exact(text: &str, shape: Shape) -> Option<Value> {
    serde_json::from_str::<Value>(text.trim())
        .ok()
        .filter(|value| shape.matches(value))
}

/// Scans for balanced spans opening with the shape's delimiter and returns
/// the first one that parses.
fn scan(text: &str, shape: Shape) -> Option<Extraction> {
    let bytes = text.as_bytes();
    let open = shape.open();
    let mut from = 0;

    while let Some(offset) = bytes[from..].iter().position(|&b| b == open) {
        let start = from + offset;
        if let Some(end) = balanced_end(bytes, start) {
            if let Some(value) = parse_exact(&text[start..end], shape) {
                return Some(Extraction {
                    value,
                    range: start..end,
                });
            }
        }
        from = start + 1;
    }

    None
}

/// Returns the exclusive end of the bracket span opening at `start`, or
/// `None` if it is unbalanced or closed by the wrong delimiter.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
