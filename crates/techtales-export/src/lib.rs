//! TechTales Lesson Export
//!
//! Turns a finished [`Lesson`](techtales_orchestrator::Lesson) into files a
//! reader can use without the service running.
//!
//! # Exporters
//!
//! - [`MarkdownExporter`] - A readable document: metadata, story, figures and quiz
//! - [`json::JsonExporter`] - The lesson as JSON, compact or pretty-printed
//! - [`write_bundle`] - A directory holding `lesson.md`, `lesson.json` and one PNG per diagram
//!
//! # Example
//!
//! ```rust
//! use techtales_export::MarkdownExporter;
//! use techtales_orchestrator::{AgeGroup, Difficulty, Lesson, LessonRequest};
//!
//! let request = LessonRequest::new("Binary numbers", AgeGroup::Child, Difficulty::Beginner, 200).unwrap();
//! let lesson = Lesson::assemble(&request, "Bits are tiny switches.".to_string(), vec![], vec![], vec![]).unwrap();
//!
//! let markdown = MarkdownExporter::new(&lesson).generate();
//! assert!(markdown.starts_with("# Binary numbers"));
//! ```

mod bundle;
pub mod json;
mod markdown;

pub use bundle::{diagram_file_name, write_bundle, Bundle, JSON_FILE, MARKDOWN_FILE};
pub use markdown::MarkdownExporter;

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while exporting a lesson.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Failed to serialize the lesson to JSON.
    #[error("failed to serialize lesson: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to create or write export files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The lesson cannot be exported as given.
    #[error("invalid lesson data: {0}")]
    InvalidData(String),
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
