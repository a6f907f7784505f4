//! JSON export for finished lessons.
//!
//! The output is the lesson's own serde representation, so it loads back
//! into a [`Lesson`] unchanged. Diagrams appear as base64 strings.
//!
//! # Example
//!
//! ```rust
//! use techtales_export::json::JsonExporter;
//! use techtales_orchestrator::{AgeGroup, Difficulty, Lesson, LessonRequest};
//!
//! let request = LessonRequest::new("Hashing", AgeGroup::Adult, Difficulty::Advanced, 200).unwrap();
//! let lesson = Lesson::assemble(&request, "A story.".to_string(), vec![], vec![], vec![]).unwrap();
//!
//! let compact = JsonExporter::new(&lesson).generate().unwrap();
//! assert!(!compact.contains('\n'));
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use techtales_orchestrator::Lesson;

use crate::{ExportError, Result};

/// Serializes a [`Lesson`] to JSON.
pub struct JsonExporter<'a> {
    lesson: &'a Lesson,
}

impl<'a> JsonExporter<'a> {
    /// Creates an exporter for `lesson`.
    #[must_use]
    pub const fn new(lesson: &'a Lesson) -> Self {
        Self { lesson }
    }

    /// Compact, single-line JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Serialization`] if serialization fails.
    pub fn generate(&self) -> Result<String> {
        serde_json::to_string(self.lesson).map_err(ExportError::from)
    }

    /// Pretty-printed JSON with two-space indentation.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Serialization`] if serialization fails.
    pub fn generate_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self.lesson).map_err(ExportError::from)
    }

    /// Writes the JSON to `path`, replacing any existing file.
    /// Parent directories must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Serialization`] if serialization fails, or
    /// [`ExportError::Io`] if the file cannot be written.
    pub fn write_to_file(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            self.generate_pretty()?
        } else {
            self.generate()?
        };

        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }
}
