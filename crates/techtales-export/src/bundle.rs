//! Lesson bundles: one directory per lesson with everything needed to read
//! it offline.

use std::fs;
use std::path::{Path, PathBuf};

use techtales_orchestrator::Lesson;

use crate::json::JsonExporter;
use crate::{ExportError, MarkdownExporter, Result};

/// File name of the Markdown document in a bundle.
pub const MARKDOWN_FILE: &str = "lesson.md";

/// File name of the JSON document in a bundle.
pub const JSON_FILE: &str = "lesson.json";

/// File name of the `number`th diagram (1-based).
#[must_use]
pub fn diagram_file_name(number: usize) -> String {
    format!("diagram-{number}.png")
}

/// Files written by [`write_bundle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// The bundle directory.
    pub dir: PathBuf,
    /// Path of `lesson.md`.
    pub markdown: PathBuf,
    /// Path of `lesson.json`.
    pub json: PathBuf,
    /// Diagram paths in visual-cue order.
    pub diagrams: Vec<PathBuf>,
}

impl Bundle {
    /// Every file in the bundle.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        [self.markdown.as_path(), self.json.as_path()]
            .into_iter()
            .chain(self.diagrams.iter().map(PathBuf::as_path))
    }
}

/// Writes `lesson.md`, `lesson.json` and `diagram-<n>.png` into `dir`,
/// creating it if needed. Existing files with the same names are replaced.
///
/// # Errors
///
/// Returns [`ExportError::InvalidData`] if the lesson's diagrams and visual
/// cues are not aligned, or [`ExportError::Io`] if a file cannot be written.
pub fn write_bundle(lesson: &Lesson, dir: &Path) -> Result<Bundle> {
    if lesson.images.len() != lesson.visual_cues.len() {
        return Err(ExportError::InvalidData(format!(
            "{} diagrams for {} visual cues",
            lesson.images.len(),
            lesson.visual_cues.len()
        )));
    }

    fs::create_dir_all(dir)?;

    let markdown = dir.join(MARKDOWN_FILE);
    fs::write(&markdown, MarkdownExporter::new(lesson).generate())?;

    let json = dir.join(JSON_FILE);
    JsonExporter::new(lesson).write_to_file(&json, true)?;

    let mut diagrams = Vec::with_capacity(lesson.images.len());
    for (index, (_, image)) in lesson.figures().enumerate() {
        let path = dir.join(diagram_file_name(index + 1));
        fs::write(&path, image.as_bytes())?;
        diagrams.push(path);
    }

    Ok(Bundle {
        dir: dir.to_path_buf(),
        markdown,
        json,
        diagrams,
    })
}
