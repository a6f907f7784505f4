//! Procedural diagram synthesis.
//!
//! A visual cue is classified into an [`Archetype`] by keyword and drawn
//! offline onto a fixed-size canvas, then encoded as PNG. Synthesis never
//! fails: drawing errors and panics fall back to the generic placeholder,
//! and if even that cannot be drawn a 1x1 PNG is returned.

mod archetype;
mod canvas;
mod font;

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

pub use archetype::Archetype;
pub use canvas::Canvas;

use archetype::BACKGROUND;

use crate::config::DiagramConfig;
use crate::lesson::DiagramImage;

/// A 1x1 PNG used when no diagram can be drawn at all.
const FALLBACK_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Errors raised while drawing a single diagram.
///
/// These never leave the synthesizer.
#[derive(Debug, thiserror::Error)]
pub enum DiagramError {
    /// The canvas has a zero dimension.
    #[error("cannot draw on a {width}x{height} canvas")]
    EmptyCanvas {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// The archetype's layout does not fit the canvas.
    #[error("layout does not fit: {0}")]
    Layout(String),

    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// A renderer panicked.
    #[error("{0} renderer panicked")]
    Panicked(Archetype),
}

/// Turns visual cues into PNG diagrams.
#[derive(Debug, Clone, Copy)]
pub struct DiagramSynthesizer {
    config: DiagramConfig,
}

impl Default for DiagramSynthesizer {
    fn default() -> Self {
        Self::new(DiagramConfig::default())
    }
}

impl DiagramSynthesizer {
    /// Creates a synthesizer drawing on canvases of the configured size.
    #[must_use]
    pub const fn new(config: DiagramConfig) -> Self {
        Self { config }
    }

    /// Draws the diagram for `cue`.
    ///
    /// Same cue, same image.
    #[must_use]
    pub fn synthesize(&self, cue: &str) -> DiagramImage {
        let archetype = Archetype::classify(cue);
        match self.render(archetype, cue) {
            Ok(bytes) => {
                debug!(%archetype, bytes = bytes.len(), "Diagram synthesized");
                DiagramImage::new(bytes)
            }
            Err(e) => {
                warn!(%archetype, error = %e, "Diagram failed; using placeholder");
                self.placeholder(cue)
            }
        }
    }

    /// Draws the generic placeholder for `cue`.
    #[must_use]
    pub fn placeholder(&self, cue: &str) -> DiagramImage {
        match self.render(Archetype::Generic, cue) {
            Ok(bytes) => DiagramImage::new(bytes),
            Err(e) => {
                warn!(error = %e, "Placeholder failed; using blank image");
                fallback_image()
            }
        }
    }

    /// Renders one archetype and encodes it, catching renderer panics.
    ///
    /// # Errors
    ///
    /// Returns a [`DiagramError`] if drawing or encoding fails.
    pub fn render(&self, archetype: Archetype, cue: &str) -> Result<Vec<u8>, DiagramError> {
        let DiagramConfig { width, height } = self.config;
        catch_unwind(AssertUnwindSafe(|| {
            let mut canvas = Canvas::new(width, height, BACKGROUND)?;
            archetype.render(&mut canvas, cue)?;
            canvas.encode_png()
        }))
        .unwrap_or(Err(DiagramError::Panicked(archetype)))
    }
}

fn fallback_image() -> DiagramImage {
    DiagramImage::from_base64(FALLBACK_PNG).unwrap_or_else(|_| DiagramImage::new(Vec::new()))
}
