//! Diagram archetypes: keyword classification and one renderer per variant.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use image::Rgb;

use super::canvas::Canvas;
use super::font;
use super::DiagramError;

/// Repeatable fill palette.
pub const PALETTE: [Rgb<u8>; 7] = [
    Rgb([0x4A, 0x90, 0xE2]),
    Rgb([0x5C, 0xB8, 0x5C]),
    Rgb([0xF0, 0xAD, 0x4E]),
    Rgb([0xD9, 0x53, 0x4F]),
    Rgb([0x9B, 0x59, 0xB6]),
    Rgb([0x5B, 0xC0, 0xDE]),
    Rgb([0x34, 0x49, 0x5E]),
];

/// Canvas background.
pub const BACKGROUND: Rgb<u8> = Rgb([0xFF, 0xFF, 0xFF]);

/// Outline and caption colour.
pub const INK: Rgb<u8> = Rgb([0x2C, 0x3E, 0x50]);

const LABEL: Rgb<u8> = Rgb([0xFF, 0xFF, 0xFF]);

const OSI_LAYERS: [&str; 7] = [
    "Application",
    "Presentation",
    "Session",
    "Transport",
    "Network",
    "Data Link",
    "Physical",
];

const GENERIC_BANDS: usize = 4;
const STORE_UNITS: usize = 3;
const GRAPH_NODES: usize = 5;

type Renderer = fn(&mut Canvas, &str) -> Result<(), DiagramError>;

/// The closed set of diagram templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Archetype {
    /// Horizontal bands stacked top to bottom.
    Layered,
    /// Cylinders suggesting storage units.
    CylindricalStore,
    /// Labelled nodes joined by lines.
    NodeGraph,
    /// Bordered placeholder with the cue text.
    Generic,
}

impl Archetype {
    /// Classification order; the first archetype with a matching keyword wins.
    pub const PRIORITY: [Self; 4] = [
        Self::Layered,
        Self::CylindricalStore,
        Self::NodeGraph,
        Self::Generic,
    ];

    /// Keywords that select this archetype.
    #[must_use]
    pub const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Layered => &["layer", "osi", "stack", "tier"],
            Self::CylindricalStore => &["database", "table", "storage", "disk", "record"],
            Self::NodeGraph => &[
                "network",
                "node",
                "connection",
                "topology",
                "packet",
                "protocol",
            ],
            Self::Generic => &[],
        }
    }

    /// Identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Layered => "layered",
            Self::CylindricalStore => "cylindrical-store",
            Self::NodeGraph => "node-graph",
            Self::Generic => "generic",
        }
    }

    /// Picks the archetype for a cue.
    ///
    /// The cue is lower-cased and searched for each keyword as a substring,
    /// so `multilayer` selects [`Archetype::Layered`].
    #[must_use]
    pub fn classify(cue: &str) -> Self {
        let cue = cue.to_lowercase();
        Self::PRIORITY
            .into_iter()
            .find(|archetype| {
                archetype
                    .keywords()
                    .iter()
                    .any(|keyword| cue.contains(keyword))
            })
            .unwrap_or(Self::Generic)
    }

    const fn renderer(self) -> Renderer {
        match self {
            Self::Layered => render_layered,
            Self::CylindricalStore => render_store,
            Self::NodeGraph => render_graph,
            Self::Generic => render_generic,
        }
    }

    /// Draws this archetype for `cue` onto `canvas`.
    pub fn render(self, canvas: &mut Canvas, cue: &str) -> Result<(), DiagramError> {
        (self.renderer())(canvas, cue)
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text scale that keeps captions legible on the canvas.
fn text_scale(canvas: &Canvas) -> u32 {
    if canvas.height() >= 300 && canvas.width() >= 400 {
        2
    } else {
        1
    }
}

/// Draws the cue as a one-line title, truncated to fit, and returns the
/// y coordinate below it.
fn draw_title(canvas: &mut Canvas, cue: &str, scale: u32) -> i32 {
    let margin = (canvas.height() / 24).max(4) as i32;
    let max_chars = ((canvas.width() as i32 - 2 * margin) / (font::ADVANCE * scale) as i32).max(1) as usize;
    let title: String = if cue.chars().count() > max_chars {
        let keep = max_chars.saturating_sub(3);
        cue.chars().take(keep).chain("...".chars()).collect()
    } else {
        cue.to_string()
    };

    let height = font::line_height(scale) as i32;
    canvas.text_centered(
        canvas.width() as i32 / 2,
        margin + height / 2,
        &title,
        scale,
        INK,
    );
    margin * 2 + height
}

/// Truncates a label to fit `width` pixels at `scale`.
fn fit_label(label: &str, width: i32, scale: u32) -> String {
    let max_chars = (width / (font::ADVANCE * scale) as i32).max(1) as usize;
    label.chars().take(max_chars).collect()
}

fn render_layered(canvas: &mut Canvas, cue: &str) -> Result<(), DiagramError> {
    let lower = cue.to_lowercase();
    let labels: Vec<String> = if lower.contains("osi") {
        OSI_LAYERS.iter().map(ToString::to_string).collect()
    } else {
        (1..=GENERIC_BANDS).map(|i| format!("Layer {i}")).collect()
    };

    let scale = text_scale(canvas);
    let top = draw_title(canvas, cue, scale);
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);
    let margin = (width / 10).max(4);
    let bottom = height - (height / 24).max(4);
    let band_height = (bottom - top) / labels.len() as i32;
    if band_height < 2 {
        return Err(DiagramError::Layout(format!(
            "{} bands do not fit a {width}x{height} canvas",
            labels.len()
        )));
    }

    let band_width = width - 2 * margin;
    let label_scale = if band_height >= (font::line_height(2) as i32 + 6) {
        scale
    } else {
        1
    };
    for (i, label) in labels.iter().enumerate() {
        let y = top + i as i32 * band_height;
        canvas.fill_rect(margin, y, band_width, band_height - 2, PALETTE[i % PALETTE.len()]);
        canvas.stroke_rect(margin, y, band_width, band_height - 2, 1, INK);
        canvas.text_centered(
            width / 2,
            y + (band_height - 2) / 2,
            &fit_label(label, band_width - 8, label_scale),
            label_scale,
            LABEL,
        );
    }
    Ok(())
}

fn render_store(canvas: &mut Canvas, cue: &str) -> Result<(), DiagramError> {
    let scale = text_scale(canvas);
    let top = draw_title(canvas, cue, scale);
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);

    let slot = width / STORE_UNITS as i32;
    let rx = (slot * 3 / 10).max(4);
    let ry = (rx / 3).max(2);
    let caption = font::line_height(scale) as i32 + 8;
    let body_top = top + ry;
    let body_bottom = height - caption - ry - 4;
    if body_bottom - body_top < 4 {
        return Err(DiagramError::Layout(format!(
            "no room for storage units on a {width}x{height} canvas"
        )));
    }

    for i in 0..STORE_UNITS {
        let cx = slot * i as i32 + slot / 2;
        let fill = PALETTE[i % PALETTE.len()];
        canvas.fill_rect(cx - rx, body_top, rx * 2 + 1, body_bottom - body_top, fill);
        canvas.fill_ellipse(cx, body_bottom, rx, ry, fill);
        canvas.stroke_ellipse(cx, body_bottom, rx, ry, 2, INK);
        // Repaint the body over the upper half of the bottom outline.
        canvas.fill_rect(cx - rx + 2, body_bottom - ry, rx * 2 - 3, ry, fill);
        canvas.fill_rect(cx - rx, body_top, 2, body_bottom - body_top, INK);
        canvas.fill_rect(cx + rx - 1, body_top, 2, body_bottom - body_top, INK);
        canvas.fill_ellipse(cx, body_top, rx, ry, lighten(fill));
        canvas.stroke_ellipse(cx, body_top, rx, ry, 2, INK);

        let label = fit_label(&format!("Store {}", i + 1), slot - 4, scale);
        canvas.text_centered(cx, height - caption / 2 - 2, &label, scale, INK);
    }
    Ok(())
}

fn render_graph(canvas: &mut Canvas, cue: &str) -> Result<(), DiagramError> {
    let scale = text_scale(canvas);
    let top = draw_title(canvas, cue, scale);
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);

    let area = (height - top).min(width);
    let node_radius = (area / 10).max(6);
    let orbit = f64::from(area / 2 - node_radius - 4);
    if orbit < f64::from(node_radius) {
        return Err(DiagramError::Layout(format!(
            "no room for {GRAPH_NODES} nodes on a {width}x{height} canvas"
        )));
    }
    let (cx, cy) = (f64::from(width / 2), f64::from(top + (height - top) / 2));

    let nodes: Vec<(i32, i32)> = (0..GRAPH_NODES)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / GRAPH_NODES as f64
                - std::f64::consts::FRAC_PI_2;
            (
                (cx + orbit * angle.cos()).round() as i32,
                (cy + orbit * angle.sin()).round() as i32,
            )
        })
        .collect();

    // Ring plus every second chord.
    for i in 0..GRAPH_NODES {
        canvas.line(nodes[i], nodes[(i + 1) % GRAPH_NODES], 2, INK);
        if i % 2 == 0 {
            canvas.line(nodes[i], nodes[(i + 2) % GRAPH_NODES], 1, INK);
        }
    }

    let label_scale = if node_radius >= 14 { scale } else { 1 };
    for (i, &(x, y)) in nodes.iter().enumerate() {
        canvas.fill_ellipse(x, y, node_radius, node_radius, PALETTE[i % PALETTE.len()]);
        canvas.stroke_ellipse(x, y, node_radius, node_radius, 2, INK);
        canvas.text_centered(x, y, &format!("N{}", i + 1), label_scale, LABEL);
    }
    Ok(())
}

fn render_generic(canvas: &mut Canvas, cue: &str) -> Result<(), DiagramError> {
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);
    let border = (width.min(height) / 64).max(2);
    canvas.stroke_rect(0, 0, width, height, border, PALETTE[0]);

    let scale = text_scale(canvas);
    let text = if cue.trim().is_empty() { "Concept" } else { cue };
    let inner = width - 4 * border - 8;
    let max_chars = (inner / (font::ADVANCE * scale) as i32).max(1) as usize;
    let line_height = font::line_height(scale) as i32 + 4 * scale as i32;
    let max_lines = ((height - 4 * border) / line_height).max(1) as usize;

    let mut lines = font::wrap(text, max_chars);
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let keep = max_chars.saturating_sub(3);
            *last = last.chars().take(keep).chain("...".chars()).collect();
        }
    }

    let block = line_height * lines.len() as i32;
    let first = height / 2 - block / 2 + line_height / 2;
    for (i, line) in lines.iter().enumerate() {
        canvas.text_centered(width / 2, first + i as i32 * line_height, line, scale, INK);
    }
    Ok(())
}

fn lighten(color: Rgb<u8>) -> Rgb<u8> {
    let Rgb([r, g, b]) = color;
    let up = |c: u8| c.saturating_add((255 - c) / 3);
    Rgb([up(r), up(g), up(b)])
}
