//! Raster drawing surface for diagrams.
//!
//! All primitives clip to the canvas, so off-canvas coordinates are safe.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};

use super::font::{self, ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};
use super::DiagramError;

/// An RGB drawing surface.
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    /// Creates a canvas filled with `background`.
    ///
    /// # Errors
    ///
    /// Returns `DiagramError::EmptyCanvas` if either dimension is zero.
    pub fn new(width: u32, height: u32, background: Rgb<u8>) -> Result<Self, DiagramError> {
        if width == 0 || height == 0 {
            return Err(DiagramError::EmptyCanvas { width, height });
        }
        Ok(Self {
            image: RgbImage::from_pixel(width, height, background),
        })
    }

    /// Canvas width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Canvas height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Reads a pixel, or `None` outside the canvas.
    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb<u8>> {
        let (x, y) = (u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        self.image.get_pixel_checked(x, y).copied()
    }

    fn put(&mut self, x: i32, y: i32, color: Rgb<u8>) {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };
        if let Some(pixel) = self.image.get_pixel_mut_checked(x, y) {
            *pixel = color;
        }
    }

    /// Fills an axis-aligned rectangle.
    pub fn fill_rect(&mut self, x: i32, y: i32, width: i32, height: i32, color: Rgb<u8>) {
        for py in y..y.saturating_add(height) {
            for px in x..x.saturating_add(width) {
                self.put(px, py, color);
            }
        }
    }

    /// Draws a rectangle outline growing inwards by `thickness`.
    pub fn stroke_rect(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        thickness: i32,
        color: Rgb<u8>,
    ) {
        let t = thickness.max(1).min(width).min(height);
        self.fill_rect(x, y, width, t, color);
        self.fill_rect(x, y + height - t, width, t, color);
        self.fill_rect(x, y, t, height, color);
        self.fill_rect(x + width - t, y, t, height, color);
    }

    /// Fills an ellipse centred on `(cx, cy)`.
    pub fn fill_ellipse(&mut self, cx: i32, cy: i32, rx: i32, ry: i32, color: Rgb<u8>) {
        if rx <= 0 || ry <= 0 {
            return;
        }
        for dy in -ry..=ry {
            let t = f64::from(dy) / f64::from(ry);
            let half = (f64::from(rx) * (1.0 - t * t).max(0.0).sqrt()).round() as i32;
            for dx in -half..=half {
                self.put(cx + dx, cy + dy, color);
            }
        }
    }

    /// Draws an ellipse outline `thickness` pixels wide, inside the radii.
    pub fn stroke_ellipse(
        &mut self,
        cx: i32,
        cy: i32,
        rx: i32,
        ry: i32,
        thickness: i32,
        color: Rgb<u8>,
    ) {
        if rx <= 0 || ry <= 0 {
            return;
        }
        let (outer_x, outer_y) = (f64::from(rx) + 0.5, f64::from(ry) + 0.5);
        let inner_x = (f64::from(rx - thickness) + 0.5).max(0.0);
        let inner_y = (f64::from(ry - thickness) + 0.5).max(0.0);

        for dy in -ry..=ry {
            for dx in -rx..=rx {
                let (fx, fy) = (f64::from(dx), f64::from(dy));
                let outside_inner = inner_x <= 0.0
                    || inner_y <= 0.0
                    || (fx / inner_x).powi(2) + (fy / inner_y).powi(2) > 1.0;
                let inside_outer = (fx / outer_x).powi(2) + (fy / outer_y).powi(2) <= 1.0;
                if inside_outer && outside_inner {
                    self.put(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// Draws a line with a square brush of side `thickness` (Bresenham).
    pub fn line(&mut self, from: (i32, i32), to: (i32, i32), thickness: i32, color: Rgb<u8>) {
        let (mut x, mut y) = from;
        let (x1, y1) = to;
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let t = thickness.max(1);
        let offset = t / 2;

        loop {
            self.fill_rect(x - offset, y - offset, t, t, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Draws `text` with its top-left corner at `(x, y)`.
    pub fn text(&mut self, x: i32, y: i32, text: &str, scale: u32, color: Rgb<u8>) {
        let scale = scale.max(1) as i32;
        let mut pen_x = x;
        for c in text.chars() {
            let glyph = font::glyph(c);
            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                        self.fill_rect(
                            pen_x + col as i32 * scale,
                            y + row as i32 * scale,
                            scale,
                            scale,
                            color,
                        );
                    }
                }
            }
            pen_x += ADVANCE as i32 * scale;
        }
    }

    /// Draws `text` horizontally centred on `cx` and vertically on `cy`.
    pub fn text_centered(&mut self, cx: i32, cy: i32, text: &str, scale: u32, color: Rgb<u8>) {
        let width = font::text_width(text, scale) as i32;
        let height = (GLYPH_HEIGHT * scale.max(1)) as i32;
        self.text(cx - width / 2, cy - height / 2, text, scale, color);
    }

    /// Encodes the canvas as PNG.
    ///
    /// # Errors
    ///
    /// Returns `DiagramError::Encode` if the encoder fails.
    pub fn encode_png(&self) -> Result<Vec<u8>, DiagramError> {
        let mut bytes = Cursor::new(Vec::new());
        self.image.write_to(&mut bytes, ImageFormat::Png)?;
        Ok(bytes.into_inner())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    fn canvas() -> Canvas {
        Canvas::new(40, 30, WHITE).unwrap()
    }

    #[test]
    fn test_zero_size_is_rejected() {
        assert!(matches!(
            Canvas::new(0, 10, WHITE),
            Err(DiagramError::EmptyCanvas { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut c = canvas();
        c.fill_rect(-5, -5, 10, 10, RED);
        assert_eq!(c.pixel(0, 0), Some(RED));
        assert_eq!(c.pixel(4, 4), Some(RED));
        assert_eq!(c.pixel(5, 5), Some(WHITE));
        c.fill_rect(35, 25, 100, 100, RED);
        assert_eq!(c.pixel(39, 29), Some(RED));
        assert_eq!(c.pixel(40, 0), None);
    }

    #[test]
    fn test_stroke_rect_leaves_interior() {
        let mut c = canvas();
        c.stroke_rect(0, 0, 40, 30, 2, RED);
        assert_eq!(c.pixel(0, 0), Some(RED));
        assert_eq!(c.pixel(39, 29), Some(RED));
        assert_eq!(c.pixel(20, 15), Some(WHITE));
    }

    #[test]
    fn test_ellipse_fill_and_stroke() {
        let mut c = canvas();
        c.fill_ellipse(20, 15, 8, 6, RED);
        assert_eq!(c.pixel(20, 15), Some(RED));
        assert_eq!(c.pixel(0, 0), Some(WHITE));

        let mut c = canvas();
        c.stroke_ellipse(20, 15, 10, 10, 2, RED);
        assert_eq!(c.pixel(20, 5), Some(RED));
        assert_eq!(c.pixel(20, 15), Some(WHITE));
    }

    #[test]
    fn test_line_reaches_both_ends() {
        let mut c = canvas();
        c.line((2, 3), (30, 20), 1, RED);
        assert_eq!(c.pixel(2, 3), Some(RED));
        assert_eq!(c.pixel(30, 20), Some(RED));
    }

    #[test]
    fn test_text_marks_pixels() {
        let mut c = canvas();
        c.text(1, 1, "I", 1, RED);
        // Top bar of the I glyph spans columns 1..=3.
        assert_eq!(c.pixel(2, 1), Some(RED));
        assert_eq!(c.pixel(1, 2), Some(WHITE));
    }

    #[test]
    fn test_encode_png_signature() {
        let bytes = canvas().encode_png().unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
