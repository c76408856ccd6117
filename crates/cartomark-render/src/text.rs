//! Glyph rasterization for labels and text annotations.
//!
//! Uses fontdue for per-glyph bitmaps and fontdb to find a system
//! sans-serif face. A missing font is not an error: drawing degrades to
//! skipping glyph output so annotation geometry still works headless.

use cartomark_core::Rgba;
use fontdue::{Font, FontSettings};
use kurbo::Point;
use log::warn;
use tiny_skia::{Pixmap, PremultipliedColorU8};

/// Rasterizes text runs onto pixmaps.
pub struct TextPainter {
    font: Option<Font>,
}

impl Default for TextPainter {
    fn default() -> Self {
        Self::from_system()
    }
}

impl TextPainter {
    /// Create a painter with no font loaded. Glyph output is skipped.
    pub fn empty() -> Self {
        Self { font: None }
    }

    /// Create a painter from raw font bytes (TTF/OTF).
    pub fn from_bytes(data: &[u8]) -> Result<Self, &'static str> {
        let font = Font::from_bytes(data, FontSettings::default())?;
        Ok(Self { font: Some(font) })
    }

    /// Create a painter from the system's default sans-serif face.
    pub fn from_system() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();

        let query = fontdb::Query {
            families: &[fontdb::Family::SansSerif],
            ..fontdb::Query::default()
        };

        let font = db.query(&query).and_then(|id| {
            db.with_face_data(id, |data, index| {
                let settings = FontSettings {
                    collection_index: index,
                    ..FontSettings::default()
                };
                Font::from_bytes(data, settings).ok()
            })
            .flatten()
        });

        if font.is_none() {
            warn!("no system sans-serif font found, text will not be rendered");
        }
        Self { font }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Advance width of a text run at the given pixel size.
    pub fn measure(&self, text: &str, px: f32) -> f32 {
        let Some(font) = &self.font else {
            return 0.0;
        };
        text.chars()
            .filter(|ch| !ch.is_control())
            .map(|ch| font.metrics(ch, px).advance_width)
            .sum()
    }

    /// Draw a text run with its baseline at `origin.y` and its left edge
    /// at `origin.x`.
    pub fn draw(&self, pixmap: &mut Pixmap, text: &str, origin: Point, px: f32, color: Rgba) {
        let Some(font) = &self.font else {
            return;
        };

        let width = pixmap.width() as i32;
        let height = pixmap.height() as i32;
        let baseline = origin.y as i32;
        let mut cursor_x = origin.x as f32;
        let pixels = pixmap.pixels_mut();

        for ch in text.chars() {
            if ch.is_control() {
                continue;
            }

            let (metrics, bitmap) = font.rasterize(ch, px);
            let glyph_x = cursor_x as i32 + metrics.xmin;
            let glyph_y = baseline - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage == 0 {
                        continue;
                    }
                    let x = glyph_x + gx as i32;
                    let y = glyph_y + gy as i32;
                    if x < 0 || y < 0 || x >= width || y >= height {
                        continue;
                    }
                    let idx = (y * width + x) as usize;
                    pixels[idx] = blend_over(pixels[idx], color, coverage);
                }
            }

            cursor_x += metrics.advance_width;
        }
    }
}

/// Source-over blend of a coverage-weighted color onto a premultiplied
/// destination pixel.
fn blend_over(dst: PremultipliedColorU8, color: Rgba, coverage: u8) -> PremultipliedColorU8 {
    let sa = (coverage as f32 / 255.0) * (color.a as f32 / 255.0);
    let inv = 1.0 - sa;

    let sr = color.r as f32 / 255.0 * sa;
    let sg = color.g as f32 / 255.0 * sa;
    let sb = color.b as f32 / 255.0 * sa;

    let a = sa + dst.alpha() as f32 / 255.0 * inv;
    let r = sr + dst.red() as f32 / 255.0 * inv;
    let g = sg + dst.green() as f32 / 255.0 * inv;
    let b = sb + dst.blue() as f32 / 255.0 * inv;

    // Premultiplied channels never exceed alpha.
    let a8 = (a * 255.0).round().clamp(0.0, 255.0) as u8;
    let r8 = ((r * 255.0).round() as u8).min(a8);
    let g8 = ((g * 255.0).round() as u8).min(a8);
    let b8 = ((b * 255.0).round() as u8).min(a8);

    PremultipliedColorU8::from_rgba(r8, g8, b8, a8).unwrap_or(dst)
}
