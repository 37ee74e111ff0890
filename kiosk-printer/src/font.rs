//! Font stack with per-character fallback
//!
//! The primary font covers Latin/Cyrillic text; fallback fonts (usually an
//! emoji font) are consulted only for characters the primary font lacks.
//! All fonts share one pixel size so emoji sit inline with the text.

use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontVec, GlyphId, PxScale, ScaleFont, point};
use image::{Rgba, RgbaImage};
use tracing::{debug, info, warn};

use crate::error::{RenderError, RenderResult};
use crate::layout::TextMeasure;

/// Default pixel size of body text
pub const DEFAULT_FONT_SIZE: f32 = 24.0;

/// Ordered set of fonts rasterized at a single size
pub struct FontStack {
    fonts: Vec<FontVec>,
    scale: PxScale,
}

impl FontStack {
    /// Create a stack from already parsed fonts (primary first)
    pub fn new(fonts: Vec<FontVec>, size: f32) -> RenderResult<Self> {
        if fonts.is_empty() {
            return Err(RenderError::Font("font stack is empty".to_string()));
        }
        Ok(Self {
            fonts,
            scale: PxScale::from(size),
        })
    }

    /// Load the primary font and any fallback fonts
    ///
    /// `primary` falls back to well-known system fonts when `None`. A
    /// missing fallback font only degrades emoji rendering, so it is a
    /// warning rather than an error.
    pub fn load(primary: Option<&Path>, fallback: Option<&Path>, size: f32) -> RenderResult<Self> {
        let primary_path = match primary {
            Some(path) => path.to_path_buf(),
            None => first_existing(&primary_candidates())
                .ok_or_else(|| RenderError::Font("no usable text font found".to_string()))?,
        };
        let mut fonts = vec![read_font(&primary_path)?];
        info!(path = %primary_path.display(), "Loaded text font");

        let fallback_path = match fallback {
            Some(path) => Some(path.to_path_buf()),
            None => first_existing(&fallback_candidates()),
        };
        match fallback_path {
            Some(path) => match read_font(&path) {
                Ok(font) => {
                    info!(path = %path.display(), "Loaded fallback font");
                    fonts.push(font);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Fallback font unusable"),
            },
            None => warn!("No emoji font found, emoji may render as gaps"),
        }

        Self::new(fonts, size)
    }

    pub fn size(&self) -> f32 {
        self.scale.y
    }

    /// Ascent of the primary font, i.e. baseline offset from a line's top
    pub fn ascent(&self) -> f32 {
        self.fonts[0].as_scaled(self.scale).ascent()
    }

    /// Index of the first font that has a glyph for `c`
    fn pick(&self, c: char) -> Option<(usize, GlyphId)> {
        self.fonts.iter().enumerate().find_map(|(idx, font)| {
            let id = font.glyph_id(c);
            (id.0 != 0).then_some((idx, id))
        })
    }

    /// Draw one line with its top-left corner at (`x`, `top`)
    pub fn draw_line(&self, canvas: &mut RgbaImage, text: &str, x: f32, top: f32, color: Rgba<u8>) {
        let baseline = top + self.ascent();
        let mut caret = x;
        let mut prev: Option<(usize, GlyphId)> = None;

        for c in text.chars() {
            let Some((idx, id)) = self.pick(c) else {
                debug!(char = ?c, "No glyph in any font, skipping");
                continue;
            };
            let font = &self.fonts[idx];
            let scaled = font.as_scaled(self.scale);

            if let Some((prev_idx, prev_id)) = prev
                && prev_idx == idx
            {
                caret += scaled.kern(prev_id, id);
            }

            let glyph = id.with_scale_and_position(self.scale, point(caret, baseline));
            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    let px = bounds.min.x as i64 + gx as i64;
                    let py = bounds.min.y as i64 + gy as i64;
                    blend_pixel(canvas, px, py, color, coverage);
                });
            }

            caret += scaled.h_advance(id);
            prev = Some((idx, id));
        }
    }
}

impl TextMeasure for FontStack {
    fn measure(&self, text: &str) -> f32 {
        let mut width = 0.0;
        let mut prev: Option<(usize, GlyphId)> = None;

        for c in text.chars() {
            let Some((idx, id)) = self.pick(c) else {
                continue;
            };
            let scaled = self.fonts[idx].as_scaled(self.scale);
            if let Some((prev_idx, prev_id)) = prev
                && prev_idx == idx
            {
                width += scaled.kern(prev_id, id);
            }
            width += scaled.h_advance(id);
            prev = Some((idx, id));
        }

        width
    }
}

fn blend_pixel(canvas: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= canvas.width() as i64 || y >= canvas.height() as i64 {
        return;
    }
    let coverage = coverage.clamp(0.0, 1.0);
    if coverage <= 0.0 {
        return;
    }

    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    for i in 0..3 {
        let old = dst.0[i] as f32;
        let new = color.0[i] as f32;
        dst.0[i] = (old + (new - old) * coverage).round() as u8;
    }
    dst.0[3] = dst.0[3].max((coverage * 255.0).round() as u8);
}

fn read_font(path: &Path) -> RenderResult<FontVec> {
    let data = std::fs::read(path)?;
    FontVec::try_from_vec(data)
        .map_err(|e| RenderError::Font(format!("{}: {}", path.display(), e)))
}

fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.is_file()).cloned()
}

fn windows_fonts_dir() -> Option<PathBuf> {
    std::env::var_os("WINDIR").map(|dir| PathBuf::from(dir).join("Fonts"))
}

/// Text fonts with good Cyrillic coverage, bundled font first
fn primary_candidates() -> Vec<PathBuf> {
    let mut list = vec![PathBuf::from("src/font/NotoSans-Regular.ttf")];
    if let Some(dir) = windows_fonts_dir() {
        for name in ["segoeui.ttf", "arial.ttf", "times.ttf", "cour.ttf"] {
            list.push(dir.join(name));
        }
    }
    list.extend(
        [
            "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
        ]
        .map(PathBuf::from),
    );
    list
}

/// Outline emoji fonts (bitmap-only color fonts have no outlines to draw)
fn fallback_candidates() -> Vec<PathBuf> {
    let mut list = vec![PathBuf::from("src/font/NotoEmoji-Regular.ttf")];
    if let Some(dir) = windows_fonts_dir() {
        for name in ["seguiemj.ttf", "seguisym.ttf"] {
            list.push(dir.join(name));
        }
    }
    list.push(PathBuf::from(
        "/usr/share/fonts/truetype/noto/NotoEmoji-Regular.ttf",
    ));
    list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stack_rejected() {
        assert!(FontStack::new(Vec::new(), DEFAULT_FONT_SIZE).is_err());
    }

    #[test]
    fn test_missing_primary_font_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.ttf");
        let result = FontStack::load(Some(&missing), None, DEFAULT_FONT_SIZE);
        assert!(matches!(result, Err(RenderError::Io(_))));
    }

    #[test]
    fn test_garbage_font_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        let result = FontStack::load(Some(&path), None, DEFAULT_FONT_SIZE);
        assert!(matches!(result, Err(RenderError::Font(_))));
    }

    #[test]
    fn test_blend_pixel_clips_and_mixes() {
        let mut canvas = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        blend_pixel(&mut canvas, -1, 0, Rgba([0, 0, 0, 255]), 1.0);
        blend_pixel(&mut canvas, 5, 5, Rgba([0, 0, 0, 255]), 1.0);
        blend_pixel(&mut canvas, 1, 1, Rgba([0, 0, 0, 255]), 0.5);
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(canvas.get_pixel(1, 1).0[0], 128);
    }
}
