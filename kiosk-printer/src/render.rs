//! Text-to-template rendering
//!
//! Composes decoded text onto a fixed template image inside a fixed text
//! region. The template is loaded once and cloned for every render, so a
//! rendered artifact is always a fresh bitmap owned by the caller.

use std::path::Path;

use image::{Rgba, RgbaImage};
use tracing::{debug, instrument};

use crate::error::{RenderError, RenderResult};
use crate::font::FontStack;
use crate::layout::{TextRegion, layout_text};
use crate::shortcode::expand_shortcodes;

/// Default distance between line tops, in pixels
pub const DEFAULT_LINE_HEIGHT: f32 = 30.0;

const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Turns text into a printable bitmap
pub trait TextComposer: Send + Sync {
    fn compose(&self, text: &str) -> RenderResult<RgbaImage>;
}

/// Template-based renderer
pub struct TextRenderer {
    template: RgbaImage,
    fonts: FontStack,
    region: TextRegion,
    line_height: f32,
}

impl TextRenderer {
    /// Create a renderer, checking that the region lies on the template
    pub fn new(
        template: RgbaImage,
        fonts: FontStack,
        region: TextRegion,
        line_height: f32,
    ) -> RenderResult<Self> {
        if !region.fits_within(template.width(), template.height()) {
            return Err(RenderError::InvalidRegion(format!(
                "{region:?} exceeds template {}x{}",
                template.width(),
                template.height()
            )));
        }
        if !(line_height.is_finite() && line_height > 0.0) {
            return Err(RenderError::InvalidRegion(format!(
                "line height must be positive, got {line_height}"
            )));
        }

        Ok(Self {
            template,
            fonts,
            region,
            line_height,
        })
    }

    /// Load the template image from disk
    pub fn from_template_file(
        path: &Path,
        fonts: FontStack,
        region: TextRegion,
        line_height: f32,
    ) -> RenderResult<Self> {
        let template = image::open(path)?.to_rgba8();
        debug!(
            path = %path.display(),
            width = template.width(),
            height = template.height(),
            "Template loaded"
        );
        Self::new(template, fonts, region, line_height)
    }

    /// Render `text` onto a copy of the template, shortcodes expanded
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub fn render(&self, text: &str) -> RgbaImage {
        let mut canvas = self.template.clone();
        let text = expand_shortcodes(text);
        let layout = layout_text(&text, &self.region, self.line_height, &self.fonts);

        debug!(
            lines = layout.lines.len(),
            line_height = layout.line_height,
            "Text laid out"
        );

        for (top, line) in layout.placed_lines(&self.region) {
            if line.is_empty() {
                continue;
            }
            self.fonts
                .draw_line(&mut canvas, line, self.region.x as f32, top, TEXT_COLOR);
        }

        canvas
    }
}

impl TextComposer for TextRenderer {
    fn compose(&self, text: &str) -> RenderResult<RgbaImage> {
        Ok(self.render(text))
    }
}
