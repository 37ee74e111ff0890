//! # kiosk-printer
//!
//! Bitmap printing library for unattended print kiosks.
//!
//! ## Scope
//!
//! This crate handles HOW a file becomes paper:
//! - text decoding with an encoding fallback chain
//! - word-wrapped text rendering onto a template image (emoji shortcodes,
//!   emoji glyphs via font fallback)
//! - alpha flattening and "cover" cropping to the page
//! - Windows GDI printing, full-bleed (optional preview output elsewhere)
//!
//! Deciding WHAT to print (watching storage, dedup, retries) lives in
//! `kiosk-watch`.
//!
//! ## Example
//!
//! ```ignore
//! use kiosk_printer::{BitmapPrinter, FontStack, PreviewPrinter, PrintJob, TextRegion, TextRenderer};
//!
//! let fonts = FontStack::load(None, None, 24.0)?;
//! let renderer = TextRenderer::from_template_file(
//!     "src/A5-front.png".as_ref(),
//!     fonts,
//!     TextRegion::default(),
//!     30.0,
//! )?;
//! let page = kiosk_printer::flatten_rgba(&renderer.render("Hello 👋"));
//!
//! let printer = PreviewPrinter::new("previews")?;
//! printer.submit(&page, &PrintJob::new("hello.txt"))?;
//! ```

mod bitmap;
mod encoding;
mod error;
mod font;
mod gdi;
mod layout;
mod printer;
mod render;
mod shortcode;

// Re-exports
pub use bitmap::{CropRect, cover_crop, crop_to_page, flatten_on_white, flatten_rgba, to_bgra};
pub use encoding::{Decoded, LOSSY_UTF8, TextEncoding, Undecodable, UnknownEncoding, decode_text, is_plausible_text};
pub use error::{PrintError, PrintResult, RenderError, RenderResult};
pub use font::{DEFAULT_FONT_SIZE, FontStack};
pub use gdi::GdiPrinter;
pub use layout::{TextLayout, TextMeasure, TextRegion, layout_text, line_spacing, wrap_text};
pub use printer::{BitmapPrinter, PaperSize, PreviewPrinter, PrintJob, is_virtual_port};
pub use render::{DEFAULT_LINE_HEIGHT, TextComposer, TextRenderer};
pub use shortcode::expand_shortcodes;

#[cfg(windows)]
pub use printer::WindowsPrinter;
