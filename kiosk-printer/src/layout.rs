//! Word-wrap layout for text templates
//!
//! Pure layout math, independent of the rasterizer: anything that can
//! measure a string's advance width in pixels can drive it.

use std::str::FromStr;

use crate::error::RenderError;

/// Measures the rendered advance width of a single line
pub trait TextMeasure {
    fn measure(&self, text: &str) -> f32;
}

/// Rectangle on the template that receives the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TextRegion {
    /// Build from top-left and bottom-right corners
    pub fn from_corners(left: u32, top: u32, right: u32, bottom: u32) -> Option<Self> {
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        })
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Check that the region lies inside a `width` x `height` image
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width && self.bottom() <= height
    }
}

impl Default for TextRegion {
    /// The A5 badge template: (52,140) to (776,960)
    fn default() -> Self {
        Self {
            x: 52,
            y: 140,
            width: 724,
            height: 820,
        }
    }
}

impl FromStr for TextRegion {
    type Err = RenderError;

    /// Parses `left,top,right,bottom`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RenderError::InvalidRegion(format!("{s}: {e}")))?;

        match parts.as_slice() {
            [left, top, right, bottom] => Self::from_corners(*left, *top, *right, *bottom)
                .ok_or_else(|| RenderError::InvalidRegion(format!("{s}: empty rectangle"))),
            _ => Err(RenderError::InvalidRegion(format!(
                "{s}: expected left,top,right,bottom"
            ))),
        }
    }
}

/// Wrapped lines plus the spacing that makes them fit vertically
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<String>,
    pub line_height: f32,
}

impl TextLayout {
    /// Top y coordinate of every line that still fits inside the region
    pub fn placed_lines<'a>(
        &'a self,
        region: &TextRegion,
    ) -> impl Iterator<Item = (f32, &'a str)> + 'a {
        let top = region.y as f32;
        let bottom = region.bottom() as f32;
        let line_height = self.line_height;
        self.lines
            .iter()
            .enumerate()
            .map(move |(i, line)| (top + i as f32 * line_height, line.as_str()))
            .take_while(move |(y, _)| y + line_height <= bottom + 0.5)
    }
}

/// Wrap `text` into the region and pick the line spacing
pub fn layout_text(
    text: &str,
    region: &TextRegion,
    base_line_height: f32,
    measure: &impl TextMeasure,
) -> TextLayout {
    let lines = wrap_text(text, region.width as f32, measure);
    let line_height = line_spacing(lines.len(), base_line_height, region.height as f32);
    TextLayout { lines, line_height }
}

/// Greedy word wrap
///
/// A word joins the running line while the measured width stays within
/// `max_width`. Source newlines always break. A single word wider than the
/// region gets a line of its own. Blank source lines produce no output
/// line.
pub fn wrap_text(text: &str, max_width: f32, measure: &impl TextMeasure) -> Vec<String> {
    let mut lines = Vec::new();

    for source_line in text.lines() {
        let mut current = String::new();
        let mut words = source_line.split_whitespace().peekable();

        if words.peek().is_none() {
            continue;
        }

        for word in words {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }

            let candidate = format!("{current} {word}");
            if measure.measure(&candidate) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }

        lines.push(current);
    }

    lines
}

/// Shrink spacing (never the font) when the lines overflow the region
pub fn line_spacing(line_count: usize, base_line_height: f32, region_height: f32) -> f32 {
    if line_count == 0 {
        return base_line_height;
    }
    let total = line_count as f32 * base_line_height;
    if total > region_height {
        base_line_height.min(region_height / line_count as f32)
    } else {
        base_line_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every word is exactly half of `width`, spaces are free
    struct HalfWidthWords {
        width: f32,
    }

    impl TextMeasure for HalfWidthWords {
        fn measure(&self, text: &str) -> f32 {
            text.split_whitespace().count() as f32 * self.width / 2.0
        }
    }

    /// One pixel per character
    struct Monospace;

    impl TextMeasure for Monospace {
        fn measure(&self, text: &str) -> f32 {
            text.chars().count() as f32
        }
    }

    #[test]
    fn test_two_half_words_per_line() {
        let measure = HalfWidthWords { width: 100.0 };
        let lines = wrap_text("alpha beta gamma", 100.0, &measure);
        assert_eq!(lines, vec!["alpha beta", "gamma"]);
    }

    #[test]
    fn test_newline_forces_break() {
        let lines = wrap_text("hi\nthere", 100.0, &Monospace);
        assert_eq!(lines, vec!["hi", "there"]);
    }

    #[test]
    fn test_blank_lines_dropped() {
        assert_eq!(wrap_text("one\n\n\ntwo", 100.0, &Monospace), vec!["one", "two"]);
        assert_eq!(wrap_text("one\n \t\ntwo\n\n", 100.0, &Monospace), vec!["one", "two"]);
        assert!(wrap_text("\n\n", 100.0, &Monospace).is_empty());
    }

    #[test]
    fn test_blank_lines_do_not_shrink_spacing() {
        let region = TextRegion::from_corners(0, 0, 10, 60).unwrap();
        let layout = layout_text("a\n\n\n\nb", &region, 30.0, &Monospace);
        assert_eq!(layout.lines, vec!["a", "b"]);
        assert_eq!(layout.line_height, 30.0);
    }

    #[test]
    fn test_overlong_word_gets_own_line() {
        let lines = wrap_text("a verylongword b", 5.0, &Monospace);
        assert_eq!(lines, vec!["a", "verylongword", "b"]);
    }

    #[test]
    fn test_crlf_and_collapsed_spaces() {
        let lines = wrap_text("a   b\r\nc", 100.0, &Monospace);
        assert_eq!(lines, vec!["a b", "c"]);
    }

    #[test]
    fn test_spacing_shrinks_only_on_overflow() {
        assert_eq!(line_spacing(10, 30.0, 820.0), 30.0);
        assert_eq!(line_spacing(41, 20.0, 820.0), 20.0);
        assert_eq!(line_spacing(41, 30.0, 820.0), 20.0);
        assert_eq!(line_spacing(0, 30.0, 820.0), 30.0);
    }

    #[test]
    fn test_placed_lines_stay_inside_region() {
        let region = TextRegion::from_corners(0, 0, 10, 90).unwrap();
        let layout = layout_text(&"x\n".repeat(5), &region, 30.0, &Monospace);
        assert_eq!(layout.line_height, 18.0);
        let placed: Vec<_> = layout.placed_lines(&region).collect();
        assert_eq!(placed.len(), 5);
        assert_eq!(placed[4].0, 72.0);
    }

    #[test]
    fn test_region_parse() {
        let region: TextRegion = "52,140,776,960".parse().unwrap();
        assert_eq!(region, TextRegion::default());
        assert!("10,10,5,20".parse::<TextRegion>().is_err());
        assert!("1,2,3".parse::<TextRegion>().is_err());
    }
}
