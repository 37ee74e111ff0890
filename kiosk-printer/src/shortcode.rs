//! Emoji shortcode expansion (`:smile:` -> 😄)
//!
//! Names come from the gemoji table shipped with the `emojis` crate. A
//! token must not touch a letter or digit on either side, so times and
//! `key:value:pairs` are left alone.

use std::borrow::Cow;

/// Replace every known `:name:` with its emoji; unknown tokens stay literal
pub fn expand_shortcodes(text: &str) -> Cow<'_, str> {
    if !text.contains(':') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    // Last character already emitted, for the left boundary check
    let mut prev: Option<char> = None;
    let mut changed = false;

    while let Some(start) = rest.find(':') {
        let before = rest[..start].chars().next_back().or(prev);
        let after_open = &rest[start + 1..];

        if let Some(end) = after_open.find(':') {
            let name = &after_open[..end];
            let tail = &after_open[end + 1..];
            if !before.is_some_and(char::is_alphanumeric)
                && !tail.chars().next().is_some_and(char::is_alphanumeric)
                && is_shortcode_name(name)
                && let Some(emoji) = emojis::get_by_shortcode(name)
            {
                out.push_str(&rest[..start]);
                out.push_str(emoji.as_str());
                prev = emoji.as_str().chars().next_back();
                rest = tail;
                changed = true;
                continue;
            }
        }

        // Keep the colon; it may still open the next token
        out.push_str(&rest[..=start]);
        prev = Some(':');
        rest = after_open;
    }

    if !changed {
        return Cow::Borrowed(text);
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn is_shortcode_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-'))
}
