//! Text decoding for uploaded text files
//!
//! Uploaded notes arrive in whatever encoding the sender's device used.
//! Decoding walks a prioritized chain:
//! - BOM sniffing (UTF-8 / UTF-16LE / UTF-16BE)
//! - each configured encoding, strictly (no replacement characters)
//! - lossy UTF-8 as a raw best-effort fallback
//!
//! Every candidate must also look like text (no control characters other
//! than tab, newline, carriage return and form feed). When nothing
//! qualifies the caller gets [`Undecodable`].

use std::fmt;
use std::str::FromStr;

use encoding_rs::Encoding;
use thiserror::Error;
use tracing::{debug, instrument};

/// A named character encoding usable in the decode chain
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding(&'static Encoding);

impl TextEncoding {
    pub fn utf_8() -> Self {
        Self(encoding_rs::UTF_8)
    }

    pub fn windows_1251() -> Self {
        Self(encoding_rs::WINDOWS_1251)
    }

    pub fn utf_16le() -> Self {
        Self(encoding_rs::UTF_16LE)
    }

    /// Canonical (WHATWG) name of the encoding
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Default priority: UTF-8, then Cyrillic Windows, then UTF-16LE
    pub fn default_chain() -> Vec<Self> {
        vec![Self::utf_8(), Self::windows_1251(), Self::utf_16le()]
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown encoding label
#[derive(Debug, Error)]
#[error("Unknown encoding label: {0}")]
pub struct UnknownEncoding(pub String);

impl FromStr for TextEncoding {
    type Err = UnknownEncoding;

    /// Accepts any WHATWG label (`utf-8`, `cp1251`, `utf-16le`, `koi8-r`, ...)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Encoding::for_label(s.trim().as_bytes())
            .map(Self)
            .ok_or_else(|| UnknownEncoding(s.to_string()))
    }
}

/// Content that no decoder in the chain accepted
#[derive(Debug, Error)]
#[error("Undecodable content ({len} bytes), tried: {}", .tried.join(", "))]
pub struct Undecodable {
    pub len: usize,
    pub tried: Vec<&'static str>,
}

/// Successfully decoded text and the decoder that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static str,
}

/// Name reported when the lossy fallback produced the text
pub const LOSSY_UTF8: &str = "lossy-utf-8";

/// Decode raw bytes to text, trying `chain` in order
#[instrument(skip(bytes, chain), fields(len = bytes.len()))]
pub fn decode_text(bytes: &[u8], chain: &[TextEncoding]) -> Result<Decoded, Undecodable> {
    let mut tried = Vec::with_capacity(chain.len() + 2);

    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        tried.push(encoding.name());
        if let Some(text) = strict_decode(encoding, &bytes[bom_len..]) {
            debug!(encoding = encoding.name(), "Decoded via BOM");
            return Ok(Decoded {
                text,
                encoding: encoding.name(),
            });
        }
    }

    for candidate in chain {
        tried.push(candidate.name());
        if let Some(text) = strict_decode(candidate.0, bytes) {
            debug!(encoding = candidate.name(), "Decoded text");
            return Ok(Decoded {
                text,
                encoding: candidate.name(),
            });
        }
    }

    tried.push(LOSSY_UTF8);
    let lossy = String::from_utf8_lossy(bytes);
    if is_plausible_text(&lossy) {
        debug!("Decoded text with lossy UTF-8 fallback");
        return Ok(Decoded {
            text: lossy.into_owned(),
            encoding: LOSSY_UTF8,
        });
    }

    Err(Undecodable {
        len: bytes.len(),
        tried,
    })
}

fn strict_decode(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    let text = encoding.decode_without_bom_handling_and_without_replacement(bytes)?;
    is_plausible_text(&text).then(|| text.into_owned())
}

/// Text may only carry layout controls (tab, newline, CR, form feed)
pub fn is_plausible_text(s: &str) -> bool {
    !s.chars()
        .any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\u{0c}'))
}
