//! Text: canonical wide text, encoding classification and transcoding.
//!
//! Every payload that reaches the output sink is first normalized into
//! [`WideText`], a sequence of UTF-16 code units. The classifier guesses the
//! encoding of undeclared buffers and the transcoder performs the conversion.

pub mod classify;
pub mod transcode;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use classify::{classify, is_text_unicode, Evidence, TextClass, UnicodeVerdict};
pub use transcode::{encoding_for, transcode};

/// Byte-order mark as a UTF-16 code unit.
pub const BOM: u16 = 0xFEFF;

/// Declared encoding of a raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// No usable declaration; transcodes as a byte-per-unit widen.
    #[default]
    Unknown,
    /// Single-byte legacy text.
    Ansi,
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// Canonical text: UTF-16 code units in native order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WideText(Vec<u16>);

impl WideText {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_units(units: Vec<u16>) -> Self {
        Self(units)
    }

    pub fn as_units(&self) -> &[u16] {
        &self.0
    }

    pub(crate) fn units_mut(&mut self) -> &mut Vec<u16> {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push_str(&mut self, s: &str) {
        self.0.extend(s.encode_utf16());
    }

    pub fn push_wide(&mut self, other: &WideText) {
        self.0.extend_from_slice(&other.0);
    }

    pub fn starts_with_bom(&self) -> bool {
        self.0.first() == Some(&BOM)
    }

    /// Remove one leading byte-order mark, if present.
    pub fn strip_bom(&mut self) {
        if self.starts_with_bom() {
            self.0.remove(0);
        }
    }

    /// Encode as UTF-8. Unpaired surrogates become U+FFFD.
    pub fn to_utf8(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }
}

impl From<&str> for WideText {
    fn from(s: &str) -> Self {
        Self(s.encode_utf16().collect())
    }
}

impl From<String> for WideText {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl fmt::Display for WideText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_utf8())
    }
}

/// Normalize a raw buffer into canonical text.
///
/// With no declared encoding the classifier picks one. A single leading
/// byte-order mark is dropped so it never reaches an output line; the
/// lossless form is available from [`transcode`] directly.
pub fn decode(bytes: &[u8], declared: Option<Encoding>) -> WideText {
    let encoding = declared.unwrap_or_else(|| encoding_for(classify(bytes)));
    let mut text = transcode(bytes, encoding);
    text.strip_bom();
    text
}
