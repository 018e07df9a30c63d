//! Transcode: raw bytes plus a declared encoding into [`WideText`].
//!
//! Total over every input. UTF-16 buffers keep a leading byte-order mark
//! as U+FEFF and drop a trailing odd byte; invalid UTF-8 is substituted
//! with U+FFFD; anything single-byte or undeclared is widened byte by byte.

use super::classify::TextClass;
use super::{Encoding, WideText};

/// Convert `bytes` to canonical text according to `encoding`.
pub fn transcode(bytes: &[u8], encoding: Encoding) -> WideText {
    if bytes.is_empty() {
        return WideText::new();
    }

    let units = match encoding {
        Encoding::Utf16Le => reinterpret(bytes),
        Encoding::Utf16Be => {
            let mut units = reinterpret(bytes);
            for unit in units.iter_mut() {
                *unit = unit.swap_bytes();
            }
            units
        }
        Encoding::Utf8 => String::from_utf8_lossy(bytes).encode_utf16().collect(),
        // Not a codepage decode: each byte becomes one code unit.
        Encoding::Ansi | Encoding::Unknown => bytes.iter().map(|&b| u16::from(b)).collect(),
    };

    WideText::from_units(units)
}

/// Declared encoding to use for a classifier result.
pub fn encoding_for(class: TextClass) -> Encoding {
    match class {
        TextClass::Utf8 => Encoding::Utf8,
        TextClass::Utf16Le => Encoding::Utf16Le,
        TextClass::Utf16Be => Encoding::Utf16Be,
        TextClass::Ansi => Encoding::Ansi,
    }
}

/// Byte pairs as little-endian code units.
fn reinterpret(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
