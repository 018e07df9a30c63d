//! Classify: strict UTF-8 check first, then a UTF-16 heuristic.
//!
//! The UTF-16 test collects independent pieces of [`Evidence`] (byte-order
//! marks, lane statistics, wide control characters, zero bytes) and then
//! judges them. Statistics alone are weak: short single-byte text such as
//! "this program can break" produces the same lane pattern as UTF-16, so a
//! statistics-only verdict on a short buffer is overridden to "not Unicode".

use std::ops::BitOr;

/// Buffers shorter than this whose only UTF-16 evidence is statistical are
/// treated as single-byte text.
pub const STATISTICS_MIN_LEN: usize = 100;

/// Wide tab, line feed, carriage return and space.
const CONTROL_UNITS: [u16; 4] = [0x0009, 0x000A, 0x000D, 0x0020];

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextClass {
    Utf8,
    Utf16Le,
    Utf16Be,
    /// Single-byte legacy text (or anything the heuristics could not place).
    Ansi,
}

impl TextClass {
    pub fn is_utf16(self) -> bool {
        matches!(self, TextClass::Utf16Le | TextClass::Utf16Be)
    }
}

/// Set of heuristic findings, one bit per test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evidence(u16);

impl Evidence {
    /// Buffer starts with FF FE.
    pub const SIGNATURE: Self = Self(0x0001);
    /// Buffer starts with FE FF.
    pub const REVERSE_SIGNATURE: Self = Self(0x0002);
    /// Every little-endian unit is a non-zero byte followed by a zero byte.
    pub const ASCII16: Self = Self(0x0004);
    pub const REVERSE_ASCII16: Self = Self(0x0008);
    /// High bytes vary far less than low bytes.
    pub const STATISTICS: Self = Self(0x0010);
    pub const REVERSE_STATISTICS: Self = Self(0x0020);
    /// A wide tab, LF, CR or space is present.
    pub const CONTROLS: Self = Self(0x0040);
    pub const REVERSE_CONTROLS: Self = Self(0x0080);
    pub const NULL_BYTES: Self = Self(0x0100);
    pub const ODD_LENGTH: Self = Self(0x0200);
    /// U+FFFE or U+FFFF after the first unit.
    pub const ILLEGAL_CHARS: Self = Self(0x0400);

    const DISQUALIFYING: Self = Self(Self::ODD_LENGTH.0 | Self::ILLEGAL_CHARS.0);
    const STATISTICAL: Self = Self(Self::STATISTICS.0 | Self::REVERSE_STATISTICS.0);
    const FORWARD: Self = Self(Self::ASCII16.0 | Self::STATISTICS.0 | Self::CONTROLS.0);
    const REVERSE_STRUCTURAL: Self = Self(Self::REVERSE_ASCII16.0 | Self::REVERSE_CONTROLS.0);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// True when every finding is a statistics finding.
    pub const fn is_statistical_only(self) -> bool {
        !self.is_empty() && Self::STATISTICAL.contains(self)
    }
}

impl BitOr for Evidence {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Result of [`is_text_unicode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnicodeVerdict {
    pub is_unicode: bool,
    /// Only meaningful when `is_unicode` is set.
    pub big_endian: bool,
    pub evidence: Evidence,
}

impl UnicodeVerdict {
    fn not_unicode(evidence: Evidence) -> Self {
        Self { is_unicode: false, big_endian: false, evidence }
    }

    fn unicode(evidence: Evidence, big_endian: bool) -> Self {
        Self { is_unicode: true, big_endian, evidence }
    }
}

/// Classify a raw buffer as UTF-8, UTF-16 or single-byte text.
///
/// Anything that decodes as strict UTF-8 (the empty buffer included) is
/// UTF-8; only the remainder is put through the UTF-16 heuristic.
pub fn classify(bytes: &[u8]) -> TextClass {
    if std::str::from_utf8(bytes).is_ok() {
        return TextClass::Utf8;
    }

    let verdict = is_text_unicode(bytes);
    match (verdict.is_unicode, verdict.big_endian) {
        (true, false) => TextClass::Utf16Le,
        (true, true) => TextClass::Utf16Be,
        (false, _) => TextClass::Ansi,
    }
}

/// UTF-16 heuristic with the short-buffer statistics override applied.
pub fn is_text_unicode(bytes: &[u8]) -> UnicodeVerdict {
    let evidence = collect_evidence(bytes);
    let verdict = judge(evidence);

    if verdict.is_unicode && evidence.is_statistical_only() && bytes.len() < STATISTICS_MIN_LEN {
        return UnicodeVerdict::not_unicode(evidence);
    }
    verdict
}

fn collect_evidence(bytes: &[u8]) -> Evidence {
    let mut evidence = Evidence::empty();
    if bytes.len() < 2 {
        return evidence;
    }

    if bytes.len() % 2 != 0 {
        evidence.insert(Evidence::ODD_LENGTH);
    }
    match (bytes[0], bytes[1]) {
        (0xFF, 0xFE) => evidence.insert(Evidence::SIGNATURE),
        (0xFE, 0xFF) => evidence.insert(Evidence::REVERSE_SIGNATURE),
        _ => {}
    }
    if bytes.contains(&0) {
        evidence.insert(Evidence::NULL_BYTES);
    }

    let mut ascii16 = true;
    let mut reverse_ascii16 = true;
    let mut lo_delta: u64 = 0;
    let mut hi_delta: u64 = 0;
    let mut previous: Option<(u8, u8)> = None;

    for (index, pair) in bytes.chunks_exact(2).enumerate() {
        let (lo, hi) = (pair[0], pair[1]);
        let unit = u16::from_le_bytes([lo, hi]);

        ascii16 &= hi == 0 && lo != 0;
        reverse_ascii16 &= lo == 0 && hi != 0;

        if CONTROL_UNITS.contains(&unit) {
            evidence.insert(Evidence::CONTROLS);
        }
        if CONTROL_UNITS.contains(&unit.swap_bytes()) {
            evidence.insert(Evidence::REVERSE_CONTROLS);
        }
        if index > 0 && (unit == 0xFFFE || unit == 0xFFFF) {
            evidence.insert(Evidence::ILLEGAL_CHARS);
        }

        if let Some((prev_lo, prev_hi)) = previous {
            lo_delta += u64::from(lo.abs_diff(prev_lo));
            hi_delta += u64::from(hi.abs_diff(prev_hi));
        }
        previous = Some((lo, hi));
    }

    if ascii16 {
        evidence.insert(Evidence::ASCII16);
    }
    if reverse_ascii16 {
        evidence.insert(Evidence::REVERSE_ASCII16);
    }
    // Needs at least two units to have any deltas at all.
    if bytes.len() >= 4 {
        if hi_delta * 3 < lo_delta {
            evidence.insert(Evidence::STATISTICS);
        }
        if lo_delta * 3 < hi_delta {
            evidence.insert(Evidence::REVERSE_STATISTICS);
        }
    }

    evidence
}

fn judge(evidence: Evidence) -> UnicodeVerdict {
    if evidence.is_empty() || evidence.intersects(Evidence::DISQUALIFYING) {
        return UnicodeVerdict::not_unicode(evidence);
    }
    if evidence.contains(Evidence::SIGNATURE) {
        return UnicodeVerdict::unicode(evidence, false);
    }
    if evidence.contains(Evidence::REVERSE_SIGNATURE) {
        return UnicodeVerdict::unicode(evidence, true);
    }
    if evidence.intersects(Evidence::FORWARD) {
        return UnicodeVerdict::unicode(evidence, false);
    }
    if evidence.intersects(Evidence::REVERSE_STRUCTURAL) {
        return UnicodeVerdict::unicode(evidence, true);
    }
    UnicodeVerdict::not_unicode(evidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    fn utf16be(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
    }

    // ── classify ────────────────────────────────────────────────

    #[test]
    fn test_classify_empty_is_utf8() {
        assert_eq!(classify(&[]), TextClass::Utf8);
    }

    #[test]
    fn test_classify_ascii_is_utf8() {
        assert_eq!(classify(b"Service started successfully"), TextClass::Utf8);
    }

    #[test]
    fn test_classify_multibyte_utf8() {
        assert_eq!(classify("na\u{ef}ve \u{4e2d}\u{6587}".as_bytes()), TextClass::Utf8);
    }

    #[test]
    fn test_classify_bom_and_letter_is_utf16le() {
        let class = classify(&[0xFF, 0xFE, 0x41, 0x00]);
        assert_eq!(class, TextClass::Utf16Le);
        assert!(class.is_utf16());
    }

    #[test]
    fn test_classify_big_endian_bom() {
        let mut bytes = vec![0xFE, 0xFF];
        bytes.extend(utf16be("h\u{e9}llo"));
        assert_eq!(classify(&bytes), TextClass::Utf16Be);
    }

    #[test]
    fn test_classify_utf16le_without_bom() {
        // 0xE9 followed by 0x00 is not valid UTF-8.
        assert_eq!(classify(&utf16le("h\u{e9}llo world")), TextClass::Utf16Le);
    }

    #[test]
    fn test_classify_utf16be_without_bom() {
        assert_eq!(classify(&utf16be("h\u{e9}llo")), TextClass::Utf16Be);
    }

    #[test]
    fn test_classify_latin1_is_ansi() {
        assert_eq!(classify(b"caf\xE9 au lait"), TextClass::Ansi);
    }

    #[test]
    fn test_classify_single_invalid_byte_is_ansi() {
        assert_eq!(classify(&[0xFF]), TextClass::Ansi);
    }

    // ── is_text_unicode ─────────────────────────────────────────

    #[test]
    fn test_signature_evidence() {
        let verdict = is_text_unicode(&[0xFF, 0xFE, 0x41, 0x00]);
        assert!(verdict.is_unicode);
        assert!(!verdict.big_endian);
        assert!(verdict.evidence.contains(Evidence::SIGNATURE));
        assert!(verdict.evidence.contains(Evidence::NULL_BYTES));
    }

    #[test]
    fn test_odd_length_disqualifies_even_with_bom() {
        let verdict = is_text_unicode(&[0xFF, 0xFE, 0x41, 0x00, 0x42]);
        assert!(!verdict.is_unicode);
        assert!(verdict.evidence.contains(Evidence::ODD_LENGTH));
    }

    #[test]
    fn test_illegal_chars_disqualify() {
        let verdict = is_text_unicode(&[0x41, 0x00, 0xFE, 0xFF, 0x42, 0x00]);
        assert!(!verdict.is_unicode);
        assert!(verdict.evidence.contains(Evidence::ILLEGAL_CHARS));
    }

    #[test]
    fn test_wide_controls_are_structural() {
        let verdict = is_text_unicode(&utf16le("a\r\nb"));
        assert!(verdict.is_unicode);
        assert!(verdict.evidence.contains(Evidence::CONTROLS));
        assert!(verdict.evidence.contains(Evidence::ASCII16));
    }

    #[test]
    fn test_short_statistical_only_text_is_not_unicode() {
        // Low bytes vary, high bytes are all spaces: looks like UTF-16 to the
        // lane statistics and nothing else.
        let text = b"a b c d e f g h ";
        let verdict = is_text_unicode(text);
        assert_eq!(verdict.evidence, Evidence::STATISTICS);
        assert!(!verdict.is_unicode);
    }

    #[test]
    fn test_long_statistical_only_text_is_unicode() {
        let text = b"a b c d e f g h ".repeat(7);
        assert!(text.len() >= STATISTICS_MIN_LEN);
        let verdict = is_text_unicode(&text);
        assert_eq!(verdict.evidence, Evidence::STATISTICS);
        assert!(verdict.is_unicode);
    }

    #[test]
    fn test_short_ascii_never_unicode() {
        let samples: [&[u8]; 6] = [
            b"this program can break",
            b"Bush hid the facts",
            b"a b c d e f g h ",
            b"ok",
            b"The quick brown fox jumps over the lazy dog",
            b"zzzzyyyyxxxxwwww",
        ];
        for sample in samples {
            assert!(sample.len() < STATISTICS_MIN_LEN);
            let verdict = is_text_unicode(sample);
            assert!(!verdict.is_unicode, "{:?} classified as unicode", String::from_utf8_lossy(sample));
        }
    }

    #[test]
    fn test_reverse_statistics_alone_is_not_unicode() {
        let verdict = is_text_unicode(b" a b c d e f g h");
        assert_eq!(verdict.evidence, Evidence::REVERSE_STATISTICS);
        assert!(!verdict.is_unicode);
    }

    #[test]
    fn test_too_short_has_no_evidence() {
        let verdict = is_text_unicode(&[0x41]);
        assert!(verdict.evidence.is_empty());
        assert!(!verdict.is_unicode);
    }

    #[test]
    fn test_evidence_bit_ops() {
        let mut e = Evidence::empty();
        e.insert(Evidence::STATISTICS);
        assert!(e.is_statistical_only());
        let e = e | Evidence::NULL_BYTES;
        assert!(!e.is_statistical_only());
        assert_eq!(e.bits(), 0x0110);
    }
}
