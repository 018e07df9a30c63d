//! Format: timestamp rendering and the `[time][TAG] LEVEL: message` line.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::text::WideText;

/// Component tag used by the agent's own diagnostics lines.
pub const DEFAULT_TAG: &str = "LOGMONITOR";

const LF: u16 = 0x000A;
const CR: u16 = 0x000D;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;
const FILETIME_TICKS_PER_SEC: u64 = 10_000_000;

/// Severity of an output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `YYYY-MM-DDThh:mm:ss.000Z`; sub-second precision is not tracked.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}

/// Render a FILETIME (100 ns ticks since 1601-01-01 UTC).
///
/// Returns `None` for values chrono cannot represent.
pub fn format_filetime(ticks: u64) -> Option<String> {
    let secs = i64::try_from(ticks / FILETIME_TICKS_PER_SEC).ok()? - FILETIME_UNIX_OFFSET_SECS;
    DateTime::from_timestamp(secs, 0).map(format_timestamp)
}

/// Compose one complete output line.
pub fn format_line(
    timestamp: DateTime<Utc>,
    tag: &str,
    severity: Severity,
    message: &WideText,
) -> WideText {
    let mut line = WideText::from(format!(
        "[{}][{}] {}: ",
        format_timestamp(timestamp),
        sanitize_tag(tag),
        severity
    ));
    line.push_wide(message);
    terminate_line(&mut line);
    line
}

/// A tag may not close its bracket or end the line: `]`, CR and LF
/// become `_`.
pub fn sanitize_tag(tag: &str) -> Cow<'_, str> {
    if tag.contains([']', '\r', '\n']) {
        Cow::Owned(tag.replace([']', '\r', '\n'], "_"))
    } else {
        Cow::Borrowed(tag)
    }
}

/// Leave exactly one line terminator at the end of `text`.
///
/// An existing final `\n` or `\r\n` is kept as is, a run of several
/// terminators collapses to the last one, and bare text gets `\n`.
pub fn terminate_line(text: &mut WideText) {
    let units = text.units_mut();
    let mut end = units.len();
    let mut crlf_terminated = false;
    let mut first = true;

    while end > 0 && units[end - 1] == LF {
        let crlf = end >= 2 && units[end - 2] == CR;
        if first {
            crlf_terminated = crlf;
            first = false;
        }
        end -= if crlf { 2 } else { 1 };
    }

    units.truncate(end);
    if crlf_terminated {
        units.push(CR);
    }
    units.push(LF);
}
