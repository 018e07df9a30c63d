//! Event: records delivered by a tracing session and their rendering.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::output::{format_line, LogWriter, Severity};
use crate::text::{self, Encoding, WideText};

/// Callback invoked by a monitor worker for every routed record.
pub type EventCallback = Arc<dyn Fn(&EventRecord) + Send + Sync>;

/// Trace level, lower is more severe. `LogAlways` passes every filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum EventLevel {
    LogAlways = 0,
    Critical = 1,
    #[default]
    Error = 2,
    Warning = 3,
    Information = 4,
    Verbose = 5,
}

impl EventLevel {
    /// Levels above 5 are vendor-defined and treated as verbose.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => EventLevel::LogAlways,
            1 => EventLevel::Critical,
            2 => EventLevel::Error,
            3 => EventLevel::Warning,
            4 => EventLevel::Information,
            _ => EventLevel::Verbose,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn severity(self) -> Severity {
        match self {
            EventLevel::Critical | EventLevel::Error => Severity::Error,
            EventLevel::Warning => Severity::Warning,
            EventLevel::LogAlways | EventLevel::Information | EventLevel::Verbose => Severity::Info,
        }
    }
}

impl FromStr for EventLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "logalways" => Ok(EventLevel::LogAlways),
            "critical" => Ok(EventLevel::Critical),
            "error" => Ok(EventLevel::Error),
            "warning" => Ok(EventLevel::Warning),
            "information" => Ok(EventLevel::Information),
            "verbose" => Ok(EventLevel::Verbose),
            other => Err(format!("unknown level '{}'", other)),
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Event payload bytes plus an optional declared encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTextBuffer {
    bytes: Bytes,
    declared: Option<Encoding>,
}

impl RawTextBuffer {
    /// Payload whose encoding the classifier will decide.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into(), declared: None }
    }

    pub fn with_encoding(bytes: impl Into<Bytes>, encoding: Encoding) -> Self {
        Self { bytes: bytes.into(), declared: Some(encoding) }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn declared(&self) -> Option<Encoding> {
        self.declared
    }

    pub fn decode(&self) -> WideText {
        text::decode(&self.bytes, self.declared)
    }
}

/// One record as delivered by a [`TraceSession`](super::TraceSession).
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub provider_id: Uuid,
    pub provider_name: Option<String>,
    pub event_id: u16,
    pub level: EventLevel,
    pub keywords: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: RawTextBuffer,
}

impl EventRecord {
    pub fn new(provider_id: Uuid, level: EventLevel, payload: RawTextBuffer) -> Self {
        Self {
            provider_id,
            provider_name: None,
            event_id: 0,
            level,
            keywords: 0,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Provider name when known, GUID otherwise.
    pub fn source_tag(&self) -> String {
        self.provider_name
            .clone()
            .unwrap_or_else(|| self.provider_id.to_string())
    }
}

/// Write one record to the sink as a formatted line.
pub fn render_event(record: &EventRecord, writer: &LogWriter) -> bool {
    let message = record.payload.decode();
    let line = format_line(record.timestamp, &record.source_tag(), record.level.severity(), &message);
    writer.write_line(&line)
}

/// Default callback: render every record onto `writer`.
pub fn render_callback(writer: Arc<LogWriter>) -> EventCallback {
    Arc::new(move |record: &EventRecord| {
        render_event(record, &writer);
    })
}
