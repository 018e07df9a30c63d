//! Replay: publish events from a JSON-lines file into an [`EventBus`].
//!
//! Loading, provider registration and publishing are separate steps so the
//! provider names of a replay can be made resolvable before any monitor
//! subscribes.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::etw::parse_guid;
use super::event::{EventLevel, EventRecord, RawTextBuffer};
use super::session::{EventBus, TraceSession};
use crate::text::Encoding;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("failed to read replay file: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: {reason}")]
    Payload { line: usize, reason: String },
}

/// One line of a replay file, as written.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayEvent {
    pub provider: String,
    #[serde(default)]
    pub event_id: u16,
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default)]
    pub keywords: u64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub base64: Option<String>,
    #[serde(default)]
    pub encoding: Option<Encoding>,
}

fn default_level() -> u8 {
    EventLevel::Information.as_u8()
}

impl ReplayEvent {
    fn payload(&self) -> Result<RawTextBuffer, String> {
        let bytes: Bytes = match (&self.text, &self.base64) {
            (Some(text), None) => Bytes::from(text.clone().into_bytes()),
            (None, Some(encoded)) => STANDARD
                .decode(encoded.trim())
                .map(Bytes::from)
                .map_err(|e| format!("invalid base64 payload: {}", e))?,
            (Some(_), Some(_)) => return Err("give either 'text' or 'base64', not both".to_string()),
            (None, None) => return Err("missing 'text' or 'base64' payload".to_string()),
        };
        Ok(match self.encoding {
            Some(encoding) => RawTextBuffer::with_encoding(bytes, encoding),
            None => RawTextBuffer::new(bytes),
        })
    }
}

/// A loaded event with its payload already decoded from the file.
#[derive(Debug, Clone)]
pub struct ReplayRecord {
    pub provider: String,
    pub event_id: u16,
    pub level: EventLevel,
    pub keywords: u64,
    pub payload: RawTextBuffer,
}

/// Read and check every event of `path`. Blank lines are skipped.
pub fn load_events(path: &Path) -> Result<Vec<ReplayRecord>, ReplayError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let event: ReplayEvent =
            serde_json::from_str(&line).map_err(|source| ReplayError::Parse { line: line_no, source })?;
        let payload = event
            .payload()
            .map_err(|reason| ReplayError::Payload { line: line_no, reason })?;

        records.push(ReplayRecord {
            provider: event.provider,
            event_id: event.event_id,
            level: EventLevel::from_u8(event.level),
            keywords: event.keywords,
            payload,
        });
    }

    debug!(events = records.len(), path = %path.display(), "Loaded replay file");
    Ok(records)
}

/// Make every provider name in `records` resolvable on `bus`. Names already
/// known keep their GUID; GUID-valued providers are left alone.
///
/// Returns how many names were newly registered.
pub fn register_providers(records: &[ReplayRecord], bus: &EventBus) -> usize {
    let mut registered = 0;
    for record in records {
        if parse_guid(&record.provider).is_err() && bus.resolve(&record.provider).is_none() {
            bus.register_provider(&record.provider, Uuid::new_v4());
            registered += 1;
        }
    }
    registered
}

/// Publish `records` on `bus` in order. Returns the number published.
pub fn publish_events(records: Vec<ReplayRecord>, bus: &EventBus) -> usize {
    let mut count = 0;
    for replay in records {
        let guid = provider_guid(&replay.provider, bus);
        let mut record = EventRecord::new(guid, replay.level, replay.payload);
        record.provider_name = bus.provider_name(&guid);
        record.event_id = replay.event_id;
        record.keywords = replay.keywords;

        let reached = bus.publish(record);
        debug!(event_id = replay.event_id, reached, "Replayed event");
        count += 1;
    }
    count
}

/// GUID for a replay provider: parsed, looked up, or freshly registered.
fn provider_guid(provider: &str, bus: &EventBus) -> Uuid {
    if let Ok(guid) = parse_guid(provider) {
        return guid;
    }
    if let Some(guid) = bus.resolve(provider) {
        return guid;
    }
    let guid = Uuid::new_v4();
    bus.register_provider(provider, guid);
    guid
}
