//! Writer: the single output channel shared by every monitor thread.
//!
//! One [`LogWriter`] is created at start-up and handed out as
//! `Arc<LogWriter>`. All writes go through one mutex, so lines from
//! different threads never interleave; ordering is lock-acquisition order.
//! Failed writes are telemetry loss, not errors: they are never retried and
//! only surface as a `false` return (or a `SinkError` from the `try_*`
//! variants).

use std::io::{IsTerminal, Write};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::warn;

use super::format::{format_line, terminate_line, Severity, DEFAULT_TAG};
use super::SinkError;
use crate::text::WideText;

/// What to do, beyond returning `false`, when a write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteFailurePolicy {
    /// Drop the line silently.
    #[default]
    Ignore,
    /// Also report the failure through `tracing` (stderr diagnostics).
    Trace,
}

pub struct LogWriter {
    out: Mutex<Box<dyn Write + Send>>,
    is_console: bool,
    tag: String,
    policy: WriteFailurePolicy,
}

impl LogWriter {
    /// Writer on the process's standard output.
    pub fn stdout() -> Self {
        let stdout = std::io::stdout();
        let is_console = stdout.is_terminal();
        Self::with_writer(Box::new(stdout), is_console)
    }

    /// Writer on an arbitrary destination. `is_console` only controls
    /// whether each write is followed by a flush.
    pub fn with_writer(out: Box<dyn Write + Send>, is_console: bool) -> Self {
        Self {
            out: Mutex::new(out),
            is_console,
            tag: DEFAULT_TAG.to_string(),
            policy: WriteFailurePolicy::default(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_policy(mut self, policy: WriteFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn is_console(&self) -> bool {
        self.is_console
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Write raw bytes as one uninterrupted unit.
    pub fn try_write(&self, bytes: &[u8]) -> Result<(), SinkError> {
        let mut out = self.out.lock();
        out.write_all(bytes)?;
        if self.is_console {
            out.flush()?;
        }
        Ok(())
    }

    pub fn write(&self, bytes: &[u8]) -> bool {
        self.settle(self.try_write(bytes))
    }

    /// Terminate `line`, encode it as UTF-8 and write it.
    pub fn try_write_line(&self, line: &WideText) -> Result<(), SinkError> {
        let mut line = line.clone();
        terminate_line(&mut line);
        let encoded = line.to_utf8();
        self.try_write(encoded.as_bytes())
    }

    pub fn write_line(&self, line: &WideText) -> bool {
        self.settle(self.try_write_line(line))
    }

    /// Format `message` with the current time and this writer's tag.
    pub fn trace(&self, severity: Severity, message: &WideText) -> bool {
        let line = format_line(Utc::now(), &self.tag, severity, message);
        self.write_line(&line)
    }

    pub fn error(&self, message: &str) -> bool {
        self.trace(Severity::Error, &WideText::from(message))
    }

    pub fn warning(&self, message: &str) -> bool {
        self.trace(Severity::Warning, &WideText::from(message))
    }

    pub fn info(&self, message: &str) -> bool {
        self.trace(Severity::Info, &WideText::from(message))
    }

    fn settle(&self, result: Result<(), SinkError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                if self.policy == WriteFailurePolicy::Trace {
                    warn!(error = %e, "Dropped output line");
                }
                false
            }
        }
    }
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("is_console", &self.is_console)
            .field("tag", &self.tag)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
