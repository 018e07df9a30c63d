//! Dispatch: turn configured sources into running monitors.
//!
//! Every ETW source's providers are flattened into one list and handed to a
//! single [`EtwMonitor`]. Sources this agent cannot watch only produce a
//! warning line on the output; a failing ETW monitor produces an error line.
//! Neither stops start-up.

use std::sync::Arc;

use tracing::{info, warn};

use super::etw::EtwMonitor;
use super::event::EventCallback;
use super::session::TraceSession;
use super::Monitor;
use crate::conf::{EtwProvider, LoggerSettings, SourceConfig};
use crate::output::LogWriter;

/// What [`start_monitors`] produced.
#[derive(Default)]
pub struct StartReport {
    pub monitors: Vec<Box<dyn Monitor>>,
    pub warnings: usize,
    pub errors: usize,
}

impl StartReport {
    pub fn started(&self) -> usize {
        self.monitors.len()
    }

    pub fn any_started(&self) -> bool {
        !self.monitors.is_empty()
    }
}

impl std::fmt::Debug for StartReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartReport")
            .field("started", &self.monitors.len())
            .field("warnings", &self.warnings)
            .field("errors", &self.errors)
            .finish()
    }
}

pub fn start_monitors(
    settings: &LoggerSettings,
    callback: EventCallback,
    session: &Arc<dyn TraceSession>,
    writer: &LogWriter,
) -> StartReport {
    let mut report = StartReport::default();
    let mut providers: Vec<EtwProvider> = Vec::new();

    for source in &settings.sources {
        match source {
            SourceConfig::Etw(etw) => providers.extend(etw.providers.iter().cloned()),
            other => {
                let kind = other.kind();
                warn!(%kind, "Skipping unsupported source");
                writer.warning(&format!("Log source type not supported for monitoring: {}", kind));
                report.warnings += 1;
            }
        }
    }

    if providers.is_empty() {
        return report;
    }

    match EtwMonitor::new(&providers, callback, Arc::clone(session)) {
        Ok(monitor) => report.monitors.push(Box::new(monitor)),
        Err(e) if e.is_provider_error() => {
            warn!(error = %e, "ETW monitor rejected its providers");
            writer.error(&format!(
                "Invalid providers: {}. Check them using 'logman query providers'",
                e
            ));
            report.errors += 1;
        }
        Err(e) => {
            warn!(error = %e, "ETW monitor failed to start");
            writer.error(&format!("Failed to start ETW monitor: {}", e));
            report.errors += 1;
        }
    }

    info!(
        started = report.started(),
        warnings = report.warnings,
        errors = report.errors,
        "Monitors dispatched"
    );
    report
}
