//! Agent state: the [`LogMonitor`] context that owns the sink, the tracing
//! session and the registry of running monitors.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info};

use crate::conf::LoggerSettings;
use crate::monitor::{start_monitors, EventCallback, MonitorRegistry, TraceSession};
use crate::output::LogWriter;

pub struct LogMonitor {
    writer: Arc<LogWriter>,
    session: Arc<dyn TraceSession>,
    registry: MonitorRegistry,
    /// Serializes start and stop so two starts never race on the registry.
    /// Never held while waiting.
    lifecycle: Mutex<()>,
}

impl LogMonitor {
    pub fn new(writer: Arc<LogWriter>, session: Arc<dyn TraceSession>) -> Self {
        Self {
            writer,
            session,
            registry: MonitorRegistry::new(),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn writer(&self) -> &Arc<LogWriter> {
        &self.writer
    }

    pub fn active_monitors(&self) -> usize {
        self.registry.len()
    }

    /// Load the configuration at `config_path` and start its monitors.
    ///
    /// Returns false, after logging an error line, when the configuration
    /// cannot be loaded. Monitors from an earlier start are stopped first.
    pub fn start_log_monitor(&self, config_path: &Path, callback: EventCallback) -> bool {
        let settings = match LoggerSettings::from_file(config_path) {
            Ok(settings) => settings,
            Err(e) => {
                error!(path = %config_path.display(), error = %e, "Configuration rejected");
                self.writer.error(&format!("Invalid configuration file. {}", e));
                return false;
            }
        };

        let _guard = self.lifecycle.lock();
        let stopped = self.registry.stop_all();
        if stopped > 0 {
            info!(stopped, "Stopped monitors from previous start");
        }

        let report = start_monitors(&settings, callback, &self.session, &self.writer);
        info!(
            sources = settings.sources.len(),
            monitors = report.started(),
            "Log monitor started"
        );
        self.registry.install(report.monitors);
        true
    }

    /// Stop every running monitor. In-flight callbacks complete first.
    pub fn stop_log_monitor(&self) {
        let _guard = self.lifecycle.lock();
        let stopped = self.registry.stop_all();
        info!(stopped, "Log monitor stopped");
    }

    /// Block until every monitor has drained its session and exited, or
    /// until another thread stops them.
    pub fn wait_log_monitor(&self) {
        self.registry.join_all();
    }
}

impl Drop for LogMonitor {
    fn drop(&mut self) {
        self.registry.stop_all();
    }
}

pub type SharedMonitor = Arc<LogMonitor>;
