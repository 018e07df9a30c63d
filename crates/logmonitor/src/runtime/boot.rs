//! Boot: logging init, output sink, tracing session, monitor context.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::AgentConfig;
use crate::monitor::{EventBus, TraceSession};
use crate::output::LogWriter;
use crate::state::{LogMonitor, SharedMonitor};

/// Initialise the tracing / logging subsystem. Diagnostics go to stderr;
/// stdout belongs to the telemetry stream.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logmonitor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build the stdout sink, the in-process session and the monitor context.
pub fn boot(config: &AgentConfig) -> (SharedMonitor, Arc<EventBus>) {
    info!("Starting LogMonitor v{}", crate::VERSION);

    let writer = Arc::new(
        LogWriter::stdout()
            .with_tag(config.component_tag.clone())
            .with_policy(config.write_failure_policy()),
    );
    info!(
        "Output sink ready: console={}, tag={}, policy={:?}",
        writer.is_console(),
        writer.tag(),
        config.write_failure_policy()
    );

    let bus = Arc::new(EventBus::new());
    let session: Arc<dyn TraceSession> = bus.clone();
    let monitor = Arc::new(LogMonitor::new(writer, session));
    info!("Initialized monitor context");

    (monitor, bus)
}
