//! Monitor module: tracing sessions, monitor workers, dispatch and the
//! registry of running monitors.

pub mod dispatch;
pub mod etw;
pub mod event;
pub mod registry;
pub mod replay;
pub mod session;

use thiserror::Error;

use crate::conf::SourceKind;

pub use dispatch::{start_monitors, StartReport};
pub use etw::EtwMonitor;
pub use event::{render_callback, render_event, EventCallback, EventLevel, EventRecord, RawTextBuffer};
pub use registry::MonitorRegistry;
pub use replay::{load_events, publish_events, register_providers, ReplayError, ReplayEvent, ReplayRecord};
pub use session::{EventBus, ProviderFilter, Subscription, TraceSession};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("no providers configured")]
    NoProviders,
    #[error("provider #{0} has neither a name nor a GUID")]
    MissingIdentifier(usize),
    #[error("malformed provider GUID '{guid}': {reason}")]
    InvalidGuid { guid: String, reason: String },
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("trace session rejected the subscription: {0}")]
    Subscribe(String),
    #[error("failed to spawn monitor worker: {0}")]
    Spawn(#[from] std::io::Error),
}

impl MonitorError {
    /// True for errors caused by the configured provider list itself.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            MonitorError::NoProviders
                | MonitorError::MissingIdentifier(_)
                | MonitorError::InvalidGuid { .. }
                | MonitorError::UnknownProvider(_)
        )
    }
}

/// A running source monitor.
///
/// Every method takes `&self` so one thread can stop a monitor while
/// another is waiting on it.
pub trait Monitor: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn is_running(&self) -> bool;

    /// Stop accepting records and join the workers. In-flight callbacks
    /// finish first. Idempotent.
    fn stop(&self);

    /// Wait for the workers to finish on their own, which happens once the
    /// session has closed and everything delivered has been handled, or
    /// once another thread calls [`Monitor::stop`].
    fn join(&self);
}
