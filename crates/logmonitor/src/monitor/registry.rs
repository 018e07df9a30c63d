//! Registry of running monitors, owned by the agent.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::Monitor;

/// The list lock is only held to add, take or snapshot monitors, never
/// while stopping or joining one.
#[derive(Default)]
pub struct MonitorRegistry {
    monitors: Mutex<Vec<Arc<dyn Monitor>>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, monitors: impl IntoIterator<Item = Box<dyn Monitor>>) {
        self.monitors.lock().extend(monitors.into_iter().map(Arc::from));
    }

    pub fn len(&self) -> usize {
        self.monitors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.lock().is_empty()
    }

    /// Stop and remove every monitor. Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let drained: Vec<Arc<dyn Monitor>> = std::mem::take(&mut *self.monitors.lock());
        let count = drained.len();
        for monitor in drained {
            debug!(kind = %monitor.kind(), "Stopping monitor");
            monitor.stop();
        }
        count
    }

    /// Wait for every monitor to finish, then remove them. A concurrent
    /// [`stop_all`](Self::stop_all) ends the wait.
    pub fn join_all(&self) {
        let snapshot: Vec<Arc<dyn Monitor>> = self.monitors.lock().clone();
        for monitor in &snapshot {
            monitor.join();
        }
        self.monitors
            .lock()
            .retain(|m| !snapshot.iter().any(|joined| Arc::ptr_eq(m, joined)));
    }
}
