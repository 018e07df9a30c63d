//! ETW monitor: one worker thread routing session records to the callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::event::{EventCallback, EventRecord};
use super::session::{ProviderFilter, TraceSession};
use super::{Monitor, MonitorError};
use crate::conf::{EtwProvider, SourceKind};

pub struct EtwMonitor {
    providers: Vec<ProviderFilter>,
    session: Arc<dyn TraceSession>,
    subscription: u64,
    accepting: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EtwMonitor {
    /// Validate `providers`, subscribe to them and start the worker.
    pub fn new(
        providers: &[EtwProvider],
        callback: EventCallback,
        session: Arc<dyn TraceSession>,
    ) -> Result<Self, MonitorError> {
        let filters = resolve_providers(providers, session.as_ref())?;
        let subscription = session.subscribe(&filters)?;
        let accepting = Arc::new(AtomicBool::new(true));

        let spawned = {
            let filters = filters.clone();
            let accepting = Arc::clone(&accepting);
            let receiver = subscription.receiver;
            thread::Builder::new()
                .name("etw-monitor".to_string())
                .spawn(move || run_worker(receiver, filters, callback, accepting))
        };
        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                session.unsubscribe(subscription.id);
                return Err(e.into());
            }
        };

        info!("ETW monitor started with {} provider(s)", filters.len());
        Ok(Self {
            providers: filters,
            session,
            subscription: subscription.id,
            accepting,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn providers(&self) -> &[ProviderFilter] {
        &self.providers
    }

    /// Clear the accepting flag and cancel the subscription, which wakes
    /// the worker. Does not wait.
    fn request_stop(&self) {
        if self.accepting.swap(false, Ordering::AcqRel) {
            self.session.unsubscribe(self.subscription);
        }
    }

    /// Holds the worker slot for the whole join, so a concurrent `stop`
    /// returns only after the worker has exited.
    fn join_worker(&self) {
        let mut slot = self.worker.lock();
        if let Some(worker) = slot.take() {
            if worker.join().is_err() {
                warn!("ETW monitor worker panicked");
            }
        }
    }
}

impl Monitor for EtwMonitor {
    fn kind(&self) -> SourceKind {
        SourceKind::Etw
    }

    fn is_running(&self) -> bool {
        match self.worker.try_lock() {
            Some(slot) => slot.as_ref().is_some_and(|w| !w.is_finished()),
            // Someone is joining it right now.
            None => true,
        }
    }

    fn stop(&self) {
        self.request_stop();
        self.join_worker();
    }

    fn join(&self) {
        self.join_worker();
    }
}

impl Drop for EtwMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    receiver: Receiver<EventRecord>,
    filters: Vec<ProviderFilter>,
    callback: EventCallback,
    accepting: Arc<AtomicBool>,
) {
    let mut delivered: u64 = 0;
    // Ends when the subscription is cancelled or the session closes.
    for record in receiver {
        if !accepting.load(Ordering::Acquire) {
            break;
        }
        if filters.iter().any(|f| f.matches(&record)) {
            callback(&record);
            delivered = delivered.saturating_add(1);
        }
    }
    debug!("ETW monitor worker exiting after {} record(s)", delivered);
}

/// Turn configured providers into session filters.
///
/// A GUID wins over a name; a name alone must be known to the session.
pub fn resolve_providers(
    providers: &[EtwProvider],
    session: &dyn TraceSession,
) -> Result<Vec<ProviderFilter>, MonitorError> {
    if providers.is_empty() {
        return Err(MonitorError::NoProviders);
    }

    providers
        .iter()
        .enumerate()
        .map(|(index, provider)| {
            let guid = match (&provider.provider_guid, &provider.provider_name) {
                (Some(guid), _) => parse_guid(guid)?,
                (None, Some(name)) => session
                    .resolve(name)
                    .ok_or_else(|| MonitorError::UnknownProvider(name.clone()))?,
                (None, None) => return Err(MonitorError::MissingIdentifier(index)),
            };
            Ok(ProviderFilter { guid, level: provider.level, keywords: provider.keywords })
        })
        .collect()
}

/// Parse a provider GUID, with or without surrounding braces.
pub fn parse_guid(text: &str) -> Result<Uuid, MonitorError> {
    let trimmed = text.trim();
    let bare = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed);
    Uuid::parse_str(bare).map_err(|e| MonitorError::InvalidGuid {
        guid: text.to_string(),
        reason: e.to_string(),
    })
}
