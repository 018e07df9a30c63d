//! Session: the interface to the event-tracing subsystem, plus the
//! in-process [`EventBus`] implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use super::event::{EventLevel, EventRecord};
use super::MonitorError;

/// Which records of one provider a monitor wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderFilter {
    pub guid: Uuid,
    pub level: EventLevel,
    /// Zero matches every record.
    pub keywords: u64,
}

impl ProviderFilter {
    pub fn matches(&self, record: &EventRecord) -> bool {
        record.provider_id == self.guid
            && record.level <= self.level
            && (self.keywords == 0 || record.keywords & self.keywords != 0)
    }
}

/// A live subscription: its id and the channel records arrive on.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub receiver: Receiver<EventRecord>,
}

/// Source of raw event records.
pub trait TraceSession: Send + Sync {
    /// Look up a provider GUID by its registered name.
    fn resolve(&self, name: &str) -> Option<Uuid>;

    /// Start delivering records of the given providers. The channel
    /// disconnects when the subscription is cancelled or the session closes.
    fn subscribe(&self, providers: &[ProviderFilter]) -> Result<Subscription, MonitorError>;

    /// Cancel a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: u64);
}

/// In-process tracing session.
///
/// Keeps a catalogue of known providers and fans published records out to
/// every subscriber of the record's provider.
#[derive(Default)]
pub struct EventBus {
    catalog: DashMap<String, Uuid>,
    names: DashMap<Uuid, String>,
    subscribers: DashMap<Uuid, Vec<(u64, Sender<EventRecord>)>>,
    next_id: AtomicU64,
    /// Held for reading while subscribing or publishing, so `close` never
    /// interleaves with either.
    closed: RwLock<bool>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` resolvable to `guid`.
    pub fn register_provider(&self, name: &str, guid: Uuid) {
        self.catalog.insert(name.to_ascii_lowercase(), guid);
        self.names.insert(guid, name.to_string());
    }

    /// Name registered for `guid`, if any.
    pub fn provider_name(&self, guid: &Uuid) -> Option<String> {
        self.names.get(guid).map(|n| n.value().clone())
    }

    /// Deliver `record` to every live subscriber of its provider.
    ///
    /// Returns the number of subscribers reached. Subscribers whose
    /// receiver is gone are pruned.
    pub fn publish(&self, record: EventRecord) -> usize {
        let closed = self.closed.read();
        if *closed {
            return 0;
        }
        let Some(mut senders) = self.subscribers.get_mut(&record.provider_id) else {
            return 0;
        };
        senders.retain(|(_, tx)| tx.send(record.clone()).is_ok());
        senders.len()
    }

    /// Drop every subscription. Monitors see a disconnect once they have
    /// drained what was already delivered.
    pub fn close(&self) {
        let mut closed = self.closed.write();
        *closed = true;
        self.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }
}

impl TraceSession for EventBus {
    fn resolve(&self, name: &str) -> Option<Uuid> {
        self.catalog.get(&name.to_ascii_lowercase()).map(|g| *g.value())
    }

    fn subscribe(&self, providers: &[ProviderFilter]) -> Result<Subscription, MonitorError> {
        let closed = self.closed.read();
        if *closed {
            return Err(MonitorError::Subscribe("session is closed".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, receiver) = mpsc::channel();

        let mut guids: Vec<Uuid> = providers.iter().map(|p| p.guid).collect();
        guids.sort_unstable();
        guids.dedup();
        for guid in guids {
            self.subscribers.entry(guid).or_default().push((id, tx.clone()));
        }
        Ok(Subscription { id, receiver })
    }

    fn unsubscribe(&self, id: u64) {
        for mut senders in self.subscribers.iter_mut() {
            senders.retain(|(owner, _)| *owner != id);
        }
    }
}
