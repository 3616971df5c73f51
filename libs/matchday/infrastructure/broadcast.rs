//! Named pub/sub channels for live match events
//!
//! Delivery is at-most-once: a message sent while nobody is subscribed, or
//! that a lagging subscriber misses, is gone. Goals and cards are also
//! written to the timeline store so late subscribers can replay them.

use crate::domain::{BroadcastMessage, Clock, DiffEvent, LiveMatchStore, MatchEvent, StoreError};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("No subscribers on channel {0}")]
    NoSubscribers(String),

    #[error("Event store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, BroadcastError>;

pub struct EventBroadcaster {
    channels: Arc<DashMap<String, broadcast::Sender<BroadcastMessage>>>,
    capacity: usize,
    store: Option<Arc<dyn LiveMatchStore>>,
    clock: Arc<dyn Clock>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
            store: None,
            clock,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Mirror goals and cards into `store` for replay
    pub fn with_store(mut self, store: Arc<dyn LiveMatchStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<BroadcastMessage> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .value()
            .clone()
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<BroadcastMessage> {
        self.sender(channel).subscribe()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Send without logging; returns the number of subscribers reached
    pub fn try_publish(&self, channel: &str, event: &DiffEvent) -> Result<usize> {
        let message = BroadcastMessage::from_event(channel, event, self.clock.now())?;
        self.sender(channel)
            .send(message)
            .map_err(|_| BroadcastError::NoSubscribers(channel.to_string()))
    }

    /// Fire-and-forget publish.
    ///
    /// Never blocks on subscribers or storage. Failures are logged and
    /// dropped. Returns the number of subscribers reached.
    pub fn publish(&self, channel: &str, event: &DiffEvent) -> usize {
        if let Some(record) = event.as_match_event() {
            self.persist(record);
        }

        match self.try_publish(channel, event) {
            Ok(delivered) => {
                debug!(
                    channel = %channel,
                    fixture_id = event.fixture_id(),
                    event_type = %event.event_type(),
                    delivered,
                    "Published event"
                );
                delivered
            }
            Err(BroadcastError::NoSubscribers(_)) => {
                debug!(channel = %channel, "Dropped event, no subscribers");
                0
            }
            Err(e) => {
                warn!(channel = %channel, fixture_id = event.fixture_id(), "Publish failed: {}", e);
                0
            }
        }
    }

    fn persist(&self, record: MatchEvent) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(fixture_id = record.fixture_id, "No runtime, event not persisted");
            return;
        };

        let handle = runtime.spawn(async move {
            if let Err(e) = store.append_events(std::slice::from_ref(&record)).await {
                warn!(fixture_id = record.fixture_id, "Failed to persist event: {}", e);
            }
        });

        let mut pending = self.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait for outstanding event writes
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.pending.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Event persistence task failed: {}", e);
            }
        }
    }

    /// Persisted goals and cards of a fixture, in elapsed order
    pub async fn replay(&self, fixture_id: i64) -> Result<Vec<MatchEvent>> {
        match &self.store {
            Some(store) => Ok(store.events_for(fixture_id).await?),
            None => Ok(Vec::new()),
        }
    }
}
