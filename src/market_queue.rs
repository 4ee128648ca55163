use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::shared_types::{MarketEvent, Side};

/// Retention window for venue events, in seconds.
pub const EVENT_TTL_SECS: i64 = 120;

/// FIFO store of one venue's normalized events. Each queue has exactly one
/// writer (its connector); the correlation engine only reads.
#[derive(Debug, Default)]
pub struct VenueQueue {
    events: VecDeque<MarketEvent>,
}

pub type SharedQueue = Arc<RwLock<VenueQueue>>;

pub fn shared_queue() -> SharedQueue {
    Arc::new(RwLock::new(VenueQueue::new()))
}

impl VenueQueue {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }

    pub fn push(&mut self, event: MarketEvent) {
        self.events.push_back(event);
    }

    /// TTL pass: drops every event at or past the retention horizon.
    pub fn evict_expired(&mut self, now: i64) {
        let horizon = now - EVENT_TTL_SECS;
        self.events.retain(|event| event.timestamp > horizon);
    }

    /// Whether an event with this venue id is already retained.
    pub fn contains_id(&self, id: &str) -> bool {
        self.events
            .iter()
            .any(|event| event.venue_event_id.as_deref() == Some(id))
    }

    pub fn side_events(&self, side: Side) -> Vec<MarketEvent> {
        self.events
            .iter()
            .filter(|event| event.side == side)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
