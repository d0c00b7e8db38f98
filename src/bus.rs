use crate::events::Event;
use tokio::sync::broadcast;

/// Default backlog per subscriber before a slow observer starts lagging
pub const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of engine events to observers (trade history writer, tests).
///
/// Observers are best-effort: a lagging subscriber loses old events, the
/// engine never waits on them.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Returns how many subscribers saw the event; zero subscribers is fine.
    pub fn publish(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
