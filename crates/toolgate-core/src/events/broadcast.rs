//! Fan-out of connection events to subscribers.
//!
//! Every subscriber owns an unbounded queue, so a slow reader never loses
//! status events; it only delays them.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use super::ConnectionEvent;
use crate::ports::AppEventEmitter;

/// Receiving half handed out by [`EventBroadcaster::subscribe`].
pub type EventReceiver = mpsc::UnboundedReceiver<ConnectionEvent>;

/// Publish/subscribe hub for connection events.
///
/// Owned by whoever composes the application and handed to the connection
/// manager as an `AppEventEmitter`. Cloning shares the subscriber list.
#[derive(Clone, Default)]
pub struct EventBroadcaster {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<ConnectionEvent>>>>,
}

impl EventBroadcaster {
    /// Create a new broadcaster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every live subscriber.
    ///
    /// Subscribers whose receiver was dropped are pruned.
    pub fn broadcast(&self, event: ConnectionEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only log if there are receivers (avoid log spam with no listeners)
        if subscribers.is_empty() {
            return;
        }
        debug!(?event, "Broadcasting connection event");
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Subscribe to connection events.
    ///
    /// The receiver sees every event emitted after this call, in emission
    /// order, however far it falls behind.
    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Number of subscribers still attached.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

impl AppEventEmitter for EventBroadcaster {
    fn emit(&self, event: ConnectionEvent) {
        self.broadcast(event);
    }

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}
