//! Event emitter trait for connection status broadcasting.
//!
//! This module defines the abstraction for publishing connection events.
//! Implementations handle transport details (broadcast channels, logs, etc.).

use crate::events::ConnectionEvent;

/// Trait for emitting connection events.
///
/// This abstraction keeps channel types out of the connection manager's
/// public API surface.
///
/// # Implementations
///
/// - `NoopEmitter` - For tests and contexts that don't need events
/// - `EventBroadcaster` - Fan-out to per-subscriber unbounded queues
pub trait AppEventEmitter: Send + Sync {
    /// Emit a connection event.
    ///
    /// This method must not block.
    fn emit(&self, event: ConnectionEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn AppEventEmitter>;
}

/// A no-op event emitter for tests and CLI contexts.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    /// Create a new no-op emitter.
    pub const fn new() -> Self {
        Self
    }
}

impl AppEventEmitter for NoopEmitter {
    fn emit(&self, _event: ConnectionEvent) {
        // Intentionally do nothing
    }

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}
