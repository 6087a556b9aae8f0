//! # Broadcast bus for runtime events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`]. Publishing never blocks and never fails:
//! with no receivers the event is simply dropped, and a receiver that falls more than
//! `capacity` events behind observes `RecvError::Lagged(n)` and skips ahead.
//!
//! ```text
//!   StreamActor ─┐
//!   Registry    ─┼──► Bus ──► subscriber listener ──► SubscriberSet
//!   Monitor     ─┤        └─► Supervisor::subscribe() receivers
//!   Supervisor  ─┘
//! ```

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable handle to the runtime's event channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus whose ring buffer holds `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes `ev` to every current receiver.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Returns a receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
