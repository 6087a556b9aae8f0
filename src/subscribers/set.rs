//! # Non-blocking fan-out of events to subscribers.
//!
//! ```text
//! emit(event)
//!     ├──► [queue 1] ──► worker 1 ──► sub1.on_event()
//!     ├──► [queue 2] ──► worker 2 ──► sub2.on_event()
//!     └──► [queue N] ──► worker N ──► subN.on_event()
//! ```
//!
//! - `emit` uses `try_send` and never waits.
//! - Each subscriber sees events in publish order; there is no ordering across subscribers.
//! - A full or closed queue drops the event for that subscriber only and publishes
//!   `SubscriberOverflow` (never for an overflow event itself, which would loop).
//! - A panic inside `on_event` is caught, reported as `SubscriberPanicked`, and the worker
//!   moves on to the next event.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Channel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Per-subscriber queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<Channel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            let bus_for_worker = bus.clone();

            workers.push(tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
                        .catch_unwind()
                        .await;
                    if let Err(payload) = handled {
                        let info = if let Some(msg) = payload.downcast_ref::<&'static str>() {
                            (*msg).to_string()
                        } else if let Some(msg) = payload.downcast_ref::<String>() {
                            msg.clone()
                        } else {
                            "unknown panic".to_string()
                        };
                        tracing::error!(subscriber = name, panic = %info, "subscriber panicked");
                        bus_for_worker.publish(Event::subscriber_panicked(name, info));
                    }
                }
            }));
            channels.push(Channel { name, sender: tx });
        }

        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Returns `true` when no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Delivers `event` to every subscriber queue without waiting.
    pub fn emit(&self, event: Event) {
        let is_overflow = matches!(event.kind, EventKind::SubscriberOverflow);
        let event = Arc::new(event);

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow {
                tracing::warn!(subscriber = channel.name, reason, "subscriber dropped an event");
                self.bus
                    .publish(Event::subscriber_overflow(channel.name, reason));
            }
        }
    }

    /// Closes every queue and waits for the workers to drain.
    pub async fn shutdown(self) {
        drop(self.channels);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
