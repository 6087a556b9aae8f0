use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::detect::cadence::AnnotatedFrame;

/// Receives the output frames of stream workers.
///
/// Called inline from the worker loop for every frame, so implementations must be quick and
/// must not block.
pub trait FrameSink: Send + Sync + 'static {
    /// Accepts the output for the current frame of worker `key`.
    fn publish(&self, key: &str, frame: Arc<AnnotatedFrame>);

    /// Called once when worker `key` exits its loop.
    fn release(&self, _key: &str) {}
}

/// Sink that drops every frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardSink;

impl FrameSink for DiscardSink {
    fn publish(&self, _key: &str, _frame: Arc<AnnotatedFrame>) {}
}

/// Sink that keeps the newest frame of each worker.
#[derive(Debug, Default)]
pub struct LatestFrameSink {
    latest: Mutex<HashMap<String, Arc<AnnotatedFrame>>>,
}

impl LatestFrameSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest frame published by `key`, while that worker is running.
    pub fn get(&self, key: &str) -> Option<Arc<AnnotatedFrame>> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<AnnotatedFrame>>> {
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FrameSink for LatestFrameSink {
    fn publish(&self, key: &str, frame: Arc<AnnotatedFrame>) {
        let mut latest = self.lock();
        match latest.get_mut(key) {
            Some(slot) => *slot = frame,
            None => {
                latest.insert(key.to_string(), frame);
            }
        }
    }

    fn release(&self, key: &str) {
        self.lock().remove(key);
    }
}
