//! Shared state for control handlers.

use std::sync::Arc;

use crate::Supervisor;
use crate::detect::LatestFrameSink;
use crate::resources::RelayConfig;

/// Shared state for control handlers.
#[derive(Clone)]
pub struct ControlState {
    /// The runtime every handler operates on.
    pub supervisor: Arc<Supervisor>,
    /// Relay executable and media server base URL.
    pub relay: RelayConfig,
    /// Latest output per camera, when the supervisor publishes into one.
    pub frames: Option<Arc<LatestFrameSink>>,
}

impl ControlState {
    /// Creates state with the default relay configuration and no frame access.
    #[must_use]
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self {
            supervisor,
            relay: RelayConfig::default(),
            frames: None,
        }
    }

    /// Sets the relay configuration.
    #[must_use]
    pub fn with_relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    /// Exposes the newest frames of camera workers through `GET /analyze/:camera_id/latest`.
    ///
    /// Must be the same sink the supervisor was built with.
    #[must_use]
    pub fn with_frames(mut self, frames: Arc<LatestFrameSink>) -> Self {
        self.frames = Some(frames);
        self
    }
}
