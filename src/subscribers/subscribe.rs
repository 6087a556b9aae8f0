use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from a dedicated worker task, so a slow subscriber only delays itself. If its
/// queue fills up, further events for that subscriber are dropped and a
/// `SubscriberOverflow` event is published.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        256
    }
}
