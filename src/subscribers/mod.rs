//! # Event subscribers.
//!
//! A [`Subscribe`] implementation receives every runtime [`Event`](crate::Event) on its own
//! worker task, fed by a bounded queue owned by the [`SubscriberSet`]. Typical uses are
//! alerting on `WorkerCrashed`, metrics, or forwarding lifecycle changes to a UI.
//!
//! [`EventLog`] is the shipped implementation; it writes events to `tracing`.
//!
//! ```no_run
//! use async_trait::async_trait;
//! use streamvisor::{Event, EventKind, Subscribe};
//!
//! struct CrashAlerts;
//!
//! #[async_trait]
//! impl Subscribe for CrashAlerts {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::WorkerCrashed {
//!             // page someone about ev.worker
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "crash-alerts"
//!     }
//! }
//! ```

mod log;
mod set;
mod subscribe;

pub use log::EventLog;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
