//! Runtime events: data model and broadcast bus.
//!
//! Every state transition of a worker, every reap and every shutdown step is published as
//! an [`Event`]. Logging does not depend on this pipeline; it exists so callers can learn
//! about late failures (`WorkerCrashed`) without polling `list()`.
//!
//! - **Publishers**: worker status cells, `Registry`, `Monitor`, `Supervisor`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Supervisor`'s subscriber listener (fans out to `SubscriberSet`) and any
//!   receiver obtained through `Supervisor::subscribe`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
