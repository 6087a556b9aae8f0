//! Runtime core: worker lifecycle and orchestration.
//!
//! The public API from this module is [`Supervisor`] (built through [`SupervisorBuilder`]),
//! its [`Config`], and the worker description/snapshot types.
//!
//! Internal modules:
//! - [`registry`]: keyed ownership of workers, start/stop/reap/shutdown;
//! - [`actor`]: the reconnecting loop of one stream worker;
//! - [`monitor`]: periodic reaping of dead workers;
//! - [`status`]: worker state machine and snapshots;
//! - [`shutdown`]: termination signal handling;
//! - [`supervisor`] / [`builder`]: wiring of bus, subscribers, registry and monitor.

mod actor;
mod builder;
mod config;
mod monitor;
mod registry;
mod shutdown;
mod status;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::Config;
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
pub use status::{StreamSpec, WorkerInfo, WorkerKind, WorkerSpec, WorkerState};
pub use supervisor::Supervisor;
