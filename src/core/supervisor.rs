//! # Supervisor: the public face of the runtime.
//!
//! The [`Supervisor`] owns the event bus, the worker registry, the health monitor and the
//! subscriber fan-out. Control surfaces hold an `Arc<Supervisor>` and call
//! [`start`](Supervisor::start) / [`stop`](Supervisor::stop) / [`list`](Supervisor::list);
//! nothing else mutates the set of workers.
//!
//! ## High-level architecture
//! ```text
//! Control surface ──► Supervisor::start(key, spec) ──► Registry
//!                                                        ├─ Stream  → StreamActor (child token)
//!                                                        └─ Process → ManagedProcess
//!
//! Health monitor ──(every monitor_interval)──► Registry::reap()
//!
//! Event flow:
//!   StreamActor / Registry / Monitor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                             └──► Supervisor::subscribe() receivers
//!
//! Shutdown path:
//!   shutdown_all()
//!     └─► Bus.publish(ShutdownRequested)
//!     └─► Registry::shutdown_all(): refuse new starts, cancel + release all (bounded by stop_grace)
//!            ├─ all graceful → Bus.publish(AllStoppedWithin)
//!            └─ any forced   → Bus.publish(GraceExceeded), RuntimeError::GraceExceeded
//!     └─► runtime_token.cancel() → monitor exits, listener drains and closes subscribers
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use streamvisor::{CommandSpec, Config, Supervisor, WorkerSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = Supervisor::builder(Config::default()).build();
//!
//!     sup.start("camera-7", WorkerSpec::stream("rtsp://10.0.0.7/stream1")).await?;
//!     sup.start(
//!         "lobby",
//!         WorkerSpec::process(CommandSpec::new("ffmpeg").args(["-i", "rtsp://10.0.0.8/live"])),
//!     )
//!     .await?;
//!
//!     for worker in sup.list() {
//!         println!("{} {:?}", worker.key, worker.state);
//!     }
//!
//!     sup.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        builder::SupervisorBuilder,
        config::Config,
        registry::Registry,
        shutdown,
        status::{WorkerInfo, WorkerSpec},
    },
    error::{RegistryError, RuntimeError},
    events::{Bus, Event, EventKind},
    subscribers::SubscriberSet,
};

/// Owns the workers and everything that watches them.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    registry: Arc<Registry>,
    runtime_token: CancellationToken,
    /// Health monitor and subscriber listener; joined by `shutdown_all`.
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Supervisor {
    /// Returns a builder for a supervisor with the given configuration.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        registry: Arc<Registry>,
        runtime_token: CancellationToken,
        background: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            cfg,
            bus,
            registry,
            runtime_token,
            background: Mutex::new(background),
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Starts a worker under `key`.
    ///
    /// Returns once the worker is registered: immediately for stream workers, after the
    /// confirmation window for process workers.
    ///
    /// # Errors
    /// - [`RegistryError::AlreadyActive`] when `key` is live or being started
    /// - [`RegistryError::Launch`] when the process could not be started or died during the
    ///   confirmation window (with its diagnostics)
    /// - [`RegistryError::ShuttingDown`] after [`shutdown_all`](Self::shutdown_all)
    pub async fn start(&self, key: &str, spec: WorkerSpec) -> Result<WorkerInfo, RegistryError> {
        self.registry.start(key, spec).await
    }

    /// Stops the worker under `key`, waiting until its resource is released.
    ///
    /// # Errors
    /// [`RegistryError::NotFound`] when no live worker holds `key`, including when another
    /// stop or the health monitor got there first.
    pub async fn stop(&self, key: &str) -> Result<WorkerInfo, RegistryError> {
        self.registry.stop(key).await
    }

    /// Snapshot of all workers, sorted by key.
    pub fn list(&self) -> Vec<WorkerInfo> {
        self.registry.list()
    }

    /// Snapshot of one worker.
    pub fn get(&self, key: &str) -> Option<WorkerInfo> {
        self.registry.get(key)
    }

    /// Number of registered workers.
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    /// Receiver for runtime events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Stops every worker and the runtime's background tasks.
    ///
    /// Later [`start`](Self::start) calls fail with [`RegistryError::ShuttingDown`]. The
    /// registry is empty afterwards whatever the outcome.
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] listing the workers that had to be killed or aborted.
    pub async fn shutdown_all(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        tracing::info!(workers = self.registry.len(), "shutting down all workers");

        let res = self.registry.shutdown_all().await;
        match &res {
            Ok(()) => {
                tracing::info!("all workers stopped within grace");
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            }
            Err(RuntimeError::GraceExceeded { grace, stuck }) => {
                tracing::warn!(?grace, stuck = ?stuck, "workers had to be forced down");
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")),
                );
            }
        }

        self.runtime_token.cancel();
        let background: Vec<JoinHandle<()>> = {
            let mut guard = self
                .background
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::take(&mut *guard)
        };
        for task in background {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        res
    }

    /// Waits for a termination signal, then runs [`shutdown_all`](Self::shutdown_all).
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        match shutdown::wait_for_shutdown_signal().await {
            Ok(signal) => tracing::info!(%signal, "termination signal received"),
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for termination signals");
                std::future::pending::<()>().await;
            }
        }
        self.shutdown_all().await
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.runtime_token.cancel();
    }
}

/// Forwards bus events to the subscriber set until the runtime token is cancelled.
///
/// Events already queued at cancellation are still delivered, then the subscribers are
/// drained and closed. Returns `None` when there are no subscribers.
pub(crate) fn spawn_subscriber_listener(
    bus: &Bus,
    subs: SubscriberSet,
    runtime_token: CancellationToken,
) -> Option<JoinHandle<()>> {
    if subs.is_empty() {
        return None;
    }
    let mut rx = bus.subscribe();

    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Ok(ev) => subs.emit(ev),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = runtime_token.cancelled() => {
                    loop {
                        match rx.try_recv() {
                            Ok(ev) => subs.emit(ev),
                            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                            Err(_) => break,
                        }
                    }
                    break;
                }
            }
        }
        subs.shutdown().await;
    }))
}
