//! # Worker registry: the single owner of every live worker.
//!
//! Maps each key to at most one [`WorkerHandle`]. All mutation happens under one
//! `std::sync::Mutex` that is never held across an `.await`; anything slow (confirming a
//! process, releasing a resource, reading diagnostics) runs with the lock released.
//!
//! ## Start
//! ```text
//! start(key, spec)
//!   ├─► lock: closed? → ShuttingDown; live entry or reservation? → AlreadyActive
//!   │         dead entry? → take it out; reserve key
//!   ├─► dead entry taken out → log diagnostics, WorkerCrashed
//!   ├─► Stream:  spawn StreamActor(child token)
//!   ├─► Process: spawn → confirm window → dead? → Launch(ExitedEarly{diagnostics})
//!   └─► lock: insert handle, drop reservation → WorkerAdded
//! ```
//! A reservation is released on every exit path, including a dropped caller future.
//!
//! ## Stop
//! ```text
//! stop(key)
//!   ├─► lock: missing or already winding down? → NotFound
//!   │         StoppingRequested, cancel, take resource
//!   ├─► release resource (grace, then force)
//!   └─► lock: remove entry if the generation still matches → Stopped
//! ```
//!
//! ## Rules
//! - A live key is never replaced; a second start is rejected. An entry whose resource
//!   already died is not live: `start` retires it on the spot instead of waiting for the
//!   monitor, and snapshots report it as `Crashed` until then.
//! - Stop and reap are mutually exclusive per key: whoever takes the handle first wins and
//!   the other observes `NotFound` / nothing to do.
//! - Removal compares the handle generation so a late removal never hits a newer worker
//!   registered under the same key.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        actor::{StreamActor, StreamActorParams},
        config::Config,
        status::{StatusCell, StreamSpec, WorkerInfo, WorkerKind, WorkerSpec, WorkerState},
    },
    detect::{Detector, FrameSink},
    error::{LaunchError, RegistryError, RuntimeError},
    events::{Bus, Event, EventKind},
    resources::{CommandSpec, ManagedProcess, ProcessLauncher, StreamSource},
};

/// The resource a worker owns exclusively.
enum Resource {
    Stream(JoinHandle<()>),
    Process(Box<dyn ManagedProcess>),
}

/// Registry entry of one live worker.
struct WorkerHandle {
    generation: u64,
    kind: WorkerKind,
    cancel: CancellationToken,
    started_at: SystemTime,
    pid: Option<u32>,
    status: Arc<StatusCell>,
    /// `None` once stop or reap has taken it.
    resource: Option<Resource>,
}

impl WorkerHandle {
    fn info(&self) -> WorkerInfo {
        let status = self.status.snapshot();
        WorkerInfo {
            key: self.status.key().to_string(),
            kind: self.kind,
            state: status.state,
            pid: self.pid,
            started_at: self.started_at,
            last_error: status.last_error,
            reconnects: status.reconnects,
        }
    }

    /// Like [`info`](Self::info), but a worker whose resource already died is reported as
    /// `Crashed` even before the monitor reaps it.
    fn snapshot(&mut self) -> WorkerInfo {
        let mut info = self.info();
        if self.is_dead() {
            info.state = WorkerState::Crashed;
        }
        info
    }

    /// Whether the monitor should reap this worker.
    fn is_dead(&mut self) -> bool {
        let state = self.status.state();
        match &mut self.resource {
            Some(Resource::Process(process)) => {
                state == WorkerState::Running && !process.is_alive()
            }
            Some(Resource::Stream(join)) => !state.is_winding_down() && join.is_finished(),
            None => false,
        }
    }
}

#[derive(Default)]
struct Inner {
    workers: HashMap<String, WorkerHandle>,
    pending: HashSet<String>,
    closed: bool,
}

/// Keyed registry of live workers.
pub(crate) struct Registry {
    inner: Mutex<Inner>,
    generations: AtomicU64,
    cfg: Config,
    bus: Bus,
    runtime_token: CancellationToken,
    source: Arc<dyn StreamSource>,
    detector: Arc<dyn Detector>,
    sink: Arc<dyn FrameSink>,
    launcher: Arc<dyn ProcessLauncher>,
}

/// Holds a key while its start is in flight.
struct Reservation<'a> {
    registry: &'a Registry,
    key: String,
    committed: bool,
}

impl Reservation<'_> {
    /// Inserts `handle`; hands it back when the registry closed in the meantime.
    fn commit(mut self, handle: WorkerHandle) -> Result<WorkerInfo, WorkerHandle> {
        let mut inner = self.registry.lock();
        inner.pending.remove(&self.key);
        self.committed = true;
        if inner.closed {
            return Err(handle);
        }
        let info = handle.info();
        inner.workers.insert(self.key.clone(), handle);
        Ok(info)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.lock().pending.remove(&self.key);
        }
    }
}

/// Outcome of releasing one resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Release {
    Graceful,
    Forced,
}

impl Registry {
    pub(crate) fn new(
        cfg: Config,
        bus: Bus,
        runtime_token: CancellationToken,
        source: Arc<dyn StreamSource>,
        detector: Arc<dyn Detector>,
        sink: Arc<dyn FrameSink>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            generations: AtomicU64::new(0),
            cfg,
            bus,
            runtime_token,
            source,
            detector,
            sink,
            launcher,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts a worker under `key`.
    pub(crate) async fn start(
        &self,
        key: &str,
        spec: WorkerSpec,
    ) -> Result<WorkerInfo, RegistryError> {
        let kind = spec.kind();
        let started = match self.reserve(key) {
            Ok((reservation, dead)) => {
                if let Some(handle) = dead {
                    self.retire(key.to_string(), handle).await;
                }
                match spec {
                    WorkerSpec::Stream(stream) => self.start_stream(reservation, stream),
                    WorkerSpec::Process(cmd) => self.start_process(reservation, cmd).await,
                }
            }
            Err(e) => Err(e),
        };

        match &started {
            Ok(info) => {
                tracing::info!(worker = %key, ?kind, pid = ?info.pid, "worker added");
                self.bus.publish(
                    Event::new(EventKind::WorkerAdded)
                        .with_worker(key)
                        .with_pid(info.pid),
                );
            }
            Err(e) => {
                tracing::warn!(worker = %key, ?kind, error = %e, "start rejected");
                self.bus.publish(
                    Event::new(EventKind::StartRejected)
                        .with_worker(key)
                        .with_reason(e.as_label()),
                );
            }
        }
        started
    }

    /// Reserves `key` for a start.
    ///
    /// An entry whose resource already died is taken out under the same lock and handed
    /// back, so the caller can report the crash and the new start proceeds.
    fn reserve(
        &self,
        key: &str,
    ) -> Result<(Reservation<'_>, Option<WorkerHandle>), RegistryError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(RegistryError::ShuttingDown);
        }
        if inner.pending.contains(key) {
            return Err(RegistryError::AlreadyActive {
                key: key.to_string(),
            });
        }
        let dead = match inner.workers.get_mut(key).map(WorkerHandle::is_dead) {
            Some(true) => inner.workers.remove(key),
            Some(false) => {
                return Err(RegistryError::AlreadyActive {
                    key: key.to_string(),
                });
            }
            None => None,
        };
        inner.pending.insert(key.to_string());
        let reservation = Reservation {
            registry: self,
            key: key.to_string(),
            committed: false,
        };
        Ok((reservation, dead))
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed)
    }

    fn start_stream(
        &self,
        reservation: Reservation<'_>,
        spec: StreamSpec,
    ) -> Result<WorkerInfo, RegistryError> {
        let key: Arc<str> = Arc::from(reservation.key.as_str());
        let status = StatusCell::new(Arc::clone(&key), self.bus.clone());
        let cancel = self.runtime_token.child_token();

        let actor = StreamActor::new(
            spec.address,
            Arc::clone(&self.source),
            Arc::clone(&self.detector),
            Arc::clone(&self.sink),
            Arc::clone(&status),
            StreamActorParams {
                backoff: self.cfg.reconnect,
                stride: self.cfg.stride_clamped(),
            },
            self.bus.clone(),
        );
        let join = tokio::spawn(actor.run(cancel.clone()));

        let handle = WorkerHandle {
            generation: self.next_generation(),
            kind: WorkerKind::Stream,
            cancel,
            started_at: SystemTime::now(),
            pid: None,
            status,
            resource: Some(Resource::Stream(join)),
        };
        reservation.commit(handle).map_err(|handle| {
            handle.cancel.cancel();
            if let Some(Resource::Stream(join)) = handle.resource {
                join.abort();
            }
            RegistryError::ShuttingDown
        })
    }

    async fn start_process(
        &self,
        reservation: Reservation<'_>,
        cmd: CommandSpec,
    ) -> Result<WorkerInfo, RegistryError> {
        let key = reservation.key.clone();
        let launch_failed = |source: LaunchError| RegistryError::Launch {
            key: key.clone(),
            source,
        };

        let mut process = self.launcher.spawn(&cmd).await.map_err(&launch_failed)?;
        tracing::debug!(worker = %key, program = %cmd.program, pid = ?process.id(), "process spawned; confirming");

        let shutting_down = tokio::select! {
            _ = tokio::time::sleep(self.cfg.confirm_window) => false,
            _ = self.runtime_token.cancelled() => true,
        };
        if shutting_down {
            release_process(&key, process, self.cfg.stop_grace).await;
            return Err(RegistryError::ShuttingDown);
        }
        if !process.is_alive() {
            let diagnostics = process.diagnostics().await;
            return Err(launch_failed(LaunchError::ExitedEarly {
                code: process.exit_code(),
                diagnostics,
            }));
        }

        let pid = process.id();
        let status = StatusCell::new(Arc::from(key.as_str()), self.bus.clone());
        status.running(pid);
        let handle = WorkerHandle {
            generation: self.next_generation(),
            kind: WorkerKind::Process,
            cancel: self.runtime_token.child_token(),
            started_at: SystemTime::now(),
            pid,
            status,
            resource: Some(Resource::Process(process)),
        };

        match reservation.commit(handle) {
            Ok(info) => Ok(info),
            Err(mut handle) => {
                if let Some(Resource::Process(process)) = handle.resource.take() {
                    release_process(&key, process, self.cfg.stop_grace).await;
                }
                Err(RegistryError::ShuttingDown)
            }
        }
    }

    /// Stops the worker under `key` and waits for its resource to be released.
    pub(crate) async fn stop(&self, key: &str) -> Result<WorkerInfo, RegistryError> {
        let (generation, resource, status, mut info) = {
            let mut inner = self.lock();
            let handle = inner
                .workers
                .get_mut(key)
                .filter(|h| !h.status.state().is_winding_down())
                .ok_or_else(|| RegistryError::NotFound {
                    key: key.to_string(),
                })?;
            handle.status.stopping();
            handle.cancel.cancel();
            (
                handle.generation,
                handle.resource.take(),
                Arc::clone(&handle.status),
                handle.info(),
            )
        };
        tracing::info!(worker = %key, "stop requested");

        let released = match resource {
            Some(resource) => self.release(key, resource).await,
            None => Release::Graceful,
        };

        {
            let mut inner = self.lock();
            if inner
                .workers
                .get(key)
                .is_some_and(|h| h.generation == generation)
            {
                inner.workers.remove(key);
            }
        }
        status.stopped(released == Release::Forced);
        tracing::info!(worker = %key, forced = released == Release::Forced, "worker stopped");

        let status = status.snapshot();
        info.state = status.state;
        info.last_error = status.last_error;
        Ok(info)
    }

    async fn release(&self, key: &str, resource: Resource) -> Release {
        match resource {
            Resource::Process(process) => release_process(key, process, self.cfg.stop_grace).await,
            Resource::Stream(join) => {
                let released = release_stream(key, join, self.cfg.stop_grace).await;
                self.sink.release(key);
                released
            }
        }
    }

    /// Snapshot of every registered worker, sorted by key.
    pub(crate) fn list(&self) -> Vec<WorkerInfo> {
        let mut inner = self.lock();
        let mut infos: Vec<WorkerInfo> = inner.workers.values_mut().map(WorkerHandle::snapshot).collect();
        infos.sort_unstable_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    /// Snapshot of one worker.
    pub(crate) fn get(&self, key: &str) -> Option<WorkerInfo> {
        self.lock().workers.get_mut(key).map(WorkerHandle::snapshot)
    }

    /// Number of registered workers.
    pub(crate) fn len(&self) -> usize {
        self.lock().workers.len()
    }

    /// Stops everything and refuses further starts.
    ///
    /// Every worker is released concurrently, each bounded by the stop grace. The registry
    /// ends up empty whatever the outcome; workers that had to be killed or aborted are
    /// reported in [`RuntimeError::GraceExceeded`].
    pub(crate) async fn shutdown_all(&self) -> Result<(), RuntimeError> {
        let drained: Vec<(String, WorkerHandle)> = {
            let mut inner = self.lock();
            inner.closed = true;
            inner.workers.drain().collect()
        };

        for (_, handle) in &drained {
            handle.status.stopping();
            handle.cancel.cancel();
        }

        let releases = drained.into_iter().map(|(key, mut handle)| async move {
            let released = match handle.resource.take() {
                Some(resource) => self.release(&key, resource).await,
                None => Release::Graceful,
            };
            handle.status.stopped(released == Release::Forced);
            (key, released)
        });

        let mut stuck: Vec<String> = join_all(releases)
            .await
            .into_iter()
            .filter(|(_, released)| *released == Release::Forced)
            .map(|(key, _)| key)
            .collect();

        if stuck.is_empty() {
            return Ok(());
        }
        stuck.sort_unstable();
        Err(RuntimeError::GraceExceeded {
            grace: self.cfg.stop_grace,
            stuck,
        })
    }

    /// Removes every worker whose resource died on its own. Called by the health monitor.
    ///
    /// Returns the reaped keys.
    pub(crate) async fn reap(&self) -> Vec<String> {
        let dead: Vec<(String, WorkerHandle)> = {
            let mut inner = self.lock();
            let keys: Vec<String> = inner
                .workers
                .iter_mut()
                .filter_map(|(key, handle)| handle.is_dead().then(|| key.clone()))
                .collect();
            keys.into_iter()
                .filter_map(|key| inner.workers.remove(&key).map(|h| (key, h)))
                .collect()
        };

        let mut reaped = Vec::with_capacity(dead.len());
        for (key, handle) in dead {
            reaped.push(key.clone());
            self.retire(key, handle).await;
        }
        reaped
    }

    /// Finishes a worker found dead: collects its diagnostics, logs them and marks it
    /// `Crashed`. The handle must already be out of the map.
    async fn retire(&self, key: String, mut handle: WorkerHandle) {
        handle.cancel.cancel();
        let diagnostics = match handle.resource.take() {
            Some(Resource::Process(process)) => {
                let text = process.diagnostics().await;
                match process.exit_code() {
                    Some(code) => format!("exit code {code}: {text}"),
                    None => text,
                }
            }
            Some(Resource::Stream(join)) => {
                self.sink.release(&key);
                match join.await {
                    Err(e) if e.is_panic() => "worker loop panicked".to_string(),
                    _ => "worker loop exited".to_string(),
                }
            }
            None => String::new(),
        };
        tracing::error!(
            worker = %key,
            pid = ?handle.pid,
            diagnostics = %diagnostics,
            "worker died; removed from registry"
        );
        handle.status.crashed(handle.pid, &diagnostics);
    }
}

/// SIGTERM, wait up to `grace`, then kill and wait up to `grace` again.
async fn release_process(key: &str, mut process: Box<dyn ManagedProcess>, grace: Duration) -> Release {
    if let Err(e) = process.terminate() {
        tracing::warn!(worker = %key, error = %e, "terminate failed");
    }
    match tokio::time::timeout(grace, process.wait()).await {
        Ok(Ok(())) => Release::Graceful,
        Ok(Err(e)) => {
            tracing::warn!(worker = %key, error = %e, "wait failed after terminate");
            Release::Graceful
        }
        Err(_elapsed) => {
            tracing::warn!(worker = %key, ?grace, "process ignored terminate; killing");
            if let Err(e) = process.kill() {
                tracing::error!(worker = %key, error = %e, "kill failed");
            }
            if tokio::time::timeout(grace, process.wait()).await.is_err() {
                tracing::error!(worker = %key, pid = ?process.id(), "process did not exit after kill");
            }
            Release::Forced
        }
    }
}

/// Waits up to `grace` for a cancelled loop to close its stream, then aborts it.
async fn release_stream(key: &str, mut join: JoinHandle<()>, grace: Duration) -> Release {
    match tokio::time::timeout(grace, &mut join).await {
        Ok(Ok(())) => Release::Graceful,
        Ok(Err(e)) => {
            tracing::warn!(worker = %key, error = %e, "worker loop ended abnormally");
            Release::Graceful
        }
        Err(_elapsed) => {
            tracing::warn!(worker = %key, ?grace, "worker loop ignored cancellation; aborting");
            join.abort();
            let _ = join.await;
            Release::Forced
        }
    }
}
