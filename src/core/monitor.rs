//! # Health monitor: periodic reaping of dead workers.
//!
//! Process workers have no loop of their own watching the child, so a relay that dies after
//! its confirmation window would otherwise stay listed as `Running` forever. The monitor
//! polls liveness on a fixed period and hands every dead worker to [`Registry::reap`], which
//! removes it under the registry lock, then logs the diagnostics and publishes
//! `WorkerCrashed` with the lock released.
//!
//! ```text
//! build ──► +period ──► tick ──► reap ──► +period ──► tick ──► ...
//!                                                     (until runtime token cancelled)
//! ```
//!
//! A crash is noticed within one period of happening; the key can be started again as soon
//! as it has been reaped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::registry::Registry;

/// Spawns the monitor loop. The first check runs one `period` after this call.
pub(crate) fn spawn_monitor(
    registry: Arc<Registry>,
    period: Duration,
    runtime_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = runtime_token.cancelled() => break,
                _ = ticker.tick() => {
                    let reaped = registry.reap().await;
                    if !reaped.is_empty() {
                        tracing::debug!(count = reaped.len(), "monitor reaped workers");
                    }
                }
            }
        }
        tracing::debug!("health monitor stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::config::Config;
    use crate::core::status::WorkerSpec;
    use crate::detect::{DiscardSink, NoopDetector};
    use crate::events::{Bus, EventKind};
    use crate::resources::CommandSpec;
    use crate::testing::{FakeLauncher, ScriptedSource};

    #[tokio::test(start_paused = true)]
    async fn crashed_process_is_reaped_within_one_period() {
        let origin = Instant::now();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();
        let launcher = Arc::new(FakeLauncher::default());
        let registry = Registry::new(
            Config::default(),
            bus,
            token.clone(),
            Arc::new(ScriptedSource::new([])),
            Arc::new(NoopDetector),
            Arc::new(DiscardSink),
            launcher.clone(),
        );
        let monitor = spawn_monitor(Arc::clone(&registry), Duration::from_secs(5), token.clone());
        let relay = || WorkerSpec::process(CommandSpec::new("ffmpeg"));

        // Confirmed at t=1s, dies at t=11s; ticks run at 5s, 10s, 15s.
        registry.start("lobby", relay()).await.expect("started");
        time::sleep_until(origin + Duration::from_secs(11)).await;
        launcher.probes()[0].crash();
        assert!(registry.get("lobby").is_some());

        time::sleep_until(origin + Duration::from_secs(16)).await;
        assert!(registry.get("lobby").is_none());

        let crashed = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|ev| ev.kind == EventKind::WorkerCrashed)
            .expect("crash event");
        assert_eq!(crashed.worker.as_deref(), Some("lobby"));
        assert_eq!(crashed.pid, Some(launcher.probes()[0].pid));

        registry.start("lobby", relay()).await.expect("restartable");

        token.cancel();
        monitor.await.expect("monitor exits");
    }
}
