use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

// tokio intervals reject a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

impl Store {
    /// Sweeps expired records every `interval` until `shutdown` is cancelled
    /// or the store is dropped.
    ///
    /// The task only holds a weak reference between sweeps. Each sweep runs as
    /// its own task, so a panic inside one is logged and the next tick still
    /// fires.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {},
                }
                let Some(store) = store.upgrade() else {
                    break;
                };
                match tokio::spawn(async move { store.reap().await }).await {
                    Ok(report) if report.is_empty() => tracing::debug!("Reaper found nothing to remove"),
                    Ok(report) => tracing::info!(
                        users = report.users,
                        sessions = report.sessions,
                        states = report.states,
                        "Reaped expired records"
                    ),
                    Err(err) => tracing::error!(error = %err, "Reaper sweep failed"),
                }
            }
            tracing::debug!("Reaper stopped");
        })
    }
}
