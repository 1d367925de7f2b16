// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;

use crate::ingest::WatchCycle;

/// Periodic in-process trigger for deployments without an external cron.
///
/// Runs are strictly sequential: a slow cycle delays the next tick instead
/// of overlapping with it.
pub fn spawn_watch_scheduler(cycle: Arc<WatchCycle>, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = cycle.run_once().await;
            counter!("watch_runs_total").increment(1);
            tracing::info!(
                target: "watch",
                seen = report.verdicts.len(),
                dispatched = report.dispatched.len(),
                "scheduled watch tick"
            );
        }
    })
}
