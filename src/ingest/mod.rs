// src/ingest/mod.rs
pub mod admission;
pub mod dispatch;
pub mod duration;
pub mod index;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::ingest::admission::AdmissionPolicy;
use crate::ingest::types::{
    ChannelSource, Decision, DispatchJob, IngestionDispatcher, IngestionVerdict, Source,
};

/// Default pause after each dispatch, protecting the worker pool from bursts.
pub const DEFAULT_DISPATCH_PAUSE: Duration = Duration::from_secs(5);

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("watch_items_total", "Videos read from channel feeds.");
        describe_counter!(
            "watch_skip_exists_total",
            "Videos skipped because they are already indexed."
        );
        describe_counter!(
            "watch_skip_short_total",
            "Videos skipped on long-only sources for being too short."
        );
        describe_counter!("watch_dispatch_total", "Jobs accepted by the ingestion worker.");
        describe_counter!(
            "watch_dispatch_errors_total",
            "Jobs the ingestion worker could not be reached for."
        );
        describe_counter!(
            "watch_source_errors_total",
            "Channel feed fetch/parse errors."
        );
        describe_counter!("watch_probe_errors_total", "Duration probe failures.");
        describe_histogram!("watch_feed_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("watch_last_run_ts", "Unix ts when the watch cycle last completed.");
    });
}

/// Verdict for one video together with the source it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceVerdict {
    pub source_id: String,
    #[serde(flatten)]
    pub verdict: IngestionVerdict,
}

/// What a single watch cycle saw and did. Callers are free to ignore it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatchReport {
    pub verdicts: Vec<SourceVerdict>,
    pub dispatched: Vec<DispatchJob>,
}

impl WatchReport {
    pub fn count(&self, decision: Decision) -> usize {
        self.verdicts
            .iter()
            .filter(|v| v.verdict.decision == decision)
            .count()
    }

    pub fn verdict_for(&self, item_id: &str) -> Option<&IngestionVerdict> {
        self.verdicts
            .iter()
            .map(|v| &v.verdict)
            .find(|v| v.item_id == item_id)
    }
}

/// Walks every tracked source once: feed → existence → admission → dispatch.
///
/// Holds no cursor between runs; the index is the only memory. Every
/// collaborator absorbs its own failures, so a run always completes.
pub struct WatchCycle {
    sources: Vec<Source>,
    channel: Arc<dyn ChannelSource>,
    policy: AdmissionPolicy,
    dispatcher: Arc<dyn IngestionDispatcher>,
    pause: Duration,
}

impl WatchCycle {
    pub fn new(
        sources: Vec<Source>,
        channel: Arc<dyn ChannelSource>,
        policy: AdmissionPolicy,
        dispatcher: Arc<dyn IngestionDispatcher>,
    ) -> Self {
        Self {
            sources,
            channel,
            policy,
            dispatcher,
            pause: DEFAULT_DISPATCH_PAUSE,
        }
    }

    pub fn with_dispatch_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub async fn run_once(&self) -> WatchReport {
        ensure_metrics_described();
        let mut report = WatchReport::default();

        for source in &self.sources {
            tracing::info!(target: "watch", source = source.label(), "checking channel");
            let items = self.channel.latest_items(source).await;

            for item in &items {
                let verdict = self.policy.decide(source, item).await;
                match verdict.decision {
                    Decision::SkipExists => {
                        tracing::debug!(target: "watch", video_id = %item.id, "already indexed");
                        counter!("watch_skip_exists_total").increment(1);
                    }
                    Decision::SkipTooShort => {
                        tracing::info!(
                            target: "watch",
                            video_id = %item.id,
                            duration_secs = verdict.duration_secs.unwrap_or(0),
                            "too short, skipped"
                        );
                        counter!("watch_skip_short_total").increment(1);
                    }
                    Decision::Accept => {
                        tracing::info!(
                            target: "watch",
                            video_id = %item.id,
                            title = %item.title,
                            "accepted, dispatching"
                        );
                        let job = DispatchJob::from(item);
                        self.dispatcher.dispatch(&job).await;
                        report.dispatched.push(job);
                        if !self.pause.is_zero() {
                            tokio::time::sleep(self.pause).await;
                        }
                    }
                }
                report.verdicts.push(SourceVerdict {
                    source_id: source.id.clone(),
                    verdict,
                });
            }
        }

        let now = chrono::Utc::now().timestamp().max(0);
        gauge!("watch_last_run_ts").set(now as f64);
        tracing::info!(
            target: "watch",
            seen = report.verdicts.len(),
            dispatched = report.dispatched.len(),
            "watch cycle finished"
        );
        report
    }
}
