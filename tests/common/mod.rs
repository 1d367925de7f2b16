// tests/common/mod.rs
// Hand-written collaborators with call recording, shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use catalog_sentinel::ingest::admission::AdmissionPolicy;
use catalog_sentinel::ingest::types::{
    CandidateItem, ChannelSource, DispatchJob, DurationProbe, ExistenceOracle,
    IngestionDispatcher, Source,
};
use catalog_sentinel::ingest::WatchCycle;

pub fn item(id: &str) -> CandidateItem {
    CandidateItem {
        id: id.to_string(),
        title: format!("Video {id}"),
        url: format!("https://www.youtube.com/watch?v={id}"),
        discovered_at: 1_700_000_000,
        published_at: None,
    }
}

/// Feed per source id; sources listed in `broken` behave like an unreachable feed.
#[derive(Default)]
pub struct MockChannel {
    pub feeds: HashMap<String, Vec<CandidateItem>>,
    pub broken: HashSet<String>,
    pub calls: AtomicUsize,
}

impl MockChannel {
    pub fn with(mut self, source_id: &str, ids: &[&str]) -> Self {
        self.feeds
            .insert(source_id.to_string(), ids.iter().map(|i| item(i)).collect());
        self
    }

    pub fn broken(mut self, source_id: &str) -> Self {
        self.broken.insert(source_id.to_string());
        self
    }
}

#[async_trait]
impl ChannelSource for MockChannel {
    async fn latest_items(&self, source: &Source) -> Vec<CandidateItem> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(&source.id) {
            // what a failing adapter degrades to
            return Vec::new();
        }
        self.feeds.get(&source.id).cloned().unwrap_or_default()
    }
}

#[derive(Default)]
pub struct MockIndex {
    pub present: HashSet<String>,
    pub calls: AtomicUsize,
}

impl MockIndex {
    pub fn containing(ids: &[&str]) -> Self {
        Self {
            present: ids.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExistenceOracle for MockIndex {
    async fn exists(&self, item_id: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.present.contains(item_id)
    }
}

/// Durations keyed by URL; unknown URLs probe as 0 like a failed lookup.
#[derive(Default)]
pub struct MockProbe {
    pub durations: HashMap<String, u64>,
    pub calls: AtomicUsize,
}

impl MockProbe {
    pub fn with(mut self, id: &str, secs: u64) -> Self {
        self.durations.insert(item(id).url, secs);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurationProbe for MockProbe {
    async fn duration_seconds(&self, url: &str) -> u64 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.durations.get(url).copied().unwrap_or(0)
    }
}

/// Records every submission; ids in `failing` simulate an unreachable worker.
#[derive(Default)]
pub struct MockDispatcher {
    pub attempted: Mutex<Vec<DispatchJob>>,
    pub delivered: Mutex<Vec<DispatchJob>>,
    pub failing: HashSet<String>,
}

impl MockDispatcher {
    pub fn failing_for(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn attempted_ids(&self) -> Vec<String> {
        self.attempted
            .lock()
            .unwrap()
            .iter()
            .map(|j| j.video_id.clone())
            .collect()
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|j| j.video_id.clone())
            .collect()
    }
}

#[async_trait]
impl IngestionDispatcher for MockDispatcher {
    async fn dispatch(&self, job: &DispatchJob) {
        self.attempted.lock().unwrap().push(job.clone());
        if !self.failing.contains(&job.video_id) {
            self.delivered.lock().unwrap().push(job.clone());
        }
    }
}

pub fn cycle(
    sources: Vec<Source>,
    channel: Arc<MockChannel>,
    index: Arc<MockIndex>,
    probe: Arc<MockProbe>,
    dispatcher: Arc<MockDispatcher>,
) -> WatchCycle {
    let policy = AdmissionPolicy::new(index, probe);
    WatchCycle::new(sources, channel, policy, dispatcher)
        .with_dispatch_pause(std::time::Duration::ZERO)
}
