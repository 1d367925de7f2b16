// src/ingest/types.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How a tracked source decides which of its new videos are worth ingesting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionMode {
    /// Every video not yet in the index is ingested.
    #[default]
    #[serde(rename = "all", alias = "admit_all", alias = "ADMIT_ALL")]
    AdmitAll,
    /// Only videos at least `min_duration_secs` long are ingested.
    #[serde(rename = "only_long", alias = "admit_long_only", alias = "ADMIT_LONG_ONLY")]
    AdmitLongOnly,
}

/// A tracked channel. Part of the static watch list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: String, // e.g., "UCuTIiHyNqELu6RNtB4AahAA"
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mode: AdmissionMode,
}

impl Source {
    pub fn new(id: impl Into<String>, name: impl Into<String>, mode: AdmissionMode) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mode,
        }
    }

    /// Display name, falling back to the id when none was configured.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// A video seen in a channel feed during one polling cycle. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub discovered_at: u64,        // unix seconds, when the feed was read
    pub published_at: Option<u64>, // unix seconds, as reported by the feed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    SkipExists,
    SkipTooShort,
    Accept,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionVerdict {
    pub item_id: String,
    pub decision: Decision,
    /// Only set when the duration probe actually ran.
    pub duration_secs: Option<u64>,
}

impl IngestionVerdict {
    pub fn is_accept(&self) -> bool {
        self.decision == Decision::Accept
    }
}

/// Job handed to the external transcription/embedding worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchJob {
    pub url: String,
    pub video_id: String,
}

impl From<&CandidateItem> for DispatchJob {
    fn from(item: &CandidateItem) -> Self {
        Self {
            url: item.url.clone(),
            video_id: item.id.clone(),
        }
    }
}

/// Enumerates the latest videos of a source, most recent first.
/// Fails open: transport or parse errors yield an empty list.
#[async_trait]
pub trait ChannelSource: Send + Sync {
    async fn latest_items(&self, source: &Source) -> Vec<CandidateItem>;
}

/// Answers "is this video already in the vector index?".
/// Errors are reported as `false`.
#[async_trait]
pub trait ExistenceOracle: Send + Sync {
    async fn exists(&self, item_id: &str) -> bool;
}

/// Measures a video's length from metadata only. Errors are reported as `0`.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration_seconds(&self, url: &str) -> u64;
}

/// Submits a job to the external worker and returns without waiting for it.
/// Transport errors are logged and swallowed; the next watch cycle retries.
#[async_trait]
pub trait IngestionDispatcher: Send + Sync {
    async fn dispatch(&self, job: &DispatchJob);
}
