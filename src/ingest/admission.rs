// src/ingest/admission.rs
use std::sync::Arc;

use crate::ingest::types::{
    AdmissionMode, CandidateItem, Decision, DurationProbe, ExistenceOracle, IngestionVerdict,
    Source,
};

/// Videos shorter than this are not worth transcribing on long-only sources.
pub const MIN_DURATION_SECS: u64 = 1200;

/// Decides, per discovered video, whether it should be ingested.
///
/// Existence is checked before duration on purpose: probing is the
/// expensive step and must only run for videos not yet in the index.
#[derive(Clone)]
pub struct AdmissionPolicy {
    oracle: Arc<dyn ExistenceOracle>,
    probe: Arc<dyn DurationProbe>,
    min_duration_secs: u64,
}

impl AdmissionPolicy {
    pub fn new(oracle: Arc<dyn ExistenceOracle>, probe: Arc<dyn DurationProbe>) -> Self {
        Self {
            oracle,
            probe,
            min_duration_secs: MIN_DURATION_SECS,
        }
    }

    pub fn with_min_duration(mut self, secs: u64) -> Self {
        self.min_duration_secs = secs;
        self
    }

    pub fn min_duration_secs(&self) -> u64 {
        self.min_duration_secs
    }

    pub async fn decide(&self, source: &Source, item: &CandidateItem) -> IngestionVerdict {
        if self.oracle.exists(&item.id).await {
            return IngestionVerdict {
                item_id: item.id.clone(),
                decision: Decision::SkipExists,
                duration_secs: None,
            };
        }

        match source.mode {
            AdmissionMode::AdmitAll => IngestionVerdict {
                item_id: item.id.clone(),
                decision: Decision::Accept,
                duration_secs: None,
            },
            AdmissionMode::AdmitLongOnly => {
                let secs = self.probe.duration_seconds(&item.url).await;
                let decision = if secs < self.min_duration_secs {
                    Decision::SkipTooShort
                } else {
                    Decision::Accept
                };
                IngestionVerdict {
                    item_id: item.id.clone(),
                    decision,
                    duration_secs: Some(secs),
                }
            }
        }
    }
}
