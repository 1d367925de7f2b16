// src/bootstrap.rs
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::{Secrets, WatchConfig};
use crate::ingest::admission::AdmissionPolicy;
use crate::ingest::dispatch::RunPodDispatcher;
use crate::ingest::duration::{DataApiProbe, YtDlpProbe};
use crate::ingest::index::PineconeIndex;
use crate::ingest::providers::youtube_feed::YouTubeFeed;
use crate::ingest::types::DurationProbe;
use crate::ingest::WatchCycle;
use crate::limiter::RequestRateLimiter;

/// Production wiring of the watch cycle and the request limiter.
pub struct Runtime {
    pub watch: Arc<WatchCycle>,
    pub limiter: Arc<RequestRateLimiter>,
}

impl Runtime {
    pub fn build(cfg: WatchConfig, secrets: &Secrets) -> Result<Self> {
        let missing = secrets.missing();
        // Safe diagnostics: names of missing variables only
        if !missing.is_empty() {
            warn!(?missing, "running with unconfigured collaborators");
        }

        let index = PineconeIndex::new(
            secrets.pinecone_index_host.as_deref().unwrap_or_default(),
            secrets.pinecone_api_key.clone().unwrap_or_default(),
            cfg.index_dimension,
        )?;
        let probe: Arc<dyn DurationProbe> = match &secrets.youtube_api_key {
            Some(key) => Arc::new(DataApiProbe::new(key.clone())?),
            None => Arc::new(YtDlpProbe::default()),
        };
        let dispatcher = RunPodDispatcher::new(
            secrets.runpod_endpoint_id.as_deref().unwrap_or_default(),
            secrets.runpod_api_key.clone().unwrap_or_default(),
        )?;

        let policy =
            AdmissionPolicy::new(Arc::new(index), probe).with_min_duration(cfg.min_duration_secs);
        let watch = WatchCycle::new(
            cfg.sources.clone(),
            Arc::new(YouTubeFeed::new()?),
            policy,
            Arc::new(dispatcher),
        )
        .with_dispatch_pause(cfg.dispatch_pause());

        info!(
            sources = cfg.sources.len(),
            min_duration_secs = cfg.min_duration_secs,
            probe = if secrets.youtube_api_key.is_some() { "data-api" } else { "yt-dlp" },
            "watch runtime ready"
        );

        Ok(Self {
            limiter: Arc::new(RequestRateLimiter::new(cfg.limiter)),
            watch: Arc::new(watch),
        })
    }
}
