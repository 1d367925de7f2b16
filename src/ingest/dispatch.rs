// src/ingest/dispatch.rs
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;

use crate::ingest::types::{DispatchJob, IngestionDispatcher};

pub const RUNPOD_API_BASE: &str = "https://api.runpod.ai/v2";

#[derive(Serialize)]
struct RunRequest<'a> {
    input: &'a DispatchJob,
}

/// Fire-and-forget submission to a serverless worker's async `/run` route.
///
/// Returns as soon as the worker queue answers; job progress is never
/// polled. The worker writing the video into the index is the only
/// completion signal, seen by the next watch cycle.
#[derive(Clone)]
pub struct RunPodDispatcher {
    client: reqwest::Client,
    run_url: String,
    api_key: String,
}

impl RunPodDispatcher {
    pub fn new(endpoint_id: &str, api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(RUNPOD_API_BASE, endpoint_id, api_key)
    }

    pub fn with_base_url(
        base_url: &str,
        endpoint_id: &str,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building dispatch http client")?;
        let endpoint_id = endpoint_id.trim();
        let run_url = if endpoint_id.is_empty() {
            String::new()
        } else {
            format!("{}/{}/run", base_url.trim_end_matches('/'), endpoint_id)
        };
        Ok(Self {
            client,
            run_url,
            api_key: api_key.into(),
        })
    }

    async fn submit(&self, job: &DispatchJob) -> Result<()> {
        if self.run_url.is_empty() || self.api_key.is_empty() {
            bail!("ingestion worker endpoint is not configured");
        }
        self.client
            .post(&self.run_url)
            .bearer_auth(&self.api_key)
            .json(&RunRequest { input: job })
            .send()
            .await
            .context("worker run send")?
            .error_for_status()
            .context("worker run status")?;
        Ok(())
    }
}

#[async_trait]
impl IngestionDispatcher for RunPodDispatcher {
    async fn dispatch(&self, job: &DispatchJob) {
        match self.submit(job).await {
            Ok(()) => {
                tracing::info!(target: "watch", video_id = %job.video_id, "dispatched to worker");
                counter!("watch_dispatch_total").increment(1);
            }
            Err(e) => {
                tracing::error!(
                    target: "watch",
                    error = ?e,
                    video_id = %job.video_id,
                    "dispatch failed; will be retried next cycle"
                );
                counter!("watch_dispatch_errors_total").increment(1);
            }
        }
    }
}
