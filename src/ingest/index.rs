// src/ingest/index.rs
//! Existence checks against the vector index.
//!
//! Uses an exact-match metadata filter on `video_id`; the query vector is all
//! zeros because only the filter matters. Any failure reads as "not present",
//! which at worst re-dispatches a video the worker has already ingested.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::ingest::types::ExistenceOracle;

/// Metadata field the worker writes the video id into.
pub const VIDEO_ID_FIELD: &str = "video_id";
pub const DEFAULT_DIMENSION: usize = 1536;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Value>,
}

pub struct PineconeIndex {
    http: reqwest::Client,
    query_url: String,
    api_key: String,
    dimension: usize,
}

impl PineconeIndex {
    /// `host` is the index host as shown in the console, with or without scheme.
    pub fn new(host: &str, api_key: impl Into<String>, dimension: usize) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building index http client")?;
        Ok(Self {
            http,
            query_url: query_url(host),
            api_key: api_key.into(),
            dimension: dimension.max(1),
        })
    }

    async fn count_matches(&self, item_id: &str) -> Result<usize> {
        if self.api_key.is_empty() || self.query_url.is_empty() {
            bail!("vector index is not configured");
        }
        let resp = self
            .http
            .post(&self.query_url)
            .header("Api-Key", &self.api_key)
            .json(&query_body(item_id, self.dimension))
            .send()
            .await
            .context("index query send")?
            .error_for_status()
            .context("index query status")?;
        let parsed: QueryResponse = resp.json().await.context("index query body")?;
        Ok(parsed.matches.len())
    }
}

fn query_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return String::new();
    }
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}/query")
    } else {
        format!("https://{host}/query")
    }
}

/// Filter-only query: placeholder vector, one match is enough, no metadata.
pub fn query_body(item_id: &str, dimension: usize) -> Value {
    let mut filter = serde_json::Map::new();
    filter.insert(VIDEO_ID_FIELD.to_string(), json!({ "$eq": item_id }));
    json!({
        "vector": vec![0.0f32; dimension],
        "topK": 1,
        "filter": filter,
        "includeMetadata": false,
    })
}

#[async_trait]
impl ExistenceOracle for PineconeIndex {
    async fn exists(&self, item_id: &str) -> bool {
        match self.count_matches(item_id).await {
            Ok(n) => n > 0,
            Err(e) => {
                tracing::warn!(
                    target: "watch",
                    error = ?e,
                    video_id = item_id,
                    "existence check failed, assuming not ingested"
                );
                false
            }
        }
    }
}
