// src/ingest/duration.rs
//! Video length from metadata only; nothing here downloads media.
//!
//! A failed probe reports `0`, which the admission policy reads as "too
//! short". For long-only sources that means a transient metadata error skips
//! the video for this cycle; it is re-offered on the next one.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;

use crate::ingest::types::DurationProbe;

pub const DATA_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

fn report_failure(url: &str, e: &anyhow::Error) -> u64 {
    tracing::warn!(target: "watch", error = ?e, url, "duration probe failed, reporting 0s");
    metrics::counter!("watch_probe_errors_total").increment(1);
    0
}

// ---------------------------------------------------------------------------
// yt-dlp
// ---------------------------------------------------------------------------

/// Runs `yt-dlp --skip-download --print duration <url>`.
pub struct YtDlpProbe {
    binary: String,
    timeout: Duration,
}

impl Default for YtDlpProbe {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl YtDlpProbe {
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    async fn probe(&self, url: &str) -> Result<u64> {
        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "--skip-download",
            "--no-playlist",
            "--no-warnings",
            "--quiet",
            "--print",
            "duration",
            url,
        ])
        .kill_on_drop(true);
        let out = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| anyhow!("yt-dlp timed out after {:?}", self.timeout))?
            .with_context(|| format!("spawning {}", self.binary))?;
        if !out.status.success() {
            bail!(
                "yt-dlp exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        let stdout = String::from_utf8_lossy(&out.stdout);
        parse_ytdlp_duration(&stdout).ok_or_else(|| anyhow!("unparseable duration {stdout:?}"))
    }
}

/// yt-dlp prints seconds as an integer or float, or `NA` when unknown.
pub fn parse_ytdlp_duration(s: &str) -> Option<u64> {
    let v: f64 = s.lines().next()?.trim().parse().ok()?;
    if v.is_finite() && v >= 0.0 {
        Some(v.round() as u64)
    } else {
        None
    }
}

#[async_trait]
impl DurationProbe for YtDlpProbe {
    async fn duration_seconds(&self, url: &str) -> u64 {
        match self.probe(url).await {
            Ok(secs) => secs,
            Err(e) => report_failure(url, &e),
        }
    }
}

// ---------------------------------------------------------------------------
// YouTube Data API v3
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

/// Reads `contentDetails.duration` via the Data API. Needs an API key.
pub struct DataApiProbe {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DataApiProbe {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(DATA_API_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building data api http client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    async fn probe(&self, url: &str) -> Result<u64> {
        let video_id = video_id_from_url(url).ok_or_else(|| anyhow!("no video id in url"))?;
        let resp: VideosResponse = self
            .http
            .get(format!("{}/videos", self.base_url.trim_end_matches('/')))
            .query(&[
                ("part", "contentDetails"),
                ("id", video_id.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("data api send")?
            .error_for_status()
            .context("data api status")?
            .json()
            .await
            .context("data api body")?;
        let item = resp
            .items
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("video {video_id} not found"))?;
        parse_iso8601_duration(&item.content_details.duration)
            .ok_or_else(|| anyhow!("bad duration {:?}", item.content_details.duration))
    }
}

#[async_trait]
impl DurationProbe for DataApiProbe {
    async fn duration_seconds(&self, url: &str) -> u64 {
        match self.probe(url).await {
            Ok(secs) => secs,
            Err(e) => report_failure(url, &e),
        }
    }
}

/// `watch?v=<id>`, `youtu.be/<id>`, `/shorts/<id>` and `/live/<id>` forms.
pub fn video_id_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.").to_ascii_lowercase();
    let id = if host == "youtu.be" {
        parsed.path_segments()?.next().map(str::to_string)
    } else if host == "youtube.com" || host.ends_with(".youtube.com") {
        let from_query = parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned());
        from_query.or_else(|| {
            let mut segs = parsed.path_segments()?;
            match segs.next()? {
                "shorts" | "live" | "embed" => segs.next().map(str::to_string),
                _ => None,
            }
        })
    } else {
        None
    };
    id.filter(|s| !s.is_empty())
}

/// `PT1H2M3S` → 3723. Day components count too; weeks and years do not occur.
pub fn parse_iso8601_duration(s: &str) -> Option<u64> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
            .expect("static duration regex")
    });
    let caps = re.captures(s.trim())?;
    // Components too large for u64 seconds are rejected, not wrapped.
    let part = |i: usize, unit: u64| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse::<u64>().ok()?.checked_mul(unit),
            None => Some(0),
        }
    };
    part(1, 86_400)?
        .checked_add(part(2, 3_600)?)?
        .checked_add(part(3, 60)?)?
        .checked_add(part(4, 1)?)
}
