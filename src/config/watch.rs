// src/config/watch.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::ingest::admission::MIN_DURATION_SECS;
use crate::ingest::index::DEFAULT_DIMENSION;
use crate::ingest::types::{AdmissionMode, Source};
use crate::limiter::LimiterParams;

pub const ENV_WATCH_CONFIG_PATH: &str = "WATCH_CONFIG_PATH";
pub const DEFAULT_WATCH_CONFIG_PATH: &str = "config/watch.toml";
const FALLBACK_JSON_PATH: &str = "config/watch.json";

fn default_sources() -> Vec<Source> {
    vec![
        Source::new(
            "UCuTIiHyNqELu6RNtB4AahAA",
            "Canal Principal",
            AdmissionMode::AdmitAll,
        ),
        Source::new(
            "UC9Cuo8h5aYfnpTk6fR624vg",
            "Canal Secundario",
            AdmissionMode::AdmitAll,
        ),
        Source::new(
            "UCrsZ3ySlUSY3gore8tBneRg",
            "Canal Recortes",
            AdmissionMode::AdmitLongOnly,
        ),
    ]
}

/// Watch list and tunables. Every field has a default, so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub sources: Vec<Source>,
    /// Single global threshold for long-only sources.
    pub min_duration_secs: u64,
    pub dispatch_pause_ms: u64,
    /// 0 disables the in-process scheduler (an external cron drives runs).
    pub interval_secs: u64,
    pub index_dimension: usize,
    pub limiter: LimiterParams,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            min_duration_secs: MIN_DURATION_SECS,
            dispatch_pause_ms: 5_000,
            interval_secs: 0,
            index_dimension: DEFAULT_DIMENSION,
            limiter: LimiterParams::default(),
        }
    }
}

impl WatchConfig {
    pub fn dispatch_pause(&self) -> Duration {
        Duration::from_millis(self.dispatch_pause_ms)
    }

    /// Load from an explicit path. TOML or JSON, chosen by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading watch config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self::parse(&content, &ext)
    }

    /// Load using env var + fallbacks:
    /// 1) $WATCH_CONFIG_PATH
    /// 2) config/watch.toml
    /// 3) config/watch.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_WATCH_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_WATCH_CONFIG_PATH} points to non-existent path"));
        }
        for p in [DEFAULT_WATCH_CONFIG_PATH, FALLBACK_JSON_PATH] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }

    pub fn parse(s: &str, hint_ext: &str) -> Result<Self> {
        let mut cfg: WatchConfig = if hint_ext == "json" {
            serde_json::from_str(s).context("parsing watch config json")?
        } else {
            toml::from_str(s).context("parsing watch config toml")?
        };
        cfg.sources = clean_sources(cfg.sources);
        if cfg.index_dimension == 0 {
            cfg.index_dimension = DEFAULT_DIMENSION;
        }
        Ok(cfg)
    }
}

/// Trim ids, drop empty ones, keep the first occurrence of duplicates.
fn clean_sources(items: Vec<Source>) -> Vec<Source> {
    let mut out: Vec<Source> = Vec::with_capacity(items.len());
    for mut s in items {
        s.id = s.id.trim().to_string();
        s.name = s.name.trim().to_string();
        if s.id.is_empty() || out.iter().any(|o| o.id == s.id) {
            continue;
        }
        out.push(s);
    }
    out
}
