//! Catalog Sentinel: binary entrypoint.
//! Boots the Axum HTTP server with the request limiter in front of the
//! answer path, and (optionally) the in-process channel watcher.

use std::sync::Arc;

use catalog_sentinel::api::{self, AppState, DisabledAnswerer};
use catalog_sentinel::bootstrap::Runtime;
use catalog_sentinel::config::{Secrets, WatchConfig};
use catalog_sentinel::ingest::scheduler::spawn_watch_scheduler;
use catalog_sentinel::metrics::Metrics;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Structured logs; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("watch=info,limiter=info,api=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    // Shuttle may already have installed a subscriber; keep theirs if so.
    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = WatchConfig::load_default()?;
    let interval_secs = cfg.interval_secs;
    let secrets = Secrets::from_env();
    let rt = Runtime::build(cfg, &secrets)?;
    let metrics = Metrics::init()?;

    if interval_secs > 0 {
        spawn_watch_scheduler(rt.watch.clone(), interval_secs);
    }

    let state = AppState {
        limiter: rt.limiter.clone(),
        answerer: Arc::new(DisabledAnswerer),
        watch: rt.watch.clone(),
        admin_token: secrets.admin_token.map(Arc::from),
    };
    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}
