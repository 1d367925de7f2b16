// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod limiter;
pub mod metrics;

// Channel watching: feed → existence → admission → dispatch
pub mod ingest;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::ingest::{WatchCycle, WatchReport};
pub use crate::limiter::RequestRateLimiter;
