//! # Request limiter
//! Fixed-window, per-identity request counter guarding the answer path.
//!
//! - First request of an identity opens a window (`count = 1`).
//! - Requests inside the window increment the count; once it would exceed
//!   `max_requests` the identity is throttled until the window elapses.
//! - The warning for a throttle episode is emitted once, on the request that
//!   crosses the limit.
//! - A request arriving more than `window_secs` after the window start opens
//!   a fresh window.
//!
//! Being a fixed window, a burst straddling a window edge can reach up to
//! twice the nominal rate. State lives in memory only and resets on restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Deserialize;

/// Source of "now". Injected so tests can drive time by hand.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn default_max_requests() -> u32 {
    5
}
fn default_window_secs() -> i64 {
    60
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LimiterParams {
    /// Requests allowed per identity per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,
}

impl Default for LimiterParams {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// `first` is true only for the request that started the episode.
    Throttled { first: bool },
}

impl Admission {
    pub fn is_allowed(self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    start: DateTime<Utc>,
    count: u32,
    throttled: bool,
}

impl RateWindow {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            start: now,
            count: 1,
            throttled: false,
        }
    }
}

/// Expired windows are swept once the table grows past this many entries,
/// at most once per window length.
const SWEEP_THRESHOLD: usize = 4096;

struct Table {
    windows: HashMap<String, RateWindow>,
    last_sweep: Option<DateTime<Utc>>,
}

impl Table {
    fn sweep_due(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.windows.len() > SWEEP_THRESHOLD
            && self.last_sweep.map_or(true, |at| now - at >= window)
    }
}

pub struct RequestRateLimiter {
    params: LimiterParams,
    clock: Arc<dyn Clock>,
    table: Mutex<Table>,
}

impl RequestRateLimiter {
    pub fn new(params: LimiterParams) -> Self {
        Self::with_clock(params, Arc::new(SystemClock))
    }

    pub fn with_clock(mut params: LimiterParams, clock: Arc<dyn Clock>) -> Self {
        params.max_requests = params.max_requests.max(1);
        params.window_secs = params.window_secs.max(1);
        Self {
            params,
            clock,
            table: Mutex::new(Table {
                windows: HashMap::new(),
                last_sweep: None,
            }),
        }
    }

    pub fn params(&self) -> &LimiterParams {
        &self.params
    }

    /// Shorthand for `check(identity).is_allowed()`.
    pub fn allow(&self, identity: &str) -> bool {
        self.check(identity).is_allowed()
    }

    pub fn check(&self, identity: &str) -> Admission {
        let now = self.clock.now();
        let window = Duration::seconds(self.params.window_secs);

        // Whole read-modify-write under one lock so concurrent requests from
        // the same identity cannot undercount.
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if table.sweep_due(now, window) {
            table.windows.retain(|_, w| now - w.start <= window);
            table.last_sweep = Some(now);
        }

        let Some(w) = table.windows.get_mut(identity) else {
            table.windows.insert(identity.to_string(), RateWindow::fresh(now));
            return Admission::Allowed;
        };

        if now - w.start > window {
            *w = RateWindow::fresh(now);
            return Admission::Allowed;
        }

        if w.throttled {
            return Admission::Throttled { first: false };
        }

        if w.count >= self.params.max_requests {
            w.throttled = true;
            drop(table);
            tracing::warn!(
                target: "limiter",
                identity = %anon_id(identity),
                max = self.params.max_requests,
                window_secs = self.params.window_secs,
                "request limit reached, throttling"
            );
            counter!("limiter_throttled_total").increment(1);
            return Admission::Throttled { first: true };
        }

        w.count += 1;
        Admission::Allowed
    }

    /// Requests counted in the identity's current window, if it has one.
    pub fn count_for(&self, identity: &str) -> Option<u32> {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.windows.get(identity).map(|w| w.count)
    }

    /// Number of identities currently tracked (expired ones included until swept).
    pub fn tracked(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .windows
            .len()
    }
}

/// Short stable hash so raw user ids never reach the logs.
fn anon_id(identity: &str) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;
    let digest = Sha256::digest(identity.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
