// src/api.rs
//! Inbound query surface. Every request is admitted through the rate limiter
//! before the retrieval/generation collaborator is touched.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tower_http::cors::CorsLayer;

use crate::ingest::{WatchCycle, WatchReport};
use crate::limiter::{Admission, RequestRateLimiter};

pub const IDENTITY_HEADER: &str = "x-user-id";
pub const ANONYMOUS: &str = "anonymous";
pub const THROTTLE_NOTICE: &str = "Too many questions in a short time. Please wait a minute.";
const BOT_FALLBACK: &str = "Something went wrong while processing your question.";

fn default_title() -> String {
    "Unknown video".to_string()
}

/// One retrieved transcript fragment. Index metadata is mapped onto this
/// schema once, with defaults applied here instead of at every read site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    #[serde(default)]
    pub video_id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub date: String,
    /// Deep link to the second the fragment starts at.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub score: f32,
}

/// Retrieval + answer synthesis. Lives outside this crate.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn search(&self, question: &str) -> Result<Vec<Passage>>;
    async fn answer(&self, question: &str) -> Result<String>;
}

/// Stand-in used when no retrieval backend is wired.
pub struct DisabledAnswerer;

#[async_trait]
impl Answerer for DisabledAnswerer {
    async fn search(&self, _question: &str) -> Result<Vec<Passage>> {
        Err(anyhow!("retrieval backend not configured"))
    }
    async fn answer(&self, _question: &str) -> Result<String> {
        Err(anyhow!("retrieval backend not configured"))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RequestRateLimiter>,
    pub answerer: Arc<dyn Answerer>,
    pub watch: Arc<WatchCycle>,
    /// Bearer token for `/admin/*`. Admin routes answer 401 while unset.
    pub admin_token: Option<Arc<str>>,
}

pub fn router(state: AppState) -> Router {
    // Admin routes are merged after the CORS layer so browsers get no
    // cross-origin grant for them.
    let admin = Router::new().route("/admin/watch/run", post(run_watch));
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/chat", post(chat))
        .route("/bot_response", post(bot_response))
        .layer(CorsLayer::very_permissive())
        .merge(admin)
        .with_state(state)
}

#[derive(Deserialize)]
struct ChatReq {
    #[serde(default)]
    message: String,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResp {
    results: Vec<Passage>,
}

#[derive(Serialize)]
struct BotResp {
    response: String,
}

fn identity(headers: &HeaderMap, body: &ChatReq) -> String {
    body.user_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get(IDENTITY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or(ANONYMOUS)
        .to_string()
}

fn error(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

/// Validate and admit. `Err` carries the response to send instead.
fn admit(state: &AppState, headers: &HeaderMap, body: &ChatReq) -> Result<String, Response> {
    let question = body.message.trim();
    if question.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }
    match state.limiter.check(&identity(headers, body)) {
        Admission::Allowed => Ok(question.to_string()),
        // One notice per throttle episode; later requests are just refused.
        Admission::Throttled { first: true } => {
            Err(error(StatusCode::TOO_MANY_REQUESTS, THROTTLE_NOTICE))
        }
        Admission::Throttled { first: false } => Err(StatusCode::TOO_MANY_REQUESTS.into_response()),
    }
}

async fn chat(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<ChatReq>) -> Response {
    let question = match admit(&state, &headers, &body) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    match state.answerer.search(&question).await {
        Ok(results) => Json(ChatResp { results }).into_response(),
        Err(e) => {
            tracing::error!(target: "api", error = ?e, "search failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

async fn bot_response(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChatReq>,
) -> Response {
    let question = match admit(&state, &headers, &body) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let response = match state.answerer.answer(&question).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(target: "api", error = ?e, "answer generation failed");
            BOT_FALLBACK.to_string()
        }
    };
    Json(BotResp { response }).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

/// Digests are compared so the check does not short-circuit on a token prefix.
fn admin_authorized(state: &AppState, headers: &HeaderMap) -> bool {
    match (state.admin_token.as_deref(), bearer(headers)) {
        (Some(expected), Some(given)) => {
            Sha256::digest(expected.as_bytes()) == Sha256::digest(given.as_bytes())
        }
        _ => false,
    }
}

/// Manual re-trigger, e.g. after a probe outage skipped long videos.
async fn run_watch(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !admin_authorized(&state, &headers) {
        tracing::warn!(target: "api", "rejected unauthenticated watch trigger");
        return error(StatusCode::UNAUTHORIZED, "admin token required");
    }
    let report: WatchReport = state.watch.run_once().await;
    Json(report).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passage_defaults_fill_missing_metadata() {
        let p: Passage = serde_json::from_str(r#"{"text":"hola"}"#).unwrap();
        assert_eq!(p.title, "Unknown video");
        assert_eq!(p.video_id, "");
        assert_eq!(p.score, 0.0);
    }

    #[test]
    fn identity_prefers_body_then_header() {
        let mut headers = HeaderMap::new();
        headers.insert(IDENTITY_HEADER, "h-1".parse().unwrap());
        let with_body = ChatReq {
            message: "q".into(),
            user_id: Some(" 42 ".into()),
        };
        assert_eq!(identity(&headers, &with_body), "42");
        let without = ChatReq {
            message: "q".into(),
            user_id: None,
        };
        assert_eq!(identity(&headers, &without), "h-1");
        assert_eq!(identity(&HeaderMap::new(), &without), ANONYMOUS);
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "bearer  tok-1 ".parse().unwrap());
        assert_eq!(bearer(&headers), Some("tok-1"));
        headers.insert(AUTHORIZATION, "Basic dXNlcjpwdw==".parse().unwrap());
        assert_eq!(bearer(&headers), None);
        headers.insert(AUTHORIZATION, "Bearer".parse().unwrap());
        assert_eq!(bearer(&headers), None);
    }
}
