// src/config/secrets.rs
use std::env;

/// Credentials for the external collaborators, read from the environment.
///
/// Missing values are not an error here: each adapter logs and applies its
/// own fail-open/closed default when it finds itself unconfigured.
#[derive(Clone, Default)]
pub struct Secrets {
    pub pinecone_api_key: Option<String>,
    pub pinecone_index_host: Option<String>,
    pub runpod_api_key: Option<String>,
    pub runpod_endpoint_id: Option<String>,
    /// Selects the Data API duration probe instead of yt-dlp.
    pub youtube_api_key: Option<String>,
    /// Bearer token for the admin routes; they stay closed while unset.
    pub admin_token: Option<String>,
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            pinecone_api_key: non_empty("PINECONE_API_KEY"),
            pinecone_index_host: non_empty("PINECONE_INDEX_HOST"),
            runpod_api_key: non_empty("RUNPOD_API_KEY"),
            runpod_endpoint_id: non_empty("RUNPOD_ENDPOINT_ID"),
            youtube_api_key: non_empty("YOUTUBE_API_KEY"),
            admin_token: non_empty("ADMIN_TOKEN"),
        }
    }

    /// Names of the required variables that are absent. Never the values.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.pinecone_api_key.is_none() {
            out.push("PINECONE_API_KEY");
        }
        if self.pinecone_index_host.is_none() {
            out.push("PINECONE_INDEX_HOST");
        }
        if self.runpod_api_key.is_none() {
            out.push("RUNPOD_API_KEY");
        }
        if self.runpod_endpoint_id.is_none() {
            out.push("RUNPOD_ENDPOINT_ID");
        }
        out
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("pinecone_api_key", &self.pinecone_api_key.as_ref().map(|_| "***"))
            .field("pinecone_index_host", &self.pinecone_index_host)
            .field("runpod_api_key", &self.runpod_api_key.as_ref().map(|_| "***"))
            .field("runpod_endpoint_id", &self.runpod_endpoint_id)
            .field("youtube_api_key", &self.youtube_api_key.as_ref().map(|_| "***"))
            .field("admin_token", &self.admin_token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_keys() {
        let s = Secrets {
            pinecone_api_key: Some("pc-secret".into()),
            runpod_api_key: Some("rp-secret".into()),
            admin_token: Some("adm-secret".into()),
            ..Default::default()
        };
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("pc-secret"));
        assert!(!dbg.contains("rp-secret"));
        assert!(!dbg.contains("adm-secret"));
        assert_eq!(s.missing(), vec!["PINECONE_INDEX_HOST", "RUNPOD_ENDPOINT_ID"]);
    }
}
