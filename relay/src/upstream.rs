use axum::http::header::CONTENT_TYPE;
use serde_json::Value;

use crate::config::Config;
use crate::error::AppError;

/// Forwards relay calls to the billing API host.
#[derive(Clone)]
pub struct Upstream {
    http: reqwest::Client,
    origin: String,
}

impl Upstream {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            origin: config.upstream_origin(),
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.origin, path.trim_start_matches('/'))
    }

    /// Always a GET, whatever method the relay itself was called with.
    /// The upstream status is not inspected; error bodies come back as-is.
    pub async fn get_json(&self, path: &str, token: &str) -> Result<Value, AppError> {
        let resp = self
            .http
            .get(self.url_for(path))
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            tracing::warn!("upstream returned {status} for {path}");
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}
