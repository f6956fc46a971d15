use openai_balance_protocol::{UsageQuery, UsageResponse, PATH_HEADER, RELAY_ROUTE, TOKEN_HEADER};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("relay returned invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Talks to the relay. The key and the upstream path travel in headers,
/// never in the relay URL.
#[derive(Clone, Debug)]
pub struct UsageClient {
    http: reqwest::Client,
    endpoint: String,
}

impl UsageClient {
    pub fn new(relay_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}{}", relay_url.trim_end_matches('/'), RELAY_ROUTE),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Bind an upstream path and key; the returned request can be sent any
    /// number of times.
    pub fn request(&self, path: impl Into<String>, token: impl Into<String>) -> RelayRequest {
        RelayRequest {
            http: self.http.clone(),
            endpoint: self.endpoint.clone(),
            path: path.into(),
            token: token.into(),
        }
    }

    /// Billing usage for the query's key and date range.
    ///
    /// Upstream failures that still produce JSON come back as `Ok` with
    /// `error` set and no `total_usage`.
    pub async fn get_usage(&self, query: &UsageQuery) -> Result<UsageResponse, ClientError> {
        let path = query.usage_path();
        log::debug!("fetching usage {}", path);

        let resp = self
            .request(path, query.key.as_str())
            .send(None, Method::GET)
            .await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

pub struct RelayRequest {
    http: reqwest::Client,
    endpoint: String,
    path: String,
    token: String,
}

impl RelayRequest {
    pub async fn send(
        &self,
        body: Option<&Value>,
        method: Method,
    ) -> Result<reqwest::Response, ClientError> {
        let mut req = self
            .http
            .request(method, &self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(CACHE_CONTROL, "no-cache")
            .header(PATH_HEADER, self.path.as_str())
            .header(TOKEN_HEADER, self.token.as_str());
        if let Some(body) = body {
            req = req.body(serde_json::to_string(body)?);
        }
        Ok(req.send().await?)
    }

    /// POST, the relay call's default method.
    pub async fn post(&self, body: Option<&Value>) -> Result<reqwest::Response, ClientError> {
        self.send(body, Method::POST).await
    }
}
