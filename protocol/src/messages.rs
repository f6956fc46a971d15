use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Relay route the client talks to. Any method is accepted.
pub const RELAY_ROUTE: &str = "/api/openai";

/// Header carrying the OpenAI key. The relay sends it upstream as a bearer token.
pub const TOKEN_HEADER: &str = "token";

/// Header carrying the upstream path and query, e.g.
/// `/dashboard/billing/usage?start_date=2024-01-01&end_date=2024-03-02`.
pub const PATH_HEADER: &str = "path";

/// Upstream billing usage endpoint.
pub const USAGE_PATH: &str = "/dashboard/billing/usage";

/// Error shape returned by the relay itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// Body of the billing usage call as seen through the relay.
///
/// The relay passes upstream bodies through untouched, so a failed upstream
/// call arrives here as `{"error": {...}}` with no `total_usage`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl UsageResponse {
    /// Human readable form of the upstream error, if any.
    ///
    /// OpenAI errors look like `{"error": {"message": "...", "type": "..."}}`,
    /// the relay's own errors are `{"error": "..."}`.
    pub fn error_message(&self) -> Option<String> {
        let err = self.error.as_ref()?;
        match err {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => Some(
                map.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string()),
            ),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_response_with_total() {
        let resp: UsageResponse =
            serde_json::from_value(json!({ "object": "list", "total_usage": 1520.25 })).unwrap();
        assert_eq!(resp.total_usage, Some(1520.25));
        assert!(resp.error_message().is_none());
    }

    #[test]
    fn test_usage_response_upstream_error() {
        let resp: UsageResponse = serde_json::from_value(json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
        }))
        .unwrap();
        assert_eq!(resp.total_usage, None);
        assert_eq!(resp.error_message().as_deref(), Some("Incorrect API key provided"));
    }

    #[test]
    fn test_usage_response_relay_error() {
        let body = serde_json::to_value(ErrorBody::new("missing key")).unwrap();
        assert_eq!(body, json!({ "error": "missing key" }));
        let resp: UsageResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.error_message().as_deref(), Some("missing key"));
    }
}
