use axum::extract::State;
use axum::http::{HeaderMap, Method};
use axum::Json;
use openai_balance_protocol::{PATH_HEADER, TOKEN_HEADER};
use serde_json::Value;

use crate::error::AppError;
use crate::AppState;

/// Forwards to the billing API using the caller's key.
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let token = header_value(&headers, TOKEN_HEADER).ok_or(AppError::MissingKey)?;
    let path = header_value(&headers, PATH_HEADER).ok_or(AppError::MissingPath)?;

    if method != Method::GET {
        tracing::debug!("rewriting {method} to GET for {path}");
    }
    tracing::info!("[proxy] {path}");

    let data = state.upstream.get_json(path, token).await?;
    Ok(Json(data))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_value_ignores_blank() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("  "));
        headers.insert(PATH_HEADER, HeaderValue::from_static("/dashboard/billing/usage"));

        assert_eq!(header_value(&headers, TOKEN_HEADER), None);
        assert_eq!(header_value(&headers, PATH_HEADER), Some("/dashboard/billing/usage"));
        assert_eq!(header_value(&headers, "missing"), None);
    }
}
