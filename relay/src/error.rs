use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use openai_balance_protocol::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("missing key")]
    MissingKey,

    #[error("missing path")]
    MissingPath,

    #[error(transparent)]
    Upstream(#[from] reqwest::Error),

    #[error("invalid upstream response: {0}")]
    InvalidUpstreamBody(#[from] serde_json::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::MissingKey => (StatusCode::INTERNAL_SERVER_ERROR, "missing key"),
            AppError::MissingPath => (StatusCode::BAD_REQUEST, "missing path"),
            AppError::Upstream(e) => {
                tracing::error!("upstream request failed: {e}");
                (StatusCode::BAD_GATEWAY, "upstream request failed")
            }
            AppError::InvalidUpstreamBody(e) => {
                tracing::error!("upstream returned non-JSON body: {e}");
                (StatusCode::BAD_GATEWAY, "invalid upstream response")
            }
        };

        (status, axum::Json(ErrorBody::new(message))).into_response()
    }
}
