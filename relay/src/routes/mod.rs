mod health;
mod openai;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{any, get};
use axum::Router;
use http_body_util::BodyExt;
use openai_balance_protocol::RELAY_ROUTE;

use crate::AppState;

async fn log_errors(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().path().to_string();
    let response = next.run(req).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.map(http_body_util::Collected::to_bytes).unwrap_or_default();
        let body_str = String::from_utf8_lossy(&bytes);
        tracing::error!("{} {} -> {} {}", method, uri, status, body_str);
        Response::from_parts(parts, axum::body::Body::from(bytes))
    } else {
        response
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route(RELAY_ROUTE, any(openai::proxy))
        .layer(middleware::from_fn(log_errors))
}
