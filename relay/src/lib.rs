//! Single-hop relay in front of the OpenAI billing API.
//!
//! Clients send their key in a `token` header and the upstream path in a
//! `path` header; the relay issues the upstream GET with the key as a bearer
//! token and hands back the JSON body.

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
mod routes;
pub mod upstream;

#[derive(Clone)]
pub struct AppState {
    pub upstream: upstream::Upstream,
}

impl AppState {
    pub fn new(config: &config::Config) -> Self {
        Self {
            upstream: upstream::Upstream::new(config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::router()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
