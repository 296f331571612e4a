//! Streaming chat relay: forwards a conversation to an OpenAI-compatible
//! completion API with a server-held credential and pipes the event stream
//! back to the caller byte for byte.

pub mod config;
pub mod error;
pub mod relay;

use std::sync::Arc;

use axum::{
    body::Bytes,
    http::Method,
    response::Response,
    routing::{any, get},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::RelayConfig;
pub use error::{ConfigError, RelayError};
pub use relay::ChatRelay;

pub fn create_router(relay: Arc<ChatRelay>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/chat",
            any({
                let relay = relay.clone();
                move |method: Method, body: Bytes| chat(method, body, relay)
            }),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "OK"
}

async fn chat(method: Method, body: Bytes, relay: Arc<ChatRelay>) -> Result<Response, RelayError> {
    relay.relay(method, body).await
}
