use axum::{
    body::{Body, Bytes},
    http::{header, Method},
    response::{IntoResponse, Response},
};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;

pub const EVENT_STREAM: &str = "text/event-stream;charset=utf-8";

/// Caller body. `messages` is forwarded untouched, so it stays raw JSON.
#[derive(Debug, Deserialize)]
struct RelayRequest {
    messages: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct UpstreamRequest<'a> {
    model: &'a str,
    messages: &'a serde_json::Value,
    stream: bool,
}

/// Forwards chat completions to the upstream API and pipes the event stream
/// back. Holds no per-request state; one instance serves every request.
pub struct ChatRelay {
    client: reqwest::Client,
    config: RelayConfig,
}

impl ChatRelay {
    pub fn new(config: RelayConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: RelayConfig, client: reqwest::Client) -> Self {
        info!("Initializing chat relay with model: {}", config.model);
        Self { client, config }
    }

    pub async fn relay(&self, method: Method, body: Bytes) -> Result<Response, RelayError> {
        if method != Method::POST {
            debug!("Rejecting {} on chat endpoint", method);
            return Err(RelayError::MethodNotAllowed(method));
        }

        let Some(api_key) = self.config.credential() else {
            error!("LLM_API_KEY is not set; refusing to relay chat request");
            return Err(RelayError::ServerConfiguration);
        };

        let request: RelayRequest = serde_json::from_slice(&body).map_err(|e| {
            warn!("Failed to parse chat request: {}", e);
            RelayError::BadRequest(e.to_string())
        })?;

        let message_count = request.messages.as_array().map(Vec::len).unwrap_or(0);
        info!(
            messages = message_count,
            model = %self.config.model,
            "Forwarding chat completion upstream"
        );

        let upstream = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&UpstreamRequest {
                model: &self.config.model,
                messages: &request.messages,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach upstream: {}", e);
                RelayError::UpstreamUnavailable(e)
            })?;

        let status = upstream.status();
        if !status.is_success() {
            let body = upstream.text().await.unwrap_or_default();
            error!(%status, "Upstream API error: {}", body);
            return Err(RelayError::UpstreamStatus { status, body });
        }

        debug!("Upstream stream opened, piping to client");
        let stream = upstream
            .bytes_stream()
            .inspect_err(|e| error!("Upstream stream interrupted: {}", e));

        Ok((
            [
                (header::CONTENT_TYPE, EVENT_STREAM),
                (header::CACHE_CONTROL, "no-cache, no-transform"),
                (header::CONNECTION, "keep-alive"),
            ],
            Body::from_stream(stream),
        )
            .into_response())
    }
}
