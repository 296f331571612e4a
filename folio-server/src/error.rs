//! Relay errors and their mapping onto HTTP responses.
//!
//! Every variant renders as `{"error": "<generic message>"}`. Detail (upstream
//! bodies, transport errors) stays in the server log.

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use folio_shared::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("upstream credential is not configured")]
    ServerConfiguration,

    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error("upstream request failed: {0}")]
    UpstreamUnavailable(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::ServerConfiguration
            | RelayError::UpstreamUnavailable(_)
            | RelayError::UpstreamStatus { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            RelayError::MethodNotAllowed(_) => "Method Not Allowed",
            RelayError::ServerConfiguration => "Server configuration error.",
            RelayError::BadRequest(_) => "Invalid request body.",
            RelayError::UpstreamUnavailable(_) | RelayError::UpstreamStatus { .. } => {
                "Failed to connect to upstream"
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.public_message().to_string(),
        });
        (self.status(), body).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("LLM_API_KEY is not set. Please set it in your environment or .env file")]
    MissingApiKey,

    #[error("LLM_MODEL must not be empty")]
    MissingModel,

    #[error("LLM_API_URL must be an http(s) URL, got '{0}'")]
    InvalidUrl(String),

    #[error("RELAY_ADDR is not a valid socket address: '{0}'")]
    InvalidAddr(String),
}
