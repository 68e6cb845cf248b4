//! Error types and handling for the chat proxy server.
//!
//! Every failure is logged with its detail and surfaced to the caller as an
//! opaque `500 Error` response. Failures that happen after streaming has
//! started are represented by [`StreamError`] instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::core::logging::{get_provider_context, get_request_id};

/// Body returned to the caller for every failure.
pub const GENERIC_ERROR_BODY: &str = "Error";

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Transport errors from the reqwest client
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Request body that is not a valid chat completion request
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Upstream provider answered with a non-success status
    #[error(
        "The OpenAI API has encountered an error with a status code of {status} and message {status_text}"
    )]
    Upstream { status: u16, status_text: String },

    /// Generic internal server errors with custom message
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build an upstream error from a provider response status.
    pub fn upstream(status: reqwest::StatusCode) -> Self {
        AppError::Upstream {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }

    /// Short category label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Request(e) if e.is_timeout() => "timeout",
            AppError::Request(_) => "transport",
            AppError::Serialization(_) => "serialization",
            AppError::Upstream { .. } => "upstream_status",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = get_request_id();
        let provider = get_provider_context();
        match &self {
            AppError::Upstream { status, .. } => tracing::error!(
                request_id = %request_id,
                provider = %provider,
                upstream_status = *status,
                error_kind = self.kind(),
                error = %self,
                "Chat completion failed"
            ),
            _ => tracing::error!(
                request_id = %request_id,
                provider = %provider,
                error_kind = self.kind(),
                error = %self,
                "Chat completion failed"
            ),
        }

        (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR_BODY).into_response()
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure while a completion is already streaming to the caller.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("upstream stream failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed upstream event payload: {source}")]
    MalformedPayload {
        payload: String,
        #[source]
        source: serde_json::Error,
    },
}
