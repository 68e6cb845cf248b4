//! HTTP request handlers for the chat proxy API.
//!
//! This module contains the chat completion endpoint, the health check and
//! the Prometheus metrics endpoint.

use crate::api::disconnect::DisconnectStream;
use crate::api::models::{ChatCompletionRequest, HealthResponse};
use crate::core::config::{ProviderConfig, ProviderSource};
use crate::core::logging::{get_request_id, PROVIDER_CONTEXT};
use crate::core::metrics::get_metrics;
use crate::core::{AppError, Result};
use crate::services::{select_within_budget, CompletionService, CHAR_BUDGET};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

/// Content type of the streamed completion text.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub provider_source: ProviderSource,
    pub completion_service: CompletionService,
}

impl AppState {
    pub fn new(provider_source: ProviderSource, completion_service: CompletionService) -> Self {
        Self {
            provider_source,
            completion_service,
        }
    }
}

/// Handle `POST /api/chat-completion`.
///
/// Streams the assistant's reply back as raw UTF-8 text. Any failure before
/// the first byte, including an unreadable body, becomes `500 Error`.
#[tracing::instrument(skip(state, body), fields(body_bytes = body.len()))]
pub async fn chat_completion(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let provider = state.provider_source.resolve();
    let provider_name = provider.name();

    // Render errors inside the scope; the error log reads the provider context.
    PROVIDER_CONTEXT
        .scope(provider_name.to_string(), async move {
            stream_reply(&state, &provider, &body)
                .await
                .unwrap_or_else(|e| {
                    get_metrics()
                        .completion_errors
                        .with_label_values(&[provider_name, e.kind()])
                        .inc();
                    e.into_response()
                })
        })
        .await
}

async fn stream_reply(state: &AppState, provider: &ProviderConfig, body: &[u8]) -> Result<Response> {
    let request_id = get_request_id();
    let request: ChatCompletionRequest = serde_json::from_slice(body)?;

    let messages = select_within_budget(&request.messages, CHAR_BUDGET);
    if messages.len() < request.messages.len() {
        tracing::info!(
            request_id = %request_id,
            provider = provider.name(),
            received = request.messages.len(),
            forwarded = messages.len(),
            "Conversation trimmed to character budget"
        );
    }

    let stream = state
        .completion_service
        .stream_completion(provider, messages, &request_id)
        .await?;

    let signal = stream.cancel_signal();
    let body = Body::from_stream(DisconnectStream::new(stream, signal));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .map_err(|e| AppError::Internal(format!("failed to build response: {}", e)))
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler() -> Result<Response> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(Body::from(buffer))
        .map_err(|e| AppError::Internal(e.to_string()))
}
