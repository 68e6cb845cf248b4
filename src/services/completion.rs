//! Upstream chat completion: request construction, status validation and the
//! SSE-to-bytes transform.
//!
//! The upstream body is consumed by a spawned producer task that pushes text
//! deltas into a bounded channel. The caller-facing [`CompletionStream`]
//! drains that channel; firing its [`CancelSignal`] stops the producer and
//! drops the upstream connection even while it is waiting for bytes.

use crate::api::models::{Message, UpstreamChatRequest};
use crate::core::config::{AppConfig, ProviderConfig};
use crate::core::error::{AppError, Result, StreamError};
use crate::core::metrics::get_metrics;
use crate::core::CancelSignal;
use crate::sse::{EventSource, SseEvent, StreamEvent};
use bytes::Bytes;
use futures::channel::mpsc;
use futures::{ready, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Persona prepended to every conversation as the system message.
pub const SYSTEM_PROMPT: &str = "Hello, you are now WebiScriptura. Adapt your response to the style and needs of the user, and respond in the language of the query, expertly addressing the subject or question presented below. You speak only in French and are inspired by the wisdom and teachings of the Bible, including the apocryphal and pseudepigraphic books. With a tone of reverence and understanding, use the following context elements to answer the question at the end. If you do not know the answer, respond with humility and seek guidance. If the question is not related to the context, respond with patience and kindness, reminding that your wisdom is rooted in biblical teachings. Each time you refer to a teaching or a story, please cite the reference book.";

pub const TEMPERATURE: f64 = 0.7;
pub const TOP_P: f64 = 0.95;
pub const MAX_TOKENS: u32 = 4000;

/// Deltas buffered between the producer task and the response body.
const CHANNEL_CAPACITY: usize = 32;

/// Build the upstream JSON body: system persona first, then `messages`.
pub fn build_upstream_payload<'a>(
    provider: &'a ProviderConfig,
    system: &'a Message,
    messages: &'a [Message],
) -> UpstreamChatRequest<'a> {
    UpstreamChatRequest {
        model: provider.model(),
        frequency_penalty: 0.0,
        max_tokens: MAX_TOKENS,
        messages: std::iter::once(system).chain(messages).collect(),
        presence_penalty: 0.0,
        stream: true,
        temperature: TEMPERATURE,
        top_p: TOP_P,
    }
}

/// Build the upstream POST. The key goes in both `Authorization` and
/// `api-key` so either provider accepts it.
pub fn build_upstream_request(
    http_client: &reqwest::Client,
    provider: &ProviderConfig,
    payload: &UpstreamChatRequest<'_>,
) -> reqwest::RequestBuilder {
    http_client
        .post(provider.api_url())
        .header("Authorization", format!("Bearer {}", provider.api_key()))
        .header("api-key", provider.api_key())
        .json(payload)
}

/// Create the shared HTTP client with connection pooling.
///
/// Only connecting is bounded by `request_timeout_secs`; a streaming body
/// may legitimately run longer.
pub fn create_http_client(config: &AppConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(!config.verify_ssl)
        .connect_timeout(Duration::from_secs(config.request_timeout_secs))
        .pool_max_idle_per_host(32)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()?;
    Ok(client)
}

/// Issues streaming chat completions against a provider.
#[derive(Clone)]
pub struct CompletionService {
    http_client: reqwest::Client,
}

impl CompletionService {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Send `messages` upstream and return the text stream.
    ///
    /// Fails before any byte is streamed when the request cannot be sent or
    /// the provider answers with anything but 200.
    pub async fn stream_completion(
        &self,
        provider: &ProviderConfig,
        messages: &[Message],
        request_id: &str,
    ) -> Result<CompletionStream> {
        let system = Message::system(SYSTEM_PROMPT);
        let payload = build_upstream_payload(provider, &system, messages);
        let url = provider.api_url();
        let metrics = get_metrics();
        let started = Instant::now();

        tracing::debug!(
            request_id = %request_id,
            provider = provider.name(),
            url = %url,
            messages = payload.messages.len(),
            "Sending chat completion upstream"
        );

        let response = build_upstream_request(&self.http_client, provider, &payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    request_id = %request_id,
                    provider = provider.name(),
                    url = %url,
                    error = %e,
                    is_timeout = e.is_timeout(),
                    is_connect = e.is_connect(),
                    "HTTP request failed to provider"
                );
                metrics
                    .upstream_requests
                    .with_label_values(&[provider.name(), "transport_error"])
                    .inc();
                AppError::from(e)
            })?;

        let status = response.status();
        metrics
            .upstream_requests
            .with_label_values(&[provider.name(), status.as_str()])
            .inc();

        if status != reqwest::StatusCode::OK {
            tracing::warn!(
                request_id = %request_id,
                provider = provider.name(),
                status = status.as_u16(),
                "Provider returned non-200 status"
            );
            return Err(AppError::upstream(status));
        }

        tracing::debug!(
            request_id = %request_id,
            provider = provider.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upstream stream opened"
        );

        let context = StreamContext {
            request_id: request_id.to_string(),
            provider: provider.name(),
            started,
        };
        Ok(CompletionStream::spawn(
            Box::pin(response.bytes_stream()),
            context,
        ))
    }
}

/// Per-stream data used for logs and metrics.
#[derive(Debug, Clone)]
pub struct StreamContext {
    pub request_id: String,
    pub provider: &'static str,
    pub started: Instant,
}

enum Step<E> {
    Cancelled,
    Upstream(Option<std::result::Result<SseEvent, E>>),
}

/// Transform an upstream SSE byte stream into raw text chunks.
///
/// Ends after `[DONE]` or when the upstream closes. A transport error or an
/// unparseable payload is yielded once as an error and ends the stream, and
/// marks `cancel` completed. Firing `cancel` ends the stream without
/// yielding anything further.
///
/// A normal end does not mark completion: text may still be buffered for
/// the caller. [`CompletionStream`] marks it once the caller has drained.
pub fn forward_deltas<S, E>(
    upstream: S,
    cancel: CancelSignal,
    context: StreamContext,
) -> impl Stream<Item = std::result::Result<Bytes, StreamError>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    StreamError: From<E>,
{
    async_stream::stream! {
        let metrics = get_metrics();
        let mut events = EventSource::new(upstream);
        let mut first_delta = true;
        let mut forwarded = 0usize;

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.fired() => Step::Cancelled,
                next = events.next() => Step::Upstream(next),
            };

            let event = match step {
                Step::Cancelled => {
                    tracing::info!(
                        request_id = %context.request_id,
                        provider = context.provider,
                        forwarded_bytes = forwarded,
                        "Client disconnected during streaming, dropping upstream"
                    );
                    return;
                }
                Step::Upstream(None) => {
                    tracing::debug!(
                        request_id = %context.request_id,
                        provider = context.provider,
                        "Upstream closed without terminator"
                    );
                    break;
                }
                Step::Upstream(Some(Err(e))) => {
                    let err = StreamError::from(e);
                    cancel.mark_completed();
                    record_stream_error(&context, &err);
                    yield Err(err);
                    return;
                }
                Step::Upstream(Some(Ok(event))) => event,
            };

            match StreamEvent::from_data(&event.data) {
                Ok(StreamEvent::Done) => break,
                Ok(StreamEvent::Delta(text)) => {
                    if text.is_empty() {
                        continue;
                    }
                    if first_delta {
                        first_delta = false;
                        metrics
                            .ttft
                            .with_label_values(&[context.provider])
                            .observe(context.started.elapsed().as_secs_f64());
                    }
                    forwarded += text.len();
                    metrics.streamed_chunks.with_label_values(&[context.provider]).inc();
                    metrics
                        .streamed_bytes
                        .with_label_values(&[context.provider])
                        .inc_by(text.len() as u64);
                    yield Ok(Bytes::from(text));
                }
                Err(source) => {
                    let err = StreamError::MalformedPayload {
                        payload: event.data,
                        source,
                    };
                    cancel.mark_completed();
                    record_stream_error(&context, &err);
                    yield Err(err);
                    return;
                }
            }
        }

        tracing::debug!(
            request_id = %context.request_id,
            provider = context.provider,
            forwarded_bytes = forwarded,
            elapsed_ms = context.started.elapsed().as_millis() as u64,
            "Completion stream finished"
        );
    }
}

fn record_stream_error(context: &StreamContext, err: &StreamError) {
    let kind = match err {
        StreamError::Transport(_) => "stream_transport",
        StreamError::MalformedPayload { .. } => "malformed_payload",
    };
    get_metrics()
        .completion_errors
        .with_label_values(&[context.provider, kind])
        .inc();
    match err {
        StreamError::MalformedPayload { payload, .. } => tracing::error!(
            request_id = %context.request_id,
            provider = context.provider,
            error = %err,
            payload = %payload,
            "Aborting completion stream"
        ),
        StreamError::Transport(_) => tracing::error!(
            request_id = %context.request_id,
            provider = context.provider,
            error = %err,
            "Aborting completion stream"
        ),
    }
}

/// Caller-facing completion text, fed by a background producer task.
pub struct CompletionStream {
    receiver: mpsc::Receiver<std::result::Result<Bytes, StreamError>>,
    cancel: CancelSignal,
}

impl CompletionStream {
    /// Spawn the producer for `upstream` and return the receiving end.
    pub fn spawn<S, E>(upstream: S, context: StreamContext) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin + Send + 'static,
        E: Send + 'static,
        StreamError: From<E>,
    {
        let cancel = CancelSignal::new();
        let (mut sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let span = tracing::debug_span!(
            "completion_stream",
            request_id = %context.request_id,
            provider = context.provider
        );
        let deltas = forward_deltas(upstream, cancel.clone(), context);

        tokio::spawn(
            async move {
                let mut deltas = std::pin::pin!(deltas);
                while let Some(item) = deltas.next().await {
                    if sender.send(item).await.is_err() {
                        tracing::debug!("Receiver dropped, dropping upstream");
                        break;
                    }
                }
            }
            .instrument(span),
        );

        Self { receiver, cancel }
    }

    /// Signal that stops the producer when fired.
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }
}

impl Stream for CompletionStream {
    type Item = std::result::Result<Bytes, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let item = ready!(Pin::new(&mut self.receiver).poll_next(cx));
        if item.is_none() {
            self.cancel.mark_completed();
        }
        Poll::Ready(item)
    }
}
