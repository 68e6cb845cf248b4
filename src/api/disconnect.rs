//! Client disconnect detection for streamed response bodies.

use crate::core::metrics::get_metrics;
use crate::core::CancelSignal;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A body stream wrapper that fires a [`CancelSignal`] when dropped.
///
/// Hyper drops the response body as soon as the client goes away, so this is
/// where a disconnect becomes visible. A stream the caller drained to the end
/// has already marked the signal completed and the drop is ignored; any
/// other drop, including one with deltas still buffered, counts as a client
/// disconnect.
pub struct DisconnectStream<S> {
    pub stream: S,
    pub signal: CancelSignal,
}

impl<S> DisconnectStream<S> {
    pub fn new(stream: S, signal: CancelSignal) -> Self {
        Self { stream, signal }
    }
}

impl<S> Stream for DisconnectStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}

impl<S> Drop for DisconnectStream<S> {
    fn drop(&mut self) {
        if self.signal.fire() {
            get_metrics().client_disconnects_total.inc();
            tracing::debug!("Client disconnect detected - stream cancelled");
        }
    }
}
