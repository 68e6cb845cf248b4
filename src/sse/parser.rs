//! Server-Sent Events framing.
//!
//! [`SseParser`] turns arbitrary byte chunks into complete [`SseEvent`]s and
//! [`EventSource`] lifts it over a byte stream, yielding events on demand.

use bytes::Bytes;
use futures::{ready, Stream};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::event::DONE_SENTINEL;

/// SSE event parsed from stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

/// Incremental SSE parser.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across chunks decode correctly. Both `\n` and `\r\n`
/// line endings are accepted. Events without any `data` field are dropped.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    pending: SseEvent,
    has_data: bool,
}

impl SseParser {
    /// Create a new SSE parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return the events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(&fix_terminator(chunk));

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + offset;
            let mut line = &self.buffer[consumed..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            let line = String::from_utf8_lossy(line).into_owned();
            consumed = end + 1;

            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        self.buffer.drain(..consumed);
        events
    }

    /// Flush whatever is left once the byte stream has ended.
    ///
    /// A trailing line without its newline and an event without its closing
    /// blank line are both dispatched.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(rest.strip_suffix(b"\r").unwrap_or(&rest[..]))
                .into_owned();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    /// Bytes received but not yet forming a complete line.
    pub fn remaining(&self) -> &[u8] {
        &self.buffer
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.pending.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.pending.data.push('\n');
                }
                self.pending.data.push_str(value);
                self.has_data = true;
            }
            "id" => self.pending.id = Some(value.to_string()),
            "retry" => self.pending.retry = value.parse().ok(),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = std::mem::take(&mut self.pending);
        let has_data = std::mem::replace(&mut self.has_data, false);
        has_data.then_some(event)
    }
}

/// Insert the missing blank line after a `[DONE]` terminator line.
///
/// Some upstreams send `data: [DONE]\n` and keep the connection open, which
/// would leave the terminator buffered forever.
pub fn fix_terminator(chunk: &[u8]) -> Cow<'_, [u8]> {
    let marker = DONE_SENTINEL.as_bytes();
    let needs_fix = |at: usize| {
        chunk[at..].starts_with(marker)
            && chunk.get(at + marker.len()) == Some(&b'\n')
            && !matches!(chunk.get(at + marker.len() + 1), Some(b'\n') | Some(b'\r'))
    };

    if !(0..chunk.len()).any(&needs_fix) {
        return Cow::Borrowed(chunk);
    }

    let mut fixed = Vec::with_capacity(chunk.len() + 1);
    let mut i = 0;
    while i < chunk.len() {
        if needs_fix(i) {
            fixed.extend_from_slice(marker);
            fixed.extend_from_slice(b"\n\n");
            i += marker.len() + 1;
        } else {
            fixed.push(chunk[i]);
            i += 1;
        }
    }
    Cow::Owned(fixed)
}

/// Pull-based event source over a byte stream.
///
/// Transport errors from the inner stream are passed through unchanged.
pub struct EventSource<S> {
    inner: S,
    parser: SseParser,
    queue: VecDeque<SseEvent>,
    finished: bool,
}

impl<S> EventSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: SseParser::new(),
            queue: VecDeque::new(),
            finished: false,
        }
    }
}

impl<S, E> Stream for EventSource<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<SseEvent, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(event) = this.queue.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(bytes)) => this.queue.extend(this.parser.feed(&bytes)),
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => {
                    this.finished = true;
                    this.queue.extend(this.parser.finish());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn data_of(events: &[SseEvent]) -> Vec<&str> {
        events.iter().map(|e| e.data.as_str()).collect()
    }

    #[test]
    fn test_sse_parser_simple() {
        let mut parser = SseParser::new();
        let events = parser.parse_all(b"data: hello\n\n");
        assert_eq!(data_of(&events), vec!["hello"]);
    }

    #[test]
    fn test_sse_parser_with_event_and_id() {
        let mut parser = SseParser::new();
        let events = parser.parse_all(b"event: message\nid: 7\nretry: 1500\ndata: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("message"));
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[0].retry, Some(1500));
    }

    #[test]
    fn test_sse_parser_multiline_data() {
        let mut parser = SseParser::new();
        let events = parser.parse_all(b"data: line1\ndata: line2\n\n");
        assert_eq!(data_of(&events), vec!["line1\nline2"]);
    }

    #[test]
    fn test_sse_parser_multiple_events() {
        let mut parser = SseParser::new();
        let events = parser.parse_all(b"data: first\n\ndata: second\n\n");
        assert_eq!(data_of(&events), vec!["first", "second"]);
    }

    #[test]
    fn test_sse_parser_partial() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: hel").is_empty());
        assert_eq!(parser.remaining(), b"data: hel");
        let events = parser.feed(b"lo\n\n");
        assert_eq!(data_of(&events), vec!["hello"]);
        assert!(parser.remaining().is_empty());
    }

    #[test]
    fn test_sse_parser_split_utf8() {
        let mut parser = SseParser::new();
        let bytes = "data: café\n\n".as_bytes();
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(parser.feed(&bytes[..split]).is_empty());
        let events = parser.feed(&bytes[split..]);
        assert_eq!(data_of(&events), vec!["café"]);
    }

    #[test]
    fn test_sse_parser_crlf() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: one\r\n\r\ndata: two\r\n\r\n");
        assert_eq!(data_of(&events), vec!["one", "two"]);
    }

    #[test]
    fn test_sse_parser_comment_and_no_data() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": keep-alive\n\nevent: ping\n\ndata: hello\n\n");
        assert_eq!(data_of(&events), vec!["hello"]);
    }

    #[test]
    fn test_sse_parser_data_without_space() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data:tight\n\n");
        assert_eq!(data_of(&events), vec!["tight"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: {\"a\":1}").is_empty());
        let event = parser.finish().unwrap();
        assert_eq!(event.data, "{\"a\":1}");
        assert!(parser.finish().is_none());
    }

    #[test]
    fn test_fix_terminator() {
        assert_eq!(
            &*fix_terminator(b"data: [DONE]\n"),
            b"data: [DONE]\n\n"
        );
        assert!(matches!(fix_terminator(b"data: [DONE]\n\n"), Cow::Borrowed(_)));
        assert!(matches!(fix_terminator(b"data: [DONE]\r\n\r\n"), Cow::Borrowed(_)));
        assert!(matches!(fix_terminator(b"data: hi\n\n"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_terminator_without_blank_line_dispatches() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: x\n\ndata: [DONE]\n");
        assert_eq!(data_of(&events), vec!["x", "[DONE]"]);
    }

    #[tokio::test]
    async fn test_event_source_reassembles_chunks() {
        let chunks = vec![
            Ok::<_, std::convert::Infallible>(Bytes::from_static(b"data: fi")),
            Ok(Bytes::from_static(b"rst\n\nda")),
            Ok(Bytes::from_static(b"ta: second\n\ndata: third")),
        ];
        let events: Vec<_> = EventSource::new(futures::stream::iter(chunks))
            .map(|e| e.unwrap().data)
            .collect()
            .await;
        assert_eq!(events, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_event_source_passes_errors_through() {
        let chunks = vec![
            Ok(Bytes::from_static(b"data: ok\n\n")),
            Err("boom"),
            Ok(Bytes::from_static(b"data: after\n\n")),
        ];
        let mut source = EventSource::new(futures::stream::iter(chunks));
        assert_eq!(source.next().await.unwrap().unwrap().data, "ok");
        assert_eq!(source.next().await.unwrap().unwrap_err(), "boom");
        assert_eq!(source.next().await.unwrap().unwrap().data, "after");
        assert!(source.next().await.is_none());
    }

    impl SseParser {
        fn parse_all(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
            let mut events = self.feed(chunk);
            events.extend(self.finish());
            events
        }
    }
}
