//! Interpretation of chat-completion stream payloads.

use serde::Deserialize;

/// Payload value marking the end of an upstream completion stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One upstream completion event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental text. Empty when the chunk carried no content.
    Delta(String),
    /// Terminator sentinel; nothing follows.
    Done,
}

impl StreamEvent {
    /// Interpret the `data` field of an SSE event.
    pub fn from_data(data: &str) -> Result<Self, serde_json::Error> {
        if data == DONE_SENTINEL {
            return Ok(StreamEvent::Done);
        }

        let chunk: CompletionChunk = serde_json::from_str(data)?;
        Ok(StreamEvent::Delta(chunk.into_text()))
    }
}

/// Streaming chat-completion chunk, reduced to the fields the proxy reads.
#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionChunk {
    /// Text of the first choice's delta.
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .unwrap_or_default()
    }
}
