//! Server-Sent Events support.
//!
//! Framing ([`parser`]) is kept separate from the meaning of each payload
//! ([`event`]); the completion service combines the two.

pub mod event;
pub mod parser;

pub use event::{StreamEvent, DONE_SENTINEL};
pub use parser::{fix_terminator, EventSource, SseEvent, SseParser};
