//! Business logic services for the chat proxy.
//!
//! - [`budget`]: trimming the conversation to the character budget
//! - [`completion`]: the upstream call and the streaming transform

pub mod budget;
pub mod completion;

// Re-export commonly used types
pub use budget::{select_within_budget, CHAR_BUDGET};
pub use completion::{create_http_client, CompletionService, CompletionStream};
