//! Conversation trimming against a character budget.

use crate::api::models::Message;

/// Maximum total UTF-16 length of caller messages forwarded upstream.
pub const CHAR_BUDGET: usize = 12_000;

/// Longest prefix of `messages` whose total content length fits `budget`.
///
/// Length is measured in UTF-16 code units, so characters outside the
/// Basic Multilingual Plane count twice.
///
/// Selection stops at the first message that would overflow; later
/// messages are dropped even when they would fit on their own.
pub fn select_within_budget(messages: &[Message], budget: usize) -> &[Message] {
    let mut used = 0usize;
    let mut count = 0;

    for message in messages {
        let next = used + message.budget_len();
        if next > budget {
            break;
        }
        used = next;
        count += 1;
    }

    &messages[..count]
}
