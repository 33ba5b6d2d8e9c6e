//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, rounding up.
//! Every component of the system counts tokens the same way, so budget
//! arithmetic stays consistent end to end.

use crate::message::HistoricalMessage;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.len() + 3) / 4
}

/// Estimate tokens for a single historical message.
pub fn estimate_message_tokens(message: &HistoricalMessage) -> usize {
    estimate_tokens(&message.content)
}
