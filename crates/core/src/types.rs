//! Shared primitive types.

/// Numeric identity of a chat user, as assigned by the chat network.
///
/// Telegram-style networks hand out signed 64-bit ids, so that is what we
/// store and compare everywhere.
pub type UserId = i64;
