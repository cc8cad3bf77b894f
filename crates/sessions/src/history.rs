//! Per-session conversation memory.

use dq_domain::tool::Message;

/// Ordered user/assistant turns.
///
/// The whole history is retained until [`clear`](Self::clear); callers take
/// a bounded window of it with [`recent`](Self::recent).
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed exchange as two turns.
    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push(Message::user(user));
        self.turns.push(Message::assistant(assistant));
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Message> {
        let start = self.turns.len().saturating_sub(n);
        self.turns[start..].to_vec()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Message] {
        &self.turns
    }
}
