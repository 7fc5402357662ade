//! Prompt augmentation with retrieved passages.

use crate::retrieval::RetrievalCandidate;
use crate::routing::{ChatMessage, Role};

const PREAMBLE: &str = "Use the following context to answer the user's question. \
If the context is not relevant, answer from your own knowledge.";

/// Text of the most recent user message, if any.
pub fn last_user_query(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.trim())
        .filter(|q| !q.is_empty())
}

/// Prepend one system message listing `passages` in rank order.
///
/// No passages leaves the conversation untouched.
pub fn augment(messages: Vec<ChatMessage>, passages: &[RetrievalCandidate]) -> Vec<ChatMessage> {
    if passages.is_empty() {
        return messages;
    }

    let mut context = String::from(PREAMBLE);
    for (i, passage) in passages.iter().enumerate() {
        context.push_str(&format!("\n\n[{}] {}", i + 1, passage.content.trim()));
    }

    let mut augmented = Vec::with_capacity(messages.len() + 1);
    augmented.push(ChatMessage::new(Role::System, context));
    augmented.extend(messages);
    augmented
}
