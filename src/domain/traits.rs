// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Traits are Rust's way of defining shared behaviour —
// similar to interfaces in Java or abstract classes in Python.
//
// By programming against traits instead of concrete types,
// we can swap implementations without changing the code
// that uses them. For example:
//   - ChatMlTemplate implements ChatTemplate
//   - A future ZephyrTemplate could also implement ChatTemplate
//   - The dataset only sees ChatTemplate and works with both
//     without any changes
//
// This is the Dependency Inversion Principle from SOLID,
// applied using Rust's trait system.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            Rust Book §17 (Object Oriented Patterns)

use crate::domain::conversation::ConversationRecord;

// ─── RenderedConversation ─────────────────────────────────────────────────────
/// The result of applying a chat template to a conversation.
///
/// `response_start` is the byte offset in `text` where the final
/// assistant turn's content begins. Everything before it is
/// prompt (system turn, user turn, template markers) and is
/// masked out of the training loss; everything from it onwards
/// is what the model learns to generate.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedConversation {
    pub text:           String,
    pub response_start: usize,
}

// ─── ChatTemplate ─────────────────────────────────────────────────────────────
/// Any component that can turn a structured conversation into the
/// single text string a tokenizer consumes.
///
/// Implementations:
///   - ChatMlTemplate → `<|im_start|>role ... <|im_end|>` markup
///   - (future) other instruct formats behind the same seam
pub trait ChatTemplate: Send + Sync {
    /// Render the conversation to text, reporting where the
    /// trainable response begins.
    fn render(&self, record: &ConversationRecord) -> RenderedConversation;
}
