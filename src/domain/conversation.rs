// ============================================================
// Layer 3 — Conversation Record
// ============================================================
// The canonical unit of training data after formatting:
// an ordered list of chat messages, each tagged with who
// said it. Raw JSONL rows are turned into exactly this shape
// by the formatter, and this shape is what the splitter
// persists and the dataset reads back.
//
// Why a closed Role enum instead of free-form strings?
//   A typo like "assistent" in a role field would silently
//   train the model on garbage. With an enum, serde rejects
//   unknown roles at parse time and the rest of the pipeline
//   never has to re-validate.
//
// Reference: Rust Book §6 (Enums), serde derive documentation

use serde::{Deserialize, Serialize};

// ─── Role ─────────────────────────────────────────────────────────────────────
/// Who produced a message. Serialised in lowercase so the JSONL
/// on disk reads `{"role": "user", ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the whole conversation
    System,
    /// The instruction-giver (the prompt side of a record)
    User,
    /// The response the model is trained to produce
    Assistant,
}

impl Role {
    /// The lowercase tag used by chat templates (`system`, `user`,
    /// `assistant`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System    => "system",
            Role::User      => "user",
            Role::Assistant => "assistant",
        }
    }
}

// ─── Message ──────────────────────────────────────────────────────────────────
/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role:    Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

// ─── ConversationRecord ───────────────────────────────────────────────────────
/// A full training example: the messages of one conversation,
/// in order. Persisted as one JSON object per line:
///
///   {"messages": [{"role": "system", ...}, ...]}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub messages: Vec<Message>,
}

impl ConversationRecord {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}
