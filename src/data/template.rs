// ============================================================
// Layer 4 — ChatML Template
// ============================================================
// Renders a conversation into the ChatML wire format:
//
//   <|im_start|>system
//   You are helpful.<|im_end|>
//   <|im_start|>user
//   What is 2+2?<|im_end|>
//   <|im_start|>assistant
//   4<|im_end|>
//
// Every turn is wrapped in <|im_start|>role ... <|im_end|>
// markers. The markers are registered as special tokens in the
// tokenizer so they survive tokenisation as single ids.
//
// The rendered text also reports where the final assistant
// turn's content begins — the dataset masks everything before
// that offset out of the loss, so the model is only trained on
// producing responses, not on echoing prompts.

use crate::domain::conversation::{ConversationRecord, Role};
use crate::domain::traits::{ChatTemplate, RenderedConversation};

pub const IM_START: &str = "<|im_start|>";
pub const IM_END:   &str = "<|im_end|>";

/// The ChatML implementation of the ChatTemplate trait.
#[derive(Debug, Clone, Default)]
pub struct ChatMlTemplate;

impl ChatTemplate for ChatMlTemplate {
    fn render(&self, record: &ConversationRecord) -> RenderedConversation {
        let last_assistant = record
            .messages
            .iter()
            .rposition(|m| m.role == Role::Assistant);

        let mut text = String::new();
        let mut response_start = None;

        for (idx, message) in record.messages.iter().enumerate() {
            text.push_str(IM_START);
            text.push_str(message.role.as_str());
            text.push('\n');

            // The response begins right after the assistant header
            if last_assistant == Some(idx) {
                response_start = Some(text.len());
            }

            text.push_str(&message.content);
            text.push_str(IM_END);
            text.push('\n');
        }

        // No assistant turn → nothing is trainable
        let response_start = response_start.unwrap_or(text.len());

        RenderedConversation { text, response_start }
    }
}
