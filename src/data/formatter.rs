// ============================================================
// Layer 4 — Record Formatter
// ============================================================
// Turns one raw dataset row into a three-turn conversation:
//
//   system    → the shared system prompt
//   user      → the value of the configured instruction field
//   assistant → the value of the configured response field
//
// Which two columns hold the instruction and the response is
// runtime configuration, so different source datasets can be
// formatted without code changes.
//
// Field errors carry the offending field name: when a 50k-row
// dataset fails, "field 'expected_answer' missing" is the
// difference between a ten-second fix and an evening of
// debugging. `FieldSelection::validate` lets callers check the
// configuration against the first row before any expensive work.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{bail, Result};
use serde_json::Value;

use crate::data::loader::RawRecord;
use crate::domain::conversation::{ConversationRecord, Message, Role};

// ─── FieldSelection ───────────────────────────────────────────────────────────
/// The two column names consumed from every raw row.
#[derive(Debug, Clone)]
pub struct FieldSelection {
    /// Column holding the user-side instruction
    pub instruction: String,
    /// Column holding the assistant-side response
    pub response:    String,
}

impl FieldSelection {
    pub fn new(instruction: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            response:    response.into(),
        }
    }

    /// Check this selection against one row. Called with the first
    /// record at startup so a misconfigured field name fails before
    /// any formatting work happens.
    pub fn validate(&self, record: &RawRecord) -> Result<()> {
        require_string(record, &self.instruction)?;
        require_string(record, &self.response)?;
        Ok(())
    }
}

// ─── RecordFormatter ──────────────────────────────────────────────────────────
/// Stateless formatter: system prompt + field selection in,
/// conversations out.
pub struct RecordFormatter {
    system_prompt: String,
    fields:        FieldSelection,
}

impl RecordFormatter {
    pub fn new(system_prompt: impl Into<String>, fields: FieldSelection) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            fields,
        }
    }

    /// Format one raw row. Always yields exactly three messages in
    /// system, user, assistant order.
    pub fn format_record(&self, record: &RawRecord) -> Result<ConversationRecord> {
        let instruction = require_string(record, &self.fields.instruction)?;
        let response    = require_string(record, &self.fields.response)?;

        Ok(ConversationRecord::new(vec![
            Message::new(Role::System, self.system_prompt.clone()),
            Message::new(Role::User, instruction),
            Message::new(Role::Assistant, response),
        ]))
    }

    /// Format every row, validating the configuration against the
    /// first one so bad field names fail immediately.
    pub fn format_all(&self, records: &[RawRecord]) -> Result<Vec<ConversationRecord>> {
        if let Some(first) = records.first() {
            self.fields.validate(first)?;
        }

        records.iter().map(|r| self.format_record(r)).collect()
    }
}

/// Fetch a field that must exist and must be a string.
fn require_string(record: &RawRecord, field: &str) -> Result<String> {
    match record.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => bail!("Field '{}' is present but not a string", field),
        None    => bail!("Field '{}' missing from record", field),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    fn formatter() -> RecordFormatter {
        RecordFormatter::new(
            "You are helpful.",
            FieldSelection::new("question", "expected_answer"),
        )
    }

    #[test]
    fn test_three_messages_in_order_with_field_values() {
        let record = row(&[
            ("question", "What is 2+2?"),
            ("expected_answer", "4"),
            ("unused_column", "ignored"),
        ]);

        let conv = formatter().format_record(&record).unwrap();

        assert_eq!(conv.messages.len(), 3);
        assert_eq!(conv.messages[0].role, Role::System);
        assert_eq!(conv.messages[0].content, "You are helpful.");
        assert_eq!(conv.messages[1].role, Role::User);
        assert_eq!(conv.messages[1].content, "What is 2+2?");
        assert_eq!(conv.messages[2].role, Role::Assistant);
        assert_eq!(conv.messages[2].content, "4");
    }

    #[test]
    fn test_missing_field_names_the_field() {
        let record = row(&[("question", "q only")]);
        let err = formatter().format_record(&record).unwrap_err();
        assert!(err.to_string().contains("expected_answer"));
    }

    #[test]
    fn test_non_string_field_is_rejected() {
        let mut record = row(&[("question", "q")]);
        record.insert("expected_answer".into(), Value::from(42));
        let err = formatter().format_record(&record).unwrap_err();
        assert!(err.to_string().contains("not a string"));
    }

    #[test]
    fn test_format_all_fails_fast_on_bad_selection() {
        let records = vec![row(&[("other", "x")]), row(&[("other", "y")])];
        let err = formatter().format_all(&records).unwrap_err();
        assert!(err.to_string().contains("question"));
    }

    #[test]
    fn test_format_all_empty_input() {
        let formatted = formatter().format_all(&[]).unwrap();
        assert!(formatted.is_empty());
    }
}
