//! Wire types for the opaque `LLMClient.chat(prompt, schema) -> StructuredResult`
//! contract. The schema and prompt are both provider-agnostic:
//! this crate never assumes a specific model or API shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One field's extracted value, or the literal `"unk"` sentinel with a
/// reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldExtraction {
    pub value: String,
    #[serde(default)]
    pub reason: Option<String>,
    /// The verbatim quote supporting this value, if the model cited one.
    #[serde(default)]
    pub quote: Option<String>,
    #[serde(default)]
    pub snippet_id: Option<String>,
}

impl FieldExtraction {
    #[must_use]
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self { value: specf_utils::types::UNKNOWN_VALUE.to_string(), reason: Some(reason.into()), quote: None, snippet_id: None }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.value == specf_utils::types::UNKNOWN_VALUE
    }
}

/// A batch's structured response: one extraction per requested field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredResult {
    pub fields: BTreeMap<String, FieldExtraction>,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("response did not match schema: {0}")]
    SchemaMismatch(String),

    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),
}
