//! Deterministic test double for [`crate::client::LlmClient`]. No network,
//! no nondeterminism — used by this crate's own tests and by every
//! downstream crate that needs an `LlmClient` without a real provider.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::LlmClient;
use crate::types::{FieldExtraction, LlmError, StructuredResult};

/// Returns pre-programmed [`StructuredResult`]s in call order, or a
/// canned per-field map if constructed with [`MockLlmClient::canned`].
pub struct MockLlmClient {
    model_name: String,
    queued: Mutex<Vec<StructuredResult>>,
    calls: Mutex<Vec<String>>,
    /// If set, calls at or beyond this index fail with a provider error.
    fail_at: Option<usize>,
}

impl MockLlmClient {
    #[must_use]
    pub fn new(model_name: impl Into<String>, responses: Vec<StructuredResult>) -> Self {
        Self { model_name: model_name.into(), queued: Mutex::new(responses), calls: Mutex::new(Vec::new()), fail_at: None }
    }

    /// A client that always answers every field in `fields` with `value`.
    #[must_use]
    pub fn canned(model_name: impl Into<String>, fields: &[(&str, &str)]) -> Self {
        let mut result = StructuredResult::default();
        for (field, value) in fields {
            result.fields.insert((*field).to_string(), FieldExtraction { value: (*value).to_string(), reason: None, quote: None, snippet_id: None });
        }
        Self::new(model_name, vec![result])
    }

    /// A client that answers `"unk"` for every field named in `fields`.
    #[must_use]
    pub fn always_unknown(model_name: impl Into<String>, fields: &[&str], reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut result = StructuredResult::default();
        for field in fields {
            result.fields.insert((*field).to_string(), FieldExtraction::unknown(reason.clone()));
        }
        Self::new(model_name, vec![result])
    }

    /// A client whose `n`th call (0-indexed) onward fails with a provider error.
    #[must_use]
    pub fn failing_from(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    #[must_use]
    pub fn prompts_seen(&self) -> Vec<String> {
        self.calls.lock().expect("mock llm client mutex poisoned").clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(&self, prompt: &str, _schema: &Value) -> Result<StructuredResult, LlmError> {
        let mut calls = self.calls.lock().expect("mock llm client mutex poisoned");
        let call_index = calls.len();
        calls.push(prompt.to_string());
        drop(calls);

        if let Some(n) = self.fail_at {
            if call_index >= n {
                return Err(LlmError::Provider("mock client configured to fail".to_string()));
            }
        }

        let mut queued = self.queued.lock().expect("mock llm client mutex poisoned");
        if queued.is_empty() {
            return Ok(StructuredResult::default());
        }
        Ok(queued.remove(0))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
