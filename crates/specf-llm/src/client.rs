//! The opaque `LLMClient` contract. Concrete provider backends
//! (Anthropic, OpenAI, local models, CLI wrappers) live outside this crate;
//! everything here is provider-agnostic.

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{LlmError, StructuredResult};

/// A model capable of returning a structured extraction for a batch.
///
/// Implementations own their own retry/backoff and must redact secrets
/// (API keys, auth headers) from any error they return — this crate treats
/// `LlmError::Provider` strings as already-safe-to-log.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send `prompt` plus the JSON `schema` the response must conform to,
    /// and return the provider's best attempt at a structured result.
    async fn chat(&self, prompt: &str, schema: &Value) -> Result<StructuredResult, LlmError>;

    /// A short, stable name identifying the model/backend, used in cache
    /// keys and logs. Never includes credentials.
    fn model_name(&self) -> &str;
}
