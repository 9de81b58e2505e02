//! `LLMClient` contract and the `LLMExtractor` stage built around it. This crate ships the trait, a deterministic mock, and the
//! batching/caching/routing/budget logic that wraps any concrete
//! provider — it carries no provider SDK of its own; providing one is
//! explicitly out of scope for this workspace.

pub mod batching;
pub mod budget;
pub mod cache;
pub mod client;
pub mod extractor;
pub mod mock;
pub mod routing;
pub mod types;

pub use batching::{build_batches, EvidenceBatch};
pub use budget::{BudgetError, BudgetGuard};
pub use cache::LlmCache;
pub use client::LlmClient;
pub use extractor::LlmExtractor;
pub use mock::MockLlmClient;
pub use routing::{batch_needs_reasoning_model, classify, FieldDifficulty};
pub use types::{FieldExtraction, LlmError, StructuredResult};
