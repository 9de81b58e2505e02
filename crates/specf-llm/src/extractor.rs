//! `LLMExtractor`: the last-resort extraction stage. Runs only on
//! fields still unknown after the deterministic parser and component
//! resolver, batched by evidence source role, cached by content hash, and
//! budget-guarded end to end.

use std::sync::Arc;

use serde_json::{json, Value};
use specf_config::LlmConfig;
use specf_rules::FieldRulesEngine;
use specf_utils::canonicalization::blake3_hex;
use specf_utils::types::{Candidate, CandidateMethod, EvidencePack, Tier, UNKNOWN_VALUE};
use tracing::warn;

use crate::batching::{build_batches, DEFAULT_MAX_CHARS_PER_BATCH, DEFAULT_MAX_SNIPPETS_PER_BATCH};
use crate::budget::BudgetGuard;
use crate::cache::LlmCache;
use crate::client::LlmClient;
use crate::routing::batch_needs_reasoning_model;
use crate::types::LlmError;

/// Confidence assigned to every LLM-sourced candidate: deliberately
/// lower than any deterministic or component-inferred method so the merger
/// only prefers it when nothing else answered the field.
pub const LLM_CANDIDATE_CONFIDENCE: f64 = 0.55;

/// Estimated USD cost charged against the budget guard per call. A real
/// provider would report actual token usage; this reference
/// implementation charges a flat estimate so the guard logic is testable
/// without a live billing API.
pub const ESTIMATED_COST_PER_CALL_USD: f64 = 0.02;

pub struct LlmExtractor {
    fast_model: Arc<dyn LlmClient>,
    reasoning_model: Arc<dyn LlmClient>,
    cache: LlmCache,
    budget: BudgetGuard,
    config: LlmConfig,
}

impl LlmExtractor {
    #[must_use]
    pub fn new(fast_model: Arc<dyn LlmClient>, reasoning_model: Arc<dyn LlmClient>, config: LlmConfig) -> Self {
        let ttl_days = i64::try_from(config.llm_extraction_cache_ttl_ms / (24 * 60 * 60 * 1000)).unwrap_or(crate::cache::DEFAULT_TTL_DAYS).max(1);
        Self { fast_model, reasoning_model, cache: LlmCache::new(ttl_days), budget: BudgetGuard::new(&config), config }
    }

    pub fn start_product(&self) {
        self.budget.start_product();
    }

    pub fn start_round(&self) {
        self.budget.start_round();
    }

    /// Run one extraction round over `unfilled_fields`, returning a
    /// candidate for every field the model answered (including explicit
    /// `"unk"` answers, which the merger treats as "searched, not found").
    pub async fn extract(&self, rules: &FieldRulesEngine, pack: &EvidencePack, unfilled_fields: &[String]) -> Vec<Candidate> {
        if !self.config.llm_enabled || unfilled_fields.is_empty() {
            return Vec::new();
        }

        let batches = build_batches(pack, unfilled_fields, DEFAULT_MAX_SNIPPETS_PER_BATCH, DEFAULT_MAX_CHARS_PER_BATCH);
        let mut candidates = Vec::new();

        for batch in batches {
            let rule_refs: Vec<&specf_rules::FieldRule> = batch.fields.iter().filter_map(|f| rules.rule(f)).collect();
            let needs_reasoning = batch_needs_reasoning_model(&rule_refs);
            let model: &Arc<dyn LlmClient> = if needs_reasoning { &self.reasoning_model } else { &self.fast_model };

            let prompt = build_prompt(&batch.fields, &batch.snippets);
            let schema = build_schema(&batch.fields);
            let evidence_hash = blake3_hex(batch.snippets.iter().map(|s| s.snippet_hash.as_str()).collect::<Vec<_>>().join(",").as_bytes());

            let cache_key = if self.config.llm_extraction_cache_enabled {
                Some(LlmCache::key(&prompt, &evidence_hash, model.model_name()))
            } else {
                None
            };

            let result = if let Some(ref key) = cache_key {
                if let Some(cached) = self.cache.get(key) {
                    Some(cached)
                } else {
                    None
                }
            } else {
                None
            };

            let result = match result {
                Some(r) => r,
                None => {
                    if let Err(e) = self.budget.try_reserve(ESTIMATED_COST_PER_CALL_USD) {
                        warn!(error = %e, "llm extraction skipped: budget exhausted");
                        continue;
                    }
                    match model.chat(&prompt, &schema).await {
                        Ok(r) => {
                            if let Some(key) = cache_key {
                                self.cache.put(key, r.clone());
                            }
                            r
                        }
                        Err(e) => {
                            warn!(error = %specf_error_redaction::redact_error_message_for_logging(&e.to_string()), "llm batch failed");
                            continue;
                        }
                    }
                }
            };

            for (field, extraction) in result.fields {
                if !batch.fields.contains(&field) {
                    continue;
                }
                let snippet = extraction.snippet_id.as_deref().and_then(|id| pack.find_snippet(id));
                let (source_host, source_tier) = snippet
                    .and_then(|s| pack.source_meta.get(&s.source_id))
                    .map_or(("unk".to_string(), Tier(5)), |src| (src.host.clone(), src.tier));

                candidates.push(Candidate {
                    field,
                    value: extraction.value.clone(),
                    method: CandidateMethod::LlmExtract,
                    key_path: None,
                    evidence_refs: extraction.snippet_id.clone().into_iter().collect(),
                    snippet_id: extraction.snippet_id,
                    quote: extraction.quote,
                    confidence: if extraction.value == UNKNOWN_VALUE { 0.0 } else { LLM_CANDIDATE_CONFIDENCE },
                    source_host,
                    source_tier,
                    inferred_from: None,
                    constraint_violations: vec![],
                    constraint_warnings: vec![],
                });
            }
        }

        candidates
    }
}

fn build_prompt(fields: &[String], snippets: &[specf_utils::types::Snippet]) -> String {
    let mut prompt = String::from("Extract the following fields from the evidence below. Answer \"unk\" with a reason if a field is not supported by the evidence.\nFields: ");
    prompt.push_str(&fields.join(", "));
    prompt.push_str("\nEvidence:\n");
    for s in snippets {
        prompt.push_str(&s.normalized_text);
        prompt.push('\n');
    }
    prompt
}

fn build_schema(fields: &[String]) -> Value {
    let properties: serde_json::Map<String, Value> =
        fields.iter().map(|f| (f.clone(), json!({"type": "object", "properties": {"value": {"type": "string"}, "reason": {"type": "string"}}}))).collect();
    json!({"type": "object", "properties": properties, "required": fields})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLlmClient;
    use specf_utils::types::{ExtractionMethodSurface, Snippet, SnippetType, Source, SourceRole};
    use std::collections::BTreeMap;

    fn llm_config() -> LlmConfig {
        LlmConfig {
            llm_enabled: true,
            llm_extraction_cache_enabled: true,
            llm_extraction_cache_ttl_ms: 7 * 24 * 60 * 60 * 1000,
            llm_max_calls_per_product_total: 10,
            llm_max_calls_per_round: 10,
            llm_per_product_budget_usd: 10.0,
            llm_monthly_budget_usd: 100.0,
        }
    }

    fn pack_with_manufacturer_snippet() -> EvidencePack {
        let mut source_meta = BTreeMap::new();
        source_meta.insert(
            "mfr-1".to_string(),
            Source {
                source_id: "mfr-1".to_string(),
                url: "https://example.com/product".to_string(),
                host: "example.com".to_string(),
                root_domain: "example.com".to_string(),
                tier: Tier(1),
                role: SourceRole::Manufacturer,
                approved_domain: true,
                candidate_source: false,
                discovered_from: None,
                priority_score: 1.0,
                display_name: None,
            },
        );
        EvidencePack {
            snippets: vec![Snippet {
                id: "snip-1".to_string(),
                source_id: "mfr-1".to_string(),
                kind: SnippetType::Prose,
                text: "Weight: 54g".to_string(),
                normalized_text: "weight: 54g".to_string(),
                url: "https://example.com/product".to_string(),
                snippet_hash: "hash-1".to_string(),
                extraction_method: ExtractionMethodSurface::Text,
            }],
            references: vec![],
            source_meta,
        }
    }

    #[tokio::test]
    async fn extract_returns_candidate_for_answered_field() {
        let fast = Arc::new(MockLlmClient::canned("mock-fast", &[("weight", "54")]));
        let reasoning = Arc::new(MockLlmClient::canned("mock-reasoning", &[("weight", "54")]));
        let rules = FieldRulesEngine::built_in();
        let pack = pack_with_manufacturer_snippet();
        let extractor = LlmExtractor::new(fast, reasoning, llm_config());

        let candidates = extractor.extract(&rules, &pack, &["weight".to_string()]).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].value, "54");
        assert_eq!(candidates[0].method, CandidateMethod::LlmExtract);
    }

    #[tokio::test]
    async fn unknown_answer_gets_zero_confidence() {
        let fast = Arc::new(MockLlmClient::always_unknown("mock-fast", &["weight"], "not in evidence"));
        let reasoning = Arc::new(MockLlmClient::canned("mock-reasoning", &[]));
        let rules = FieldRulesEngine::built_in();
        let pack = pack_with_manufacturer_snippet();
        let extractor = LlmExtractor::new(fast, reasoning, llm_config());

        let candidates = extractor.extract(&rules, &pack, &["weight".to_string()]).await;
        assert_eq!(candidates[0].value, UNKNOWN_VALUE);
        assert_eq!(candidates[0].confidence, 0.0);
    }

    #[tokio::test]
    async fn second_identical_batch_is_served_from_cache() {
        let fast = Arc::new(MockLlmClient::canned("mock-fast", &[("weight", "54")]));
        let reasoning = Arc::new(MockLlmClient::canned("mock-reasoning", &[]));
        let rules = FieldRulesEngine::built_in();
        let pack = pack_with_manufacturer_snippet();
        let extractor = LlmExtractor::new(Arc::clone(&fast) as Arc<dyn LlmClient>, reasoning, llm_config());

        extractor.extract(&rules, &pack, &["weight".to_string()]).await;
        extractor.extract(&rules, &pack, &["weight".to_string()]).await;
        assert_eq!(fast.prompts_seen().len(), 1);
    }

    #[tokio::test]
    async fn disabled_llm_returns_no_candidates() {
        let fast = Arc::new(MockLlmClient::canned("mock-fast", &[("weight", "54")]));
        let reasoning = Arc::new(MockLlmClient::canned("mock-reasoning", &[]));
        let rules = FieldRulesEngine::built_in();
        let pack = pack_with_manufacturer_snippet();
        let mut config = llm_config();
        config.llm_enabled = false;
        let extractor = LlmExtractor::new(fast, reasoning, config);

        let candidates = extractor.extract(&rules, &pack, &["weight".to_string()]).await;
        assert!(candidates.is_empty());
    }
}
