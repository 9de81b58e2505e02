//! Batch unfilled fields and supporting evidence for submission to an
//! `LlmClient`. Batches are grouped by evidence source role
//! (manufacturer / review / retailer / ...) because mixing tiers in one
//! prompt makes per-field provenance ambiguous, and capped in size so a
//! single product page with hundreds of snippets doesn't blow the
//! provider's context window.

use specf_utils::types::{EvidencePack, Snippet, SourceRole};

pub const DEFAULT_MAX_SNIPPETS_PER_BATCH: usize = 24;
pub const DEFAULT_MAX_CHARS_PER_BATCH: usize = 12_000;

/// One role-scoped group of snippets and the fields still unfilled against them.
#[derive(Debug, Clone)]
pub struct EvidenceBatch {
    pub role: SourceRole,
    pub fields: Vec<String>,
    pub snippets: Vec<Snippet>,
}

/// Group an evidence pack's snippets by source role and attach the set of
/// fields still needing a value, capping each batch by count and total
/// character budget.
#[must_use]
pub fn build_batches(pack: &EvidencePack, unfilled_fields: &[String], max_snippets: usize, max_chars: usize) -> Vec<EvidenceBatch> {
    let roles = [SourceRole::Manufacturer, SourceRole::Review, SourceRole::Retailer, SourceRole::Database, SourceRole::Other];

    roles
        .into_iter()
        .filter_map(|role| {
            let mut chars = 0usize;
            let snippets: Vec<Snippet> = pack
                .snippets
                .iter()
                .filter(|s| pack.source_meta.get(&s.source_id).map(|src| src.role) == Some(role))
                .take(max_snippets)
                .take_while(|s| {
                    let fits = chars < max_chars;
                    chars += s.text.len();
                    fits
                })
                .cloned()
                .collect();
            if snippets.is_empty() {
                None
            } else {
                Some(EvidenceBatch { role, fields: unfilled_fields.to_vec(), snippets })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use specf_utils::types::{ExtractionMethodSurface, Source, SnippetType, Tier};
    use std::collections::BTreeMap;

    fn pack_with(roles: &[(&str, SourceRole)]) -> EvidencePack {
        let mut source_meta = BTreeMap::new();
        let mut snippets = Vec::new();
        for (id, role) in roles {
            source_meta.insert(
                (*id).to_string(),
                Source {
                    source_id: (*id).to_string(),
                    url: format!("https://example.com/{id}"),
                    host: "example.com".to_string(),
                    root_domain: "example.com".to_string(),
                    tier: Tier(1),
                    role: *role,
                    approved_domain: true,
                    candidate_source: false,
                    discovered_from: None,
                    priority_score: 1.0,
                    display_name: None,
                },
            );
            snippets.push(Snippet {
                id: format!("{id}-snip"),
                source_id: (*id).to_string(),
                kind: SnippetType::Prose,
                text: "DPI: 26000".to_string(),
                normalized_text: "dpi: 26000".to_string(),
                url: format!("https://example.com/{id}"),
                snippet_hash: "deadbeef".to_string(),
                extraction_method: ExtractionMethodSurface::Text,
            });
        }
        EvidencePack { snippets, references: vec![], source_meta }
    }

    #[test]
    fn groups_snippets_by_role() {
        let pack = pack_with(&[("mfr", SourceRole::Manufacturer), ("rev", SourceRole::Review)]);
        let batches = build_batches(&pack, &["dpi".to_string()], DEFAULT_MAX_SNIPPETS_PER_BATCH, DEFAULT_MAX_CHARS_PER_BATCH);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().any(|b| b.role == SourceRole::Manufacturer));
        assert!(batches.iter().any(|b| b.role == SourceRole::Review));
    }

    #[test]
    fn caps_snippet_count_per_batch() {
        let roles: Vec<(&str, SourceRole)> = (0..10).map(|_| ("mfr", SourceRole::Manufacturer)).collect();
        let pack = pack_with(&roles);
        let batches = build_batches(&pack, &["dpi".to_string()], 3, DEFAULT_MAX_CHARS_PER_BATCH);
        assert_eq!(batches[0].snippets.len(), 3);
    }

    #[test]
    fn empty_role_produces_no_batch() {
        let pack = pack_with(&[("mfr", SourceRole::Manufacturer)]);
        let batches = build_batches(&pack, &["dpi".to_string()], DEFAULT_MAX_SNIPPETS_PER_BATCH, DEFAULT_MAX_CHARS_PER_BATCH);
        assert!(!batches.iter().any(|b| b.role == SourceRole::Retailer));
    }
}
