//! Strategy 2: split a snippet on `|`, find `key: value` pairs, and
//! score the key against a field's token variants. The canonical floor is
//! 0.8.

use specf_rules::field_rule::FieldRule;
use specf_rules::similarity::key_similarity;
use specf_utils::types::{Candidate, CandidateMethod, Snippet, Source, SnippetType, Tier};

const CANONICAL_FLOOR: f64 = 0.8;

pub fn extract(rule: &FieldRule, snippet: &Snippet, source: Option<&Source>) -> Vec<Candidate> {
    if snippet.kind != SnippetType::SpecTableRow && !snippet.text.contains('|') {
        return Vec::new();
    }

    let variants = rule.token_variants();
    let mut out = Vec::new();

    for cell in snippet.text.split('|') {
        let Some((key, value)) = split_key_value(cell) else { continue };
        let similarity = key_similarity(key, &variants);
        if similarity < CANONICAL_FLOOR {
            continue;
        }

        let confidence = (0.8 + 0.18 * ((similarity - CANONICAL_FLOOR) / 0.2).clamp(0.0, 1.0)).clamp(0.8, 0.98);
        out.push(Candidate {
            field: rule.field.clone(),
            value: value.to_string(),
            method: CandidateMethod::SpecTableMatch,
            key_path: Some(key.to_string()),
            evidence_refs: vec![snippet.id.clone()],
            snippet_id: Some(snippet.id.clone()),
            quote: Some(cell.trim().to_string()),
            confidence,
            source_host: source.map(|s| s.host.clone()).unwrap_or_default(),
            source_tier: source.map(|s| s.tier).unwrap_or(Tier(5)),
            inferred_from: None,
            constraint_violations: vec![],
            constraint_warnings: vec![],
        });
    }

    out
}

fn split_key_value(cell: &str) -> Option<(&str, &str)> {
    let idx = cell.find(':')?;
    let key = cell[..idx].trim();
    let value = cell[idx + 1..].trim();
    if key.is_empty() || value.is_empty() {
        None
    } else {
        Some((key, value))
    }
}
