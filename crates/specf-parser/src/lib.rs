//! The deterministic extraction cascade: three strategies run over
//! every snippet in an `EvidencePack` against the compiled field rules,
//! deduplicated across strategies. No network, no LLM — every candidate
//! this crate emits is reproducible from the snippet text alone.

mod regex_strategy;
mod spec_row;
mod structured;

use std::collections::HashSet;

use specf_rules::FieldRulesEngine;
use specf_utils::types::{Candidate, EvidencePack, Snippet, Source};

/// Run all three strategies over every snippet for every field rule,
/// then dedupe across strategies by `(field, value, method, firstEvidenceRef)`.
#[must_use]
pub fn parse(engine: &FieldRulesEngine, pack: &EvidencePack) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for snippet in &pack.snippets {
        let source = source_for(pack, snippet);
        for rule in engine.all_rules() {
            candidates.extend(regex_strategy::extract(rule, snippet, source));
            candidates.extend(spec_row::extract(rule, snippet, source));
            if let Some(c) = structured::extract(rule, snippet, source) {
                candidates.push(c);
            }
        }
    }

    dedupe(candidates)
}

fn source_for<'a>(pack: &'a EvidencePack, snippet: &Snippet) -> Option<&'a Source> {
    pack.source_meta.get(&snippet.source_id)
}

fn first_evidence_ref(candidate: &Candidate) -> String {
    candidate.snippet_id.clone().or_else(|| candidate.evidence_refs.first().cloned()).unwrap_or_default()
}

fn dedupe(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(candidates.len());
    for c in candidates {
        let key = (c.field.clone(), c.value.clone(), c.method, first_evidence_ref(&c));
        if seen.insert(key) {
            out.push(c);
        }
    }
    out
}

/// Apply a field rule's named normalizer to a raw capture, or just trim
/// when no normalizer (or an unrecognized one) is declared.
fn normalize(raw: &str, normalizer: Option<&str>) -> String {
    let trimmed = raw.trim();
    match normalizer {
        Some("strip_commas") => trimmed.replace(',', ""),
        Some("lowercase") => trimmed.to_lowercase(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use specf_rules::FieldRulesEngine;
    use specf_utils::types::{ExtractionMethodSurface, SnippetType};

    use super::*;

    fn snippet(id: &str, kind: SnippetType, text: &str, source_id: &str, method: ExtractionMethodSurface) -> Snippet {
        Snippet {
            id: id.to_string(),
            source_id: source_id.to_string(),
            kind,
            text: text.to_string(),
            normalized_text: text.to_lowercase(),
            url: "https://example.com/product".to_string(),
            snippet_hash: "deadbeef".to_string(),
            extraction_method: method,
        }
    }

    fn pack_with(snippets: Vec<Snippet>) -> EvidencePack {
        let mut source_meta = BTreeMap::new();
        source_meta.insert(
            "src1".to_string(),
            Source {
                source_id: "src1".to_string(),
                url: "https://example.com/product".to_string(),
                host: "example.com".to_string(),
                root_domain: "example.com".to_string(),
                tier: specf_utils::types::Tier(1),
                role: specf_utils::types::SourceRole::Manufacturer,
                approved_domain: true,
                candidate_source: false,
                discovered_from: None,
                priority_score: 0.0,
                display_name: None,
            },
        );
        EvidencePack { snippets, references: vec![], source_meta }
    }

    #[test]
    fn s3_spec_row_yields_sensor_and_polling_rate() {
        let engine = FieldRulesEngine::built_in();
        let pack = pack_with(vec![snippet(
            "s1",
            SnippetType::SpecTableRow,
            "sensor: PixArt PAW3950 | polling rate: 8000Hz",
            "src1",
            ExtractionMethodSurface::Table,
        )]);

        let candidates = parse(&engine, &pack);
        let sensor = candidates.iter().find(|c| c.field == "sensor").unwrap();
        assert_eq!(sensor.value, "PixArt PAW3950");
        assert!(sensor.confidence >= 0.8);

        let polling = candidates.iter().find(|c| c.field == "polling_rate");
        assert!(polling.is_some());
    }

    #[test]
    fn regex_template_extracts_polling_rate_with_high_confidence() {
        let engine = FieldRulesEngine::built_in();
        let pack = pack_with(vec![snippet("s1", SnippetType::Prose, "The polling rate reaches 8000Hz over wireless.", "src1", ExtractionMethodSurface::Text)]);

        let candidates = parse(&engine, &pack);
        let c = candidates.iter().find(|c| c.field == "polling_rate" && c.method == specf_utils::types::CandidateMethod::ParseTemplate).unwrap();
        assert_eq!(c.value, "8000");
        assert_eq!(c.confidence, 0.95);
    }

    #[test]
    fn json_ld_structured_metadata_extracts_weight() {
        let engine = FieldRulesEngine::built_in();
        let body = serde_json::json!({"weight": "54g"}).to_string();
        let pack = pack_with(vec![snippet("s1", SnippetType::JsonLdProduct, &body, "src1", ExtractionMethodSurface::JsonLd)]);

        let candidates = parse(&engine, &pack);
        let c = candidates.iter().find(|c| c.field == "weight").unwrap();
        assert_eq!(c.value, "54g");
        assert_eq!(c.confidence, 0.90);
    }

    #[test]
    fn dedupe_collapses_identical_strategy_hits() {
        let candidates = vec![
            Candidate {
                field: "weight".into(),
                value: "54g".into(),
                method: specf_utils::types::CandidateMethod::ParseTemplate,
                key_path: None,
                evidence_refs: vec!["s1".into()],
                snippet_id: Some("s1".into()),
                quote: Some("54g".into()),
                confidence: 0.95,
                source_host: "example.com".into(),
                source_tier: specf_utils::types::Tier(1),
                inferred_from: None,
                constraint_violations: vec![],
                constraint_warnings: vec![],
            },
            Candidate {
                field: "weight".into(),
                value: "54g".into(),
                method: specf_utils::types::CandidateMethod::ParseTemplate,
                key_path: None,
                evidence_refs: vec!["s1".into()],
                snippet_id: Some("s1".into()),
                quote: Some("54g".into()),
                confidence: 0.95,
                source_host: "example.com".into(),
                source_tier: specf_utils::types::Tier(1),
                inferred_from: None,
                constraint_violations: vec![],
                constraint_warnings: vec![],
            },
        ];
        assert_eq!(dedupe(candidates).len(), 1);
    }
}
