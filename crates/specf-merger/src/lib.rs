//! Candidate scoring and conflict resolution: combine candidate
//! lists from the deterministic parser, component resolver, and LLM
//! extractor into one `Provenance` per field.

use std::collections::BTreeMap;

use specf_rules::field_rule::FieldRule;
use specf_rules::validator::extract_leading_number;
use specf_rules::FieldRulesEngine;
use specf_utils::types::{Agreement, Candidate, CandidateMethod, EvidenceRef, Provenance, UnknownReason, Tier, UNKNOWN_VALUE};

const PASS_TARGET: f64 = 0.6;
const TOLERANCE_CONFIDENCE: f64 = 0.85;
const SOURCE_DEPENDENT_CONFIDENCE: f64 = 0.70;
const CONFLICT_CONFIDENCE: f64 = 0.50;
const CONFLICT_SCORE_GAP: f64 = 0.1;
const TOLERANCE_RATIO: f64 = 0.05;

fn tier_bonus(tier: Tier) -> f64 {
    match tier.0 {
        1 => 0.30,
        2 => 0.28,
        3 => 0.20,
        4 => 0.12,
        5 => 0.10,
        _ => 0.0,
    }
}

fn method_bonus(method: CandidateMethod) -> f64 {
    match method {
        CandidateMethod::SpecTableMatch => 0.30,
        CandidateMethod::ParseTemplate => 0.28,
        CandidateMethod::JsonLd => 0.25,
        CandidateMethod::LlmExtract => 0.20,
        CandidateMethod::ComponentDbInference => 0.15,
        _ => 0.0,
    }
}

/// Score one candidate in `[0, ~1]`.
#[must_use]
pub fn score_candidate(candidate: &Candidate, preferred_hosts: &[String]) -> f64 {
    let host_bonus = if preferred_hosts.iter().any(|h| h.eq_ignore_ascii_case(&candidate.source_host)) { 0.15 } else { 0.0 };
    let evidence_bonus = if candidate.snippet_id.is_some() && candidate.quote.is_some() { 0.15 } else { 0.0 };
    tier_bonus(candidate.source_tier) + method_bonus(candidate.method) + host_bonus + evidence_bonus + 0.10 * candidate.confidence
}

fn to_evidence_ref(c: &Candidate) -> EvidenceRef {
    EvidenceRef { snippet_id: c.snippet_id.clone().unwrap_or_default(), quote: c.quote.clone().unwrap_or_default(), source_host: c.source_host.clone(), source_tier: c.source_tier }
}

/// Merge every field rule's candidates into a provenance map. Extra
/// candidates for fields the engine has no rule for are merged with
/// `source_dependent = false` defaults, so ad-hoc/inferred fields still
/// resolve sensibly.
#[must_use]
pub fn merge(engine: &FieldRulesEngine, candidates: &[Candidate], preferred_hosts: &[String]) -> BTreeMap<String, Provenance> {
    let mut by_field: BTreeMap<String, Vec<&Candidate>> = BTreeMap::new();
    for c in candidates {
        by_field.entry(c.field.clone()).or_default().push(c);
    }

    let mut out = BTreeMap::new();
    for rule in engine.all_rules() {
        let field_candidates = by_field.remove(&rule.field).unwrap_or_default();
        out.insert(rule.field.clone(), merge_field(Some(rule), &field_candidates, preferred_hosts));
    }
    for (field, field_candidates) in by_field {
        out.insert(field, merge_field(None, &field_candidates, preferred_hosts));
    }
    out
}

fn merge_field(rule: Option<&FieldRule>, candidates: &[&Candidate], preferred_hosts: &[String]) -> Provenance {
    if candidates.is_empty() {
        return Provenance {
            value: UNKNOWN_VALUE.to_string(),
            confidence: 0.0,
            meets_pass_target: false,
            agreement: Agreement::Unknown,
            evidence: vec![],
            unknown_reason: Some(UnknownReason::NotFoundAfterSearch),
            flags: vec![],
        };
    }

    let mut scored: Vec<(&Candidate, f64)> = candidates.iter().map(|c| (*c, score_candidate(c, preferred_hosts))).collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let top = scored[0].0;
    let top_score = scored[0].1;
    let runner = scored.get(1).map(|(c, s)| (*c, *s));

    if candidates.iter().all(|c| c.value == top.value) {
        return Provenance {
            value: top.value.clone(),
            confidence: (top_score + 0.1).min(1.0),
            meets_pass_target: (top_score + 0.1).min(1.0) >= PASS_TARGET,
            agreement: Agreement::Unanimous,
            evidence: candidates.iter().map(|c| to_evidence_ref(c)).collect(),
            unknown_reason: None,
            flags: vec![],
        };
    }

    if let Some((runner_candidate, _)) = runner {
        if let (Some(top_num), Some(runner_num)) = (extract_leading_number(&top.value), extract_leading_number(&runner_candidate.value)) {
            if top_num != 0.0 && (top_num - runner_num).abs() <= TOLERANCE_RATIO * top_num.abs() {
                let winner = if runner_candidate.source_tier < top.source_tier { runner_candidate } else { top };
                return Provenance {
                    value: winner.value.clone(),
                    confidence: TOLERANCE_CONFIDENCE,
                    meets_pass_target: TOLERANCE_CONFIDENCE >= PASS_TARGET,
                    agreement: Agreement::WithinTolerance,
                    evidence: vec![to_evidence_ref(top), to_evidence_ref(runner_candidate)],
                    unknown_reason: None,
                    flags: vec![],
                };
            }
        }
    }

    if rule.is_some_and(|r| r.source_dependent) {
        return Provenance {
            value: top.value.clone(),
            confidence: SOURCE_DEPENDENT_CONFIDENCE,
            meets_pass_target: SOURCE_DEPENDENT_CONFIDENCE >= PASS_TARGET,
            agreement: Agreement::SourceDependent,
            evidence: candidates.iter().map(|c| to_evidence_ref(c)).collect(),
            unknown_reason: None,
            flags: vec!["needs_review".to_string()],
        };
    }

    if let Some((_, runner_score)) = runner {
        if top_score - runner_score < CONFLICT_SCORE_GAP {
            return Provenance {
                value: top.value.clone(),
                confidence: CONFLICT_CONFIDENCE,
                meets_pass_target: CONFLICT_CONFIDENCE >= PASS_TARGET,
                agreement: Agreement::Conflict,
                evidence: candidates.iter().map(|c| to_evidence_ref(c)).collect(),
                unknown_reason: None,
                flags: vec!["needs_review".to_string()],
            };
        }
    }

    Provenance {
        value: top.value.clone(),
        confidence: top_score.clamp(0.0, 1.0),
        meets_pass_target: top_score >= PASS_TARGET,
        agreement: Agreement::WinnerClear,
        evidence: vec![to_evidence_ref(top)],
        unknown_reason: None,
        flags: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(field: &str, value: &str, method: CandidateMethod, tier: u8, confidence: f64) -> Candidate {
        Candidate {
            field: field.to_string(),
            value: value.to_string(),
            method,
            key_path: None,
            evidence_refs: vec!["s1".to_string()],
            snippet_id: Some("s1".to_string()),
            quote: Some(value.to_string()),
            confidence,
            source_host: "example.com".to_string(),
            source_tier: Tier(tier),
            inferred_from: None,
            constraint_violations: vec![],
            constraint_warnings: vec![],
        }
    }

    #[test]
    fn empty_candidates_yield_unknown_with_reason() {
        let engine = FieldRulesEngine::built_in();
        let result = merge(&engine, &[], &[]);
        let weight = &result["weight"];
        assert_eq!(weight.value, "unk");
        assert_eq!(weight.unknown_reason, Some(UnknownReason::NotFoundAfterSearch));
        assert_eq!(weight.agreement, Agreement::Unknown);
    }

    #[test]
    fn unanimous_candidates_boost_confidence() {
        let engine = FieldRulesEngine::built_in();
        let candidates = vec![candidate("weight", "54", CandidateMethod::ParseTemplate, 1, 0.9), candidate("weight", "54", CandidateMethod::SpecTableMatch, 2, 0.9)];
        let result = merge(&engine, &candidates, &[]);
        assert_eq!(result["weight"].agreement, Agreement::Unanimous);
        assert_eq!(result["weight"].value, "54");
    }

    #[test]
    fn s4_numeric_within_tolerance_prefers_higher_tier() {
        let engine = FieldRulesEngine::built_in();
        let candidates = vec![candidate("weight", "54", CandidateMethod::ParseTemplate, 1, 0.8), candidate("weight", "55", CandidateMethod::SpecTableMatch, 2, 0.8)];
        let result = merge(&engine, &candidates, &[]);
        let prov = &result["weight"];
        assert_eq!(prov.agreement, Agreement::WithinTolerance);
        assert_eq!(prov.value, "54");
        assert_eq!(prov.confidence, 0.85);
        assert!(!prov.flags.contains(&"needs_review".to_string()));
    }

    #[test]
    fn source_dependent_field_keeps_all_candidates_and_flags_review() {
        let mut engine = FieldRulesEngine::built_in();
        let mut rule = engine.rule("weight").unwrap().clone();
        rule.source_dependent = true;
        engine.add_rule(rule);

        let candidates = vec![candidate("weight", "54", CandidateMethod::ParseTemplate, 1, 0.8), candidate("weight", "1200", CandidateMethod::SpecTableMatch, 3, 0.5)];
        let result = merge(&engine, &candidates, &[]);
        let prov = &result["weight"];
        assert_eq!(prov.agreement, Agreement::SourceDependent);
        assert_eq!(prov.evidence.len(), 2);
        assert!(prov.flags.contains(&"needs_review".to_string()));
    }

    #[test]
    fn close_scores_on_non_numeric_conflicting_values_flag_conflict() {
        let engine = FieldRulesEngine::built_in();
        let candidates = vec![candidate("sensor", "PAW3950", CandidateMethod::SpecTableMatch, 1, 0.9), candidate("sensor", "PMW3389", CandidateMethod::ParseTemplate, 1, 0.9)];
        let result = merge(&engine, &candidates, &[]);
        assert_eq!(result["sensor"].agreement, Agreement::Conflict);
        assert!(result["sensor"].flags.contains(&"needs_review".to_string()));
    }

    #[test]
    fn merger_idempotence_merging_with_empty_extra_list_is_a_no_op() {
        let engine = FieldRulesEngine::built_in();
        let candidates = vec![candidate("weight", "54", CandidateMethod::ParseTemplate, 1, 0.9)];
        let with_empty: Vec<Candidate> = candidates.iter().cloned().chain(std::iter::empty()).collect();
        let a = merge(&engine, &candidates, &[]);
        let b = merge(&engine, &with_empty, &[]);
        assert_eq!(a["weight"].value, b["weight"].value);
        assert_eq!(a["weight"].confidence, b["weight"].confidence);
    }
}
