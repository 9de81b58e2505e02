//! Component cross-lookup and property inference: given the
//! candidates already extracted for a product, fuzzy-match component-typed
//! fields (e.g. `sensor`) against a `ComponentDb` entity and infer the
//! entity's other properties onto the record, gated by a variance-policy
//! confidence and the entity's declared constraints.

use std::collections::BTreeMap;

use specf_rules::component_db::ComponentMatch;
use specf_rules::validator::extract_leading_number;
use specf_rules::FieldRulesEngine;
use specf_utils::types::{Candidate, CandidateMethod, InferredFrom};

/// Rank candidates so the "best" one for a component-ref field is picked
/// as the fuzzy-match query: `spec_table_match` >
/// `parse_template` > `json_ld` > everything else.
fn method_rank(method: CandidateMethod) -> u8 {
    match method {
        CandidateMethod::SpecTableMatch => 0,
        CandidateMethod::ParseTemplate => 1,
        CandidateMethod::JsonLd => 2,
        _ => 3,
    }
}

fn best_candidate_for<'a>(candidates: &'a [Candidate], field: &str) -> Option<&'a Candidate> {
    candidates.iter().filter(|c| c.field == field).min_by_key(|c| method_rank(c.method))
}

/// Infer additional candidates from component-database cross-lookups.
/// Returns only the newly inferred candidates; callers append these to
/// the existing candidate set before merging.
#[must_use]
pub fn resolve(engine: &FieldRulesEngine, candidates: &[Candidate]) -> Vec<Candidate> {
    let mut inferred = Vec::new();

    for rule in engine.all_rules() {
        let Some(_db_ref) = rule.component_db_ref.as_deref() else { continue };
        let Some(trigger) = best_candidate_for(candidates, &rule.field) else { continue };
        let Some(component_match) = engine.fuzzy_match_component(&rule.field, &trigger.value) else { continue };

        let mut emitted_this_match: Vec<usize> = Vec::new();
        let scale = 0.85 + 0.15 * component_match.score;

        for (property, raw_value) in &component_match.entity.properties {
            let Some(target_field) = engine.map_component_property(property) else { continue };
            if best_candidate_for(candidates, &target_field).is_some() {
                continue;
            }

            let policy = component_match.entity.variance_policies.get(property).copied().unwrap_or(specf_rules::component_db::VariancePolicy::OverrideAllowed);
            let confidence = (policy.base_confidence() * scale).clamp(0.0, 1.0);

            inferred.push(Candidate {
                field: target_field,
                value: raw_value.clone(),
                method: CandidateMethod::ComponentDbInference,
                key_path: Some(property.clone()),
                evidence_refs: trigger.evidence_refs.clone(),
                snippet_id: trigger.snippet_id.clone(),
                quote: trigger.quote.clone(),
                confidence,
                source_host: trigger.source_host.clone(),
                source_tier: trigger.source_tier,
                inferred_from: Some(InferredFrom { field: rule.field.clone(), value: trigger.value.clone() }),
                constraint_violations: vec![],
                constraint_warnings: vec![],
            });
            emitted_this_match.push(inferred.len() - 1);
        }

        apply_constraints(&component_match, candidates, &mut inferred, &emitted_this_match, engine);
    }

    inferred
}

/// Evaluate the matched entity's constraints against its own properties
/// merged with any already-known product values, and penalize the
/// inferred candidates from this match when they disagree.
fn apply_constraints(component_match: &ComponentMatch<'_>, existing: &[Candidate], inferred: &mut [Candidate], emitted_indices: &[usize], engine: &FieldRulesEngine) {
    let mut values: BTreeMap<String, f64> = BTreeMap::new();
    for (property, raw) in &component_match.entity.properties {
        if let Some(n) = extract_leading_number(raw) {
            values.insert(property.clone(), n);
        }
    }
    for property in component_match.entity.properties.keys() {
        if let Some(target_field) = engine.map_component_property(property) {
            if let Some(current) = best_candidate_for(existing, &target_field) {
                if let Some(n) = extract_leading_number(&current.value) {
                    values.insert(property.clone(), n);
                }
            }
        }
    }

    for constraint in &component_match.entity.constraints {
        if specf_rules::component_db::evaluate_constraint(constraint, &values) {
            continue;
        }

        let violated_property = constraint.split(|c: char| "<>=!".contains(c)).next().unwrap_or("").trim();
        let violated_field = engine.map_component_property(violated_property);

        let mut applied_to_specific_field = false;
        for &idx in emitted_indices {
            let candidate = &mut inferred[idx];
            if Some(&candidate.field) == violated_field.as_ref() {
                candidate.confidence = (candidate.confidence * 0.5).max(0.1);
                candidate.constraint_violations.push(constraint.clone());
                applied_to_specific_field = true;
            }
        }

        if !applied_to_specific_field {
            for &idx in emitted_indices {
                let candidate = &mut inferred[idx];
                candidate.confidence = (candidate.confidence * 0.85).max(0.3);
                candidate.constraint_warnings.push(constraint.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use specf_utils::types::Tier;

    use super::*;

    fn sensor_candidate() -> Candidate {
        Candidate {
            field: "sensor".to_string(),
            value: "PixArt PAW3950".to_string(),
            method: CandidateMethod::SpecTableMatch,
            key_path: None,
            evidence_refs: vec!["s1".to_string()],
            snippet_id: Some("s1".to_string()),
            quote: Some("sensor: PixArt PAW3950".to_string()),
            confidence: 0.95,
            source_host: "example.com".to_string(),
            source_tier: Tier(1),
            inferred_from: None,
            constraint_violations: vec![],
            constraint_warnings: vec![],
        }
    }

    #[test]
    fn s3_infers_dpi_and_ips_from_matched_sensor() {
        let engine = FieldRulesEngine::built_in();
        let candidates = vec![sensor_candidate()];
        let inferred = resolve(&engine, &candidates);

        let dpi = inferred.iter().find(|c| c.field == "dpi").unwrap();
        assert_eq!(dpi.value, "30000");
        assert!((dpi.confidence - 0.85).abs() < 0.05);

        let ips = inferred.iter().find(|c| c.field == "ips").unwrap();
        assert_eq!(ips.value, "750");
    }

    #[test]
    fn already_filled_field_is_not_overwritten() {
        let engine = FieldRulesEngine::built_in();
        let mut candidates = vec![sensor_candidate()];
        candidates.push(Candidate {
            field: "dpi".to_string(),
            value: "16000".to_string(),
            method: CandidateMethod::ParseTemplate,
            key_path: None,
            evidence_refs: vec![],
            snippet_id: None,
            quote: None,
            confidence: 0.9,
            source_host: "example.com".to_string(),
            source_tier: Tier(1),
            inferred_from: None,
            constraint_violations: vec![],
            constraint_warnings: vec![],
        });

        let inferred = resolve(&engine, &candidates);
        assert!(inferred.iter().all(|c| c.field != "dpi"));
    }

    #[test]
    fn unmapped_property_never_emits_a_candidate() {
        let mut engine = FieldRulesEngine::built_in();
        engine.component_db.types.get_mut("sensor").unwrap()[0].properties.insert("totally_unmapped_property".to_string(), "123".to_string());
        let candidates = vec![sensor_candidate()];
        let inferred = resolve(&engine, &candidates);
        assert!(inferred.iter().all(|c| c.key_path.as_deref() != Some("totally_unmapped_property")));
    }

    #[test]
    fn no_match_below_threshold_infers_nothing() {
        let engine = FieldRulesEngine::built_in();
        let mut candidate = sensor_candidate();
        candidate.value = "completely unrelated text".to_string();
        let inferred = resolve(&engine, &[candidate]);
        assert!(inferred.is_empty());
    }
}
