//! Easy/hard field routing: cheap fields that are pure lookups or
//! enum classification go to the fast model; fields that require
//! disambiguating conflicting sources or interpreting prose go to the
//! reasoning model. A batch containing any hard field is routed whole to
//! the reasoning model — splitting one batch across two models would
//! break the single-prompt-per-batch invariant the cache key relies on.

use specf_rules::FieldRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDifficulty {
    Easy,
    Hard,
}

/// Classify a field rule's difficulty from the same signals the field
/// rules engine already carries: enum membership is a closed-form lookup
/// (easy); anything the rule marks `source_dependent` means the model may
/// need to weigh conflicting sources (hard).
#[must_use]
pub fn classify(rule: &FieldRule) -> FieldDifficulty {
    if rule.source_dependent {
        return FieldDifficulty::Hard;
    }
    if !rule.enum_values.is_empty() {
        return FieldDifficulty::Easy;
    }
    if rule.component_db_ref.is_some() {
        return FieldDifficulty::Hard;
    }
    FieldDifficulty::Easy
}

/// Whether a batch of fields should route to the reasoning model: true if
/// any field in the batch is hard.
#[must_use]
pub fn batch_needs_reasoning_model(rules: &[&FieldRule]) -> bool {
    rules.iter().any(|r| classify(r) == FieldDifficulty::Hard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use specf_rules::RequiredLevel;
    use specf_utils::types::ExtraFields;

    fn rule(source_dependent: bool, enum_values: Vec<&str>, component_db_ref: Option<&str>) -> FieldRule {
        FieldRule {
            field: "f".to_string(),
            synonyms: vec![],
            search_hints: vec![],
            labels: vec![],
            unit: None,
            required_level: Some(RequiredLevel::Standard),
            source_dependent,
            tier_preference: vec![],
            parse_templates: vec![],
            json_ld_path: None,
            component_db_ref: component_db_ref.map(str::to_string),
            component_fuzzy_threshold: None,
            enum_values: enum_values.into_iter().map(str::to_string).collect(),
            extra: ExtraFields::new(),
        }
    }

    #[test]
    fn source_dependent_field_is_hard() {
        assert_eq!(classify(&rule(true, vec![], None)), FieldDifficulty::Hard);
    }

    #[test]
    fn enum_field_is_easy() {
        assert_eq!(classify(&rule(false, vec!["wired", "wireless"], None)), FieldDifficulty::Easy);
    }

    #[test]
    fn component_inferred_field_is_hard() {
        assert_eq!(classify(&rule(false, vec![], Some("sensor"))), FieldDifficulty::Hard);
    }

    #[test]
    fn batch_routes_to_reasoning_if_any_field_is_hard() {
        let easy = rule(false, vec!["a"], None);
        let hard = rule(true, vec![], None);
        assert!(batch_needs_reasoning_model(&[&easy, &hard]));
        assert!(!batch_needs_reasoning_model(&[&easy]));
    }
}
