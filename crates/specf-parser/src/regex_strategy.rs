//! Strategy 1: compiled regex parse templates, case-insensitive,
//! gated on context keywords and free of negative keywords.

use regex::RegexBuilder;
use specf_rules::field_rule::FieldRule;
use specf_utils::types::{Candidate, CandidateMethod, Snippet, Source, Tier};

pub fn extract(rule: &FieldRule, snippet: &Snippet, source: Option<&Source>) -> Vec<Candidate> {
    let mut out = Vec::new();
    let haystack = &snippet.normalized_text;

    for template in &rule.parse_templates {
        if !template.context_keywords.is_empty() && !template.context_keywords.iter().any(|k| haystack.contains(&k.to_lowercase())) {
            continue;
        }
        if template.negative_keywords.iter().any(|k| haystack.contains(&k.to_lowercase())) {
            continue;
        }

        let Ok(re) = RegexBuilder::new(&template.pattern).case_insensitive(true).build() else {
            tracing::warn!(pattern = %template.pattern, field = %rule.field, "invalid parse_template regex, skipping");
            continue;
        };

        let Some(caps) = re.captures(&snippet.text) else { continue };
        let Some(group) = caps.get(template.capture_group) else { continue };
        let value = crate::normalize(group.as_str(), template.normalizer.as_deref());
        if value.is_empty() {
            continue;
        }

        out.push(Candidate {
            field: rule.field.clone(),
            value,
            method: CandidateMethod::ParseTemplate,
            key_path: None,
            evidence_refs: vec![snippet.id.clone()],
            snippet_id: Some(snippet.id.clone()),
            quote: Some(group.as_str().trim().to_string()),
            confidence: 0.95,
            source_host: source.map(|s| s.host.clone()).unwrap_or_default(),
            source_tier: source.map(|s| s.tier).unwrap_or(Tier(5)),
            inferred_from: None,
            constraint_violations: vec![],
            constraint_warnings: vec![],
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use specf_utils::types::{ExtractionMethodSurface, SnippetType};

    use super::*;

    fn rule() -> FieldRule {
        FieldRule {
            field: "polling_rate".to_string(),
            synonyms: vec![],
            search_hints: vec![],
            labels: vec![],
            unit: Some("Hz".to_string()),
            required_level: None,
            source_dependent: false,
            tier_preference: vec![],
            parse_templates: vec![specf_rules::field_rule::ParseTemplate {
                pattern: r"(\d{2,5})\s*hz".to_string(),
                context_keywords: vec!["polling".to_string()],
                negative_keywords: vec![],
                capture_group: 1,
                normalizer: None,
            }],
            json_ld_path: None,
            component_db_ref: None,
            component_fuzzy_threshold: None,
            enum_values: vec![],
            extra: Default::default(),
        }
    }

    fn snippet(text: &str) -> Snippet {
        Snippet {
            id: "s1".to_string(),
            source_id: "src1".to_string(),
            kind: SnippetType::Prose,
            text: text.to_string(),
            normalized_text: text.to_lowercase(),
            url: "https://x.com".to_string(),
            snippet_hash: "h".to_string(),
            extraction_method: ExtractionMethodSurface::Text,
        }
    }

    #[test]
    fn missing_context_keyword_yields_no_candidate() {
        let r = rule();
        let s = snippet("The mouse weighs 8000g on the box.");
        assert!(extract(&r, &s, None).is_empty());
    }

    #[test]
    fn negative_keyword_suppresses_the_match() {
        let mut r = rule();
        r.parse_templates[0].negative_keywords.push("max".to_string());
        let s = snippet("Max polling rate 8000hz (theoretical).");
        assert!(extract(&r, &s, None).is_empty());
    }

    #[test]
    fn match_yields_high_confidence_candidate() {
        let r = rule();
        let s = snippet("polling rate of 8000Hz over wireless");
        let out = extract(&r, &s, None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, "8000");
        assert_eq!(out[0].confidence, 0.95);
    }
}
