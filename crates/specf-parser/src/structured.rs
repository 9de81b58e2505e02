//! Strategy 3: structured metadata snippets (JSON-LD, microdata,
//! OpenGraph, microformats, RDFa, Twitter cards) parsed as JSON and
//! looked up by field name, its no-underscore spelling,
//! `additionalProperty.<field>`, or the template-declared `json_ld_path`.

use serde_json::Value;
use specf_rules::field_rule::FieldRule;
use specf_utils::types::{Candidate, CandidateMethod, Snippet, Source, SnippetType, Tier};

pub fn extract(rule: &FieldRule, snippet: &Snippet, source: Option<&Source>) -> Option<Candidate> {
    let method = method_for(snippet.kind)?;
    let root: Value = serde_json::from_str(&snippet.text).ok()?;

    let mut candidates_paths = vec![rule.field.clone(), rule.field.replace('_', "")];
    candidates_paths.push(format!("additionalProperty.{}", rule.field));
    if let Some(path) = &rule.json_ld_path {
        candidates_paths.push(path.clone());
    }

    for path in &candidates_paths {
        if let Some(value) = lookup(&root, path) {
            return Some(Candidate {
                field: rule.field.clone(),
                value,
                method,
                key_path: Some(path.clone()),
                evidence_refs: vec![snippet.id.clone()],
                snippet_id: Some(snippet.id.clone()),
                quote: Some(snippet.text.clone()),
                confidence: 0.90,
                source_host: source.map(|s| s.host.clone()).unwrap_or_default(),
                source_tier: source.map(|s| s.tier).unwrap_or(Tier(5)),
                inferred_from: None,
                constraint_violations: vec![],
                constraint_warnings: vec![],
            });
        }
    }

    None
}

/// Candidate method "mirrors the snippet surface"; the typed
/// `CandidateMethod` enum only distinguishes json_ld/microdata/opengraph,
/// so microformats and RDFa fold into microdata and Twitter cards fold
/// into opengraph (closest structural analogue).
fn method_for(kind: SnippetType) -> Option<CandidateMethod> {
    match kind {
        SnippetType::JsonLdProduct => Some(CandidateMethod::JsonLd),
        SnippetType::MicrodataProduct | SnippetType::MicroformatProduct | SnippetType::RdfaProduct => Some(CandidateMethod::Microdata),
        SnippetType::OpengraphProduct | SnippetType::TwitterCardProduct => Some(CandidateMethod::Opengraph),
        SnippetType::SpecTableRow | SnippetType::Prose => None,
    }
}

fn lookup(root: &Value, dotted_path: &str) -> Option<String> {
    let mut current = root;
    for segment in dotted_path.split('.') {
        current = current.get(segment)?;
    }
    value_to_string(current)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
