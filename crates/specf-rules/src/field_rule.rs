//! `FieldRule`: everything the deterministic parser, component resolver,
//! and retriever need to know about one output field.

use serde::{Deserialize, Serialize};
use specf_utils::types::ExtraFields;

/// How urgently a field's absence should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredLevel {
    Identity,
    Critical,
    Standard,
    Optional,
}

/// One `(field, template)` regex extraction rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseTemplate {
    pub pattern: String,
    #[serde(default)]
    pub context_keywords: Vec<String>,
    #[serde(default)]
    pub negative_keywords: Vec<String>,
    #[serde(default)]
    pub capture_group: usize,
    #[serde(default)]
    pub normalizer: Option<String>,
}

/// A field's full rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub search_hints: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub required_level: Option<RequiredLevel>,
    #[serde(default)]
    pub source_dependent: bool,
    #[serde(default)]
    pub tier_preference: Vec<u8>,
    #[serde(default)]
    pub parse_templates: Vec<ParseTemplate>,
    #[serde(default)]
    pub json_ld_path: Option<String>,
    #[serde(default)]
    pub component_db_ref: Option<String>,
    #[serde(default)]
    pub component_fuzzy_threshold: Option<f64>,
    #[serde(default)]
    pub enum_values: Vec<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl FieldRule {
    /// All strings a spec-row/anchor matcher should compare a raw key
    /// against: the field name itself plus its synonyms and context
    /// keywords from every parse template.
    #[must_use]
    pub fn token_variants(&self) -> Vec<&str> {
        let mut v = vec![self.field.as_str()];
        v.extend(self.synonyms.iter().map(String::as_str));
        for t in &self.parse_templates {
            v.extend(t.context_keywords.iter().map(String::as_str));
        }
        v
    }

    /// Anchors used by the tier-aware retriever: synonyms, search
    /// hints, and labels.
    #[must_use]
    pub fn anchors(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.synonyms.iter().map(String::as_str).collect();
        v.extend(self.search_hints.iter().map(String::as_str));
        v.extend(self.labels.iter().map(String::as_str));
        v
    }

    #[must_use]
    pub fn fuzzy_threshold(&self) -> f64 {
        self.component_fuzzy_threshold.unwrap_or(0.8)
    }
}
