//! Tier-aware evidence ranking: scores a heterogeneous evidence
//! pool for one field, drops hits that match on nothing, and returns the
//! top-N rows plus miss diagnostics explaining why a field came up short.

use specf_rules::field_rule::{FieldRule, RequiredLevel};
use specf_utils::types::Tier;

pub const DEFAULT_TOP_N: usize = 24;

/// The inferred document kind of the page an evidence row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    ManualPdf,
    SpecPdf,
    Spec,
    Support,
    LabReview,
    Teardown,
    ProductPage,
    Other,
}

impl DocKind {
    fn weight(self) -> f64 {
        match self {
            Self::ManualPdf => 1.5,
            Self::SpecPdf => 1.4,
            Self::Spec => 1.35,
            Self::Support => 1.1,
            Self::LabReview => 0.95,
            Self::Teardown => 0.9,
            Self::ProductPage => 0.75,
            Self::Other => 0.55,
        }
    }
}

/// How the snippet's text was lifted from its document (distinct from
/// `specf_utils::types::ExtractionMethodSurface`, which only models the
/// deterministic parser's own extraction surfaces and lacks the LLM/helper
/// surfaces the retriever's evidence pool can also contain).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMethod {
    Table,
    Kv,
    JsonLd,
    Window,
    Text,
    LlmExtract,
    HelperSupportive,
}

impl RetrievalMethod {
    fn weight(self) -> f64 {
        match self {
            Self::Table => 1.25,
            Self::Kv => 1.15,
            Self::JsonLd => 1.1,
            Self::Window => 0.95,
            Self::Text => 0.9,
            Self::LlmExtract => 0.85,
            Self::HelperSupportive => 0.65,
        }
    }
}

fn base_tier_weight(tier: Tier) -> f64 {
    match tier.0 {
        1 => 3.0,
        2 => 2.0,
        3 => 1.0,
        4 => 0.65,
        5 => 0.4,
        _ => 0.3,
    }
}

/// Re-weight a tier's base score by the field's `tier_preference` ranking:
/// the first preferred tier is boosted ×1.25, decreasing by 0.12 per rank.
fn tier_weight(tier: Tier, preference: &[u8]) -> f64 {
    let base = base_tier_weight(tier);
    match preference.iter().position(|&t| t == tier.0) {
        Some(rank) => base * (1.25 - 0.12 * rank as f64).max(0.5),
        None => base,
    }
}

/// One row of raw evidence considered for a single field's retrieval.
#[derive(Debug, Clone)]
pub struct EvidenceRow {
    pub snippet_id: String,
    pub url: String,
    pub text: String,
    pub source_host: String,
    pub source_tier: Tier,
    pub doc_kind: DocKind,
    pub method: RetrievalMethod,
    pub origin_field: Option<String>,
    pub source_identity_match: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct RankedEvidence {
    pub row: EvidenceRow,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MissDiagnostics {
    pub pool_empty: bool,
    pub no_anchor: bool,
    pub tier_deficit: bool,
    pub identity_mismatch: bool,
    pub min_refs_gap: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub ranked: Vec<RankedEvidence>,
    pub miss_diagnostics: MissDiagnostics,
}

fn anchor_score(rule: &FieldRule, text: &str) -> f64 {
    let lower = text.to_lowercase();
    let matched = rule.anchors().iter().filter(|a| !a.is_empty() && lower.contains(&a.to_lowercase())).count();
    (0.42 * matched as f64).min(1.8)
}

fn identity_score(brand_model_tokens: &[String], text: &str) -> f64 {
    let lower = text.to_lowercase();
    let matched = brand_model_tokens.iter().filter(|t| !t.is_empty() && lower.contains(t.as_str())).count();
    (0.28 * matched as f64).min(1.4)
}

fn unit_score(rule: &FieldRule, text: &str) -> f64 {
    match &rule.unit {
        Some(unit) if !unit.is_empty() && text.to_lowercase().contains(&unit.to_lowercase()) => 0.35,
        _ => 0.0,
    }
}

fn direct_field_score(rule: &FieldRule, row: &EvidenceRow) -> f64 {
    if row.origin_field.as_deref() == Some(rule.field.as_str()) {
        0.65
    } else {
        0.0
    }
}

fn score_row(rule: &FieldRule, row: &EvidenceRow, brand_model_tokens: &[String]) -> Option<f64> {
    let anchor = anchor_score(rule, &row.text);
    let direct = direct_field_score(rule, row);
    let unit = unit_score(rule, &row.text);

    if anchor == 0.0 && direct == 0.0 && unit == 0.0 {
        return None;
    }

    let tier = tier_weight(row.source_tier, &rule.tier_preference);
    let doc_kind = row.doc_kind.weight();
    let method = row.method.weight();
    let identity = identity_score(brand_model_tokens, &row.text);

    Some(2.6 * tier + 1.5 * doc_kind + 0.85 * method + anchor + identity + unit + direct)
}

/// Rank `pool` for `rule`, returning the top `top_n` hits and miss
/// diagnostics. `brand_model_tokens` drives the identity score;
/// `identity_filter_enabled` applies the required-level identity gate.
#[must_use]
pub fn retrieve(rule: &FieldRule, pool: &[EvidenceRow], brand_model_tokens: &[String], top_n: usize, identity_filter_enabled: bool) -> RetrievalResult {
    if pool.is_empty() {
        return RetrievalResult { ranked: Vec::new(), miss_diagnostics: MissDiagnostics { pool_empty: true, ..Default::default() } };
    }

    let identity_gated = matches!(rule.required_level, Some(RequiredLevel::Identity) | Some(RequiredLevel::Critical)) && identity_filter_enabled;

    let mut identity_mismatch = false;
    let mut scored: Vec<RankedEvidence> = pool
        .iter()
        .filter(|row| {
            if identity_gated && row.source_identity_match == Some(false) {
                identity_mismatch = true;
                return false;
            }
            true
        })
        .filter_map(|row| score_row(rule, row, brand_model_tokens).map(|score| RankedEvidence { row: row.clone(), score }))
        .collect();

    let no_anchor = scored.is_empty();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(a.row.source_tier.cmp(&b.row.source_tier)).then(a.row.url.cmp(&b.row.url)));
    scored.truncate(top_n);

    let min_refs = match rule.required_level {
        Some(RequiredLevel::Identity) | Some(RequiredLevel::Critical) => 1,
        _ => 0,
    };
    let min_refs_gap = min_refs.saturating_sub(scored.len() as u32);

    let tier_deficit = !rule.tier_preference.is_empty() && scored.first().is_some_and(|r| r.row.source_tier.0 != rule.tier_preference[0]);

    RetrievalResult {
        ranked: scored,
        miss_diagnostics: MissDiagnostics { pool_empty: false, no_anchor, tier_deficit, identity_mismatch, min_refs_gap },
    }
}
