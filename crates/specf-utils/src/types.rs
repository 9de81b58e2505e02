//! Core data model for the spec factory pipeline.
//!
//! These types are the core nouns of the pipeline: product
//! identity, catalog entries, sources, evidence, candidates, provenance,
//! and the normalized record a run ultimately produces. Unknown/extra
//! fields on wire types are carried in an `extra` sidecar map rather than
//! dropped, so a round trip through storage never silently loses data.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::slug::Slug;

/// Opaque bag for fields a struct doesn't model explicitly.
pub type ExtraFields = BTreeMap<String, Value>;

/// Canonical product identifier: `category-brand-model[-variant]`.
///
/// Constructed only via [`crate::slug::build_product_id`], which applies
/// the slug rule and the fabricated-variant rule before composing the id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    #[must_use]
    pub fn from_parts(category: &Slug, brand: &Slug, model: &Slug, variant: Option<&Slug>) -> Self {
        let mut s = format!("{category}-{brand}-{model}");
        if let Some(v) = variant {
            s.push('-');
            s.push_str(v.as_str());
        }
        Self(s)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable 8-hex-character token that survives renames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Generate a fresh identifier from a CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let s: String = (0..8)
            .map(|_| {
                let n: u8 = rng.gen_range(0..16);
                std::char::from_digit(u32::from(n), 16).unwrap()
            })
            .collect();
        Self(s)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity-locking fields carried on a product job; used to disambiguate
/// candidates from near-duplicate products during extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityLock {
    pub id: Option<u64>,
    pub identifier: Option<Identifier>,
    pub brand: String,
    pub model: String,
    #[serde(default)]
    pub variant: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub mpn: Option<String>,
    #[serde(default)]
    pub gtin: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// The unit of work handed to the orchestrator: a single product to extract
/// a specification record for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductJob {
    pub product_id: ProductId,
    pub category: String,
    pub identity_lock: IdentityLock,
    #[serde(default)]
    pub seed_urls: Vec<String>,
    #[serde(default)]
    pub preferred_sources: Vec<String>,
    #[serde(default)]
    pub anchors: ExtraFields,
}

/// A product's entry in the catalog: identity plus bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u64,
    pub identifier: Identifier,
    pub brand: String,
    pub model: String,
    #[serde(default)]
    pub variant: String,
    pub status: CatalogStatus,
    #[serde(default)]
    pub seed_urls: Vec<String>,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub rename_history: Vec<RenameLogEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogStatus {
    Active,
    Paused,
    Archived,
}

/// One entry in a rename/migration log (product- or brand-scoped).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameLogEntry {
    pub identifier: Identifier,
    pub old_slug: String,
    pub new_slug: String,
    pub migrated_count: usize,
    pub failed_count: usize,
    pub renamed_at: DateTime<Utc>,
}

/// Authority tier of a source, 1 (manufacturer) through 5 (aggregator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tier(pub u8);

impl Tier {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self.0 {
            1 => "manufacturer",
            2 => "lab",
            3 => "retailer",
            4 => "community",
            5 => "aggregator",
            _ => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    Manufacturer,
    Review,
    Retailer,
    Database,
    Other,
}

/// A single discovered/fetched web source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub source_id: String,
    pub url: String,
    pub host: String,
    pub root_domain: String,
    pub tier: Tier,
    pub role: SourceRole,
    pub approved_domain: bool,
    pub candidate_source: bool,
    #[serde(default)]
    pub discovered_from: Option<String>,
    pub priority_score: f64,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Surface a snippet was lifted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnippetType {
    SpecTableRow,
    JsonLdProduct,
    MicrodataProduct,
    OpengraphProduct,
    MicroformatProduct,
    RdfaProduct,
    TwitterCardProduct,
    Prose,
}

/// How a snippet was pulled out of a `SourceResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethodSurface {
    Table,
    Kv,
    JsonLd,
    Window,
    Text,
}

/// One piece of evidence: a snippet of text plus where it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    pub id: String,
    pub source_id: String,
    #[serde(rename = "type")]
    pub kind: SnippetType,
    pub text: String,
    pub normalized_text: String,
    pub url: String,
    pub snippet_hash: String,
    pub extraction_method: ExtractionMethodSurface,
}

/// The snippets and source metadata fetched for one `SourceResult`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidencePack {
    pub snippets: Vec<Snippet>,
    pub references: Vec<String>,
    pub source_meta: BTreeMap<String, Source>,
}

impl EvidencePack {
    #[must_use]
    pub fn find_snippet(&self, id: &str) -> Option<&Snippet> {
        self.snippets.iter().find(|s| s.id == id)
    }
}

/// How a candidate value was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateMethod {
    ParseTemplate,
    SpecTableMatch,
    JsonLd,
    Microdata,
    Opengraph,
    ComponentDbInference,
    LlmExtract,
    HelperSupportive,
}

/// A proposed value for one field, produced by one extraction strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub field: String,
    pub value: String,
    pub method: CandidateMethod,
    #[serde(default)]
    pub key_path: Option<String>,
    #[serde(default)]
    pub evidence_refs: Vec<String>,
    #[serde(default)]
    pub snippet_id: Option<String>,
    #[serde(default)]
    pub quote: Option<String>,
    pub confidence: f64,
    pub source_host: String,
    pub source_tier: Tier,
    #[serde(default)]
    pub inferred_from: Option<InferredFrom>,
    #[serde(default)]
    pub constraint_violations: Vec<String>,
    #[serde(default)]
    pub constraint_warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferredFrom {
    pub field: String,
    pub value: String,
}

/// How the merger resolved multiple candidates for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agreement {
    Unanimous,
    WithinTolerance,
    SourceDependent,
    Conflict,
    WinnerClear,
    Unknown,
}

/// One unit of evidence backing a field's value in the final record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub snippet_id: String,
    pub quote: String,
    pub source_host: String,
    pub source_tier: Tier,
}

/// Per-field provenance: the value, how confident we are, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub value: String,
    pub confidence: f64,
    pub meets_pass_target: bool,
    pub agreement: Agreement,
    #[serde(default)]
    pub evidence: Vec<EvidenceRef>,
    #[serde(default)]
    pub unknown_reason: Option<UnknownReason>,
    #[serde(default)]
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownReason {
    NotFoundAfterSearch,
    NotSupportedByEvidence,
}

/// UI color derived from a field's confidence and pass target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLight {
    Green,
    Yellow,
    Red,
    Gray,
}

impl TrafficLight {
    #[must_use]
    pub fn from_confidence(confidence: f64, is_unknown: bool) -> Self {
        if is_unknown {
            return Self::Gray;
        }
        if confidence >= 0.85 {
            Self::Green
        } else if confidence >= 0.6 {
            Self::Yellow
        } else {
            Self::Red
        }
    }
}

/// The literal sentinel value for a known-unknown field.
pub const UNKNOWN_VALUE: &str = "unk";

/// The final, typed, evidence-backed specification record for one product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub product_id: ProductId,
    pub identity: IdentityLock,
    pub fields: BTreeMap<String, String>,
    pub provenance: BTreeMap<String, Provenance>,
    pub traffic_lights: BTreeMap<String, TrafficLight>,
    #[serde(default)]
    pub flags: Vec<String>,
    pub run_id: String,
}

/// Kinds of runtime events appended to `_runtime/events.jsonl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CatalogProductAdded,
    CatalogProductRenamed,
    CatalogMigrationPartialFailure,
    CatalogOrphanReconciled,
    PlannerEnqueued,
    PlannerRejected,
    PlannerBlockedHost,
    SourceProcessed,
    LlmBatchCompleted,
    LlmBatchFailed,
    AuditDemotion,
    RunStarted,
    RunCompleted,
    RunCancelled,
}

/// One append-only NDJSON runtime event record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeEvent {
    pub ts: DateTime<Utc>,
    pub level: EventLevel,
    pub event: EventKind,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(flatten)]
    pub kv: ExtraFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}
