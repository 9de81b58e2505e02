//! `EvidenceAuditor`: the last gate a candidate crosses before it is
//! allowed to compete in the merger. A candidate that cites evidence that
//! doesn't actually say what it claims is worse than no candidate at all,
//! so failing this check demotes the field to `"unk"` rather than letting
//! a plausible-looking but unsupported value win.

use specf_rules::enum_alias::EnumAliasTable;
use specf_rules::validator::extract_leading_number;
use specf_rules::FieldRulesEngine;
use specf_utils::types::{Candidate, EvidencePack, Provenance, UnknownReason, UNKNOWN_VALUE};

/// Why a candidate failed the audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditFailure {
    SnippetNotFound,
    QuoteNotInSnippet,
    ValueNotInQuote,
}

impl AuditFailure {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SnippetNotFound => "snippet_not_found",
            Self::QuoteNotInSnippet => "quote_not_in_snippet",
            Self::ValueNotInQuote => "value_not_in_quote",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DemotedCandidate {
    pub field: String,
    pub value: String,
    pub reason: AuditFailure,
}

#[derive(Debug, Default)]
pub struct AuditBatchResult {
    pub passed: Vec<Candidate>,
    pub demoted: Vec<DemotedCandidate>,
}

/// Collapse runs of whitespace and lowercase, so quote matching is
/// insensitive to HTML-reflow differences between snippet capture and
/// candidate extraction.
fn normalize_for_match(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Strip thousands separators so `"30,000"` and `"30000"` compare equal.
fn strip_digit_grouping(s: &str) -> String {
    s.chars().filter(|c| *c != ',').collect()
}

pub struct EvidenceAuditor<'a> {
    engine: &'a FieldRulesEngine,
    aliases: &'a EnumAliasTable,
}

impl<'a> EvidenceAuditor<'a> {
    #[must_use]
    pub fn new(engine: &'a FieldRulesEngine, aliases: &'a EnumAliasTable) -> Self {
        Self { engine, aliases }
    }

    /// Run the three-stage check on one candidate.
    pub fn audit_one(&self, pack: &EvidencePack, candidate: &Candidate) -> Result<(), AuditFailure> {
        let Some(snippet_id) = candidate.snippet_id.as_deref() else {
            return Err(AuditFailure::SnippetNotFound);
        };
        let Some(snippet) = pack.find_snippet(snippet_id) else {
            return Err(AuditFailure::SnippetNotFound);
        };

        let Some(quote) = candidate.quote.as_deref() else {
            return Err(AuditFailure::QuoteNotInSnippet);
        };
        let normalized_text = normalize_for_match(&snippet.text);
        let normalized_quote = normalize_for_match(quote);
        if normalized_quote.is_empty() || !normalized_text.contains(&normalized_quote) {
            return Err(AuditFailure::QuoteNotInSnippet);
        }

        if !self.value_supported_by_quote(candidate, &normalized_quote) {
            return Err(AuditFailure::ValueNotInQuote);
        }

        Ok(())
    }

    /// Item 3 only applies when the field rule gives us a shape to check
    /// (enum membership or a numeric unit); free-form fields pass through.
    fn value_supported_by_quote(&self, candidate: &Candidate, normalized_quote: &str) -> bool {
        let Some(rule) = self.engine.rule(&candidate.field) else {
            return true;
        };

        if !rule.enum_values.is_empty() {
            let canonical = self.aliases.canonicalize(&rule.field, &candidate.value).to_lowercase();
            return normalized_quote.contains(&canonical);
        }

        if rule.unit.is_some() {
            if extract_leading_number(&candidate.value).is_none() {
                return true;
            }
            let digits_only_value = strip_digit_grouping(&candidate.value);
            let digits_only_quote = strip_digit_grouping(normalized_quote);
            let Some(n) = extract_leading_number(&digits_only_value) else { return true };
            return digits_only_quote.contains(&format_trimmed(n));
        }

        true
    }

    /// Audit every candidate in a batch, splitting into passed/demoted.
    /// Call again at each aggressive-mode stage with the stage's enlarged
    /// candidate pool; a candidate that failed an earlier stage simply
    /// isn't resubmitted unless new evidence produced a fresh one.
    #[must_use]
    pub fn audit_batch(&self, pack: &EvidencePack, candidates: Vec<Candidate>) -> AuditBatchResult {
        let mut result = AuditBatchResult::default();
        for candidate in candidates {
            match self.audit_one(pack, &candidate) {
                Ok(()) => result.passed.push(candidate),
                Err(reason) => result.demoted.push(DemotedCandidate { field: candidate.field, value: candidate.value, reason }),
            }
        }
        result
    }
}

fn format_trimmed(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// For fields the merger left at `"unk"`, overwrite the reason to
/// `not_supported_by_evidence` when at least one candidate existed but was
/// demoted by the audit, distinguishing "we never found a value" from "we
/// found one we couldn't trust".
pub fn apply_demotions(provenance: &mut std::collections::BTreeMap<String, Provenance>, demoted: &[DemotedCandidate]) {
    let demoted_fields: std::collections::HashSet<&str> = demoted.iter().map(|d| d.field.as_str()).collect();
    for (field, prov) in provenance.iter_mut() {
        if prov.value == UNKNOWN_VALUE && demoted_fields.contains(field.as_str()) {
            prov.unknown_reason = Some(UnknownReason::NotSupportedByEvidence);
        }
    }
}
