//! Field-value validator: does a candidate's raw value even have the right
//! shape for its field (enum membership, numeric-with-unit)? This runs
//! ahead of the merger — a value that fails shape validation is dropped
//! before it ever competes for a field, matching the FieldRulesEngine's
//! "external-ish" contract.

use crate::enum_alias::EnumAliasTable;
use crate::field_rule::FieldRule;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    NotAnEnumMember { field: String, value: String },
    NotNumeric { field: String, value: String },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnEnumMember { field, value } => write!(f, "'{value}' is not a valid value for enum field '{field}'"),
            Self::NotNumeric { field, value } => write!(f, "'{value}' is not numeric for field '{field}'"),
        }
    }
}

pub struct Validator<'a> {
    aliases: &'a EnumAliasTable,
}

impl<'a> Validator<'a> {
    #[must_use]
    pub fn new(aliases: &'a EnumAliasTable) -> Self {
        Self { aliases }
    }

    pub fn validate(&self, rule: &FieldRule, value: &str) -> Result<(), ValidationIssue> {
        if !rule.enum_values.is_empty() {
            let canonical = self.aliases.canonicalize(&rule.field, value);
            let is_member = rule.enum_values.iter().any(|v| v.eq_ignore_ascii_case(canonical));
            if !is_member {
                return Err(ValidationIssue::NotAnEnumMember { field: rule.field.clone(), value: value.to_string() });
            }
        }
        if rule.unit.is_some() && extract_leading_number(value).is_none() {
            return Err(ValidationIssue::NotNumeric { field: rule.field.clone(), value: value.to_string() });
        }
        Ok(())
    }
}

/// Extract the leading numeric portion of a value like `"8000Hz"` or `"54 g"`.
#[must_use]
pub fn extract_leading_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let end = trimmed
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-'))
        .map_or(trimmed.len(), |(i, _)| i);
    if end == 0 {
        None
    } else {
        trimmed[..end].parse::<f64>().ok()
    }
}
