//! Slug rule, fabricated-variant rule, and product id composition.
//!
//! These are pure functions so the catalog, planner, and CLI can all share
//! one definition of "what counts as the same product".

use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::types::ProductId;

/// A string guaranteed to have already passed through [`slugify`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self(slugify(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hyphen-separated tokens of the slug.
    #[must_use]
    pub fn tokens(&self) -> Vec<&str> {
        self.0.split('-').filter(|t| !t.is_empty()).collect()
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Apply the canonical slug rule:
///
/// NFD normalize, strip combining marks, trim, lowercase, spaces→`-`,
/// drop non `[a-z0-9-_]`, collapse runs of `-`, strip leading/trailing `-`.
#[must_use]
pub fn slugify(raw: &str) -> String {
    let decomposed: String = raw.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let trimmed = decomposed.trim();
    let lowered = trimmed.to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    let mut last_was_dash = false;
    for ch in lowered.chars() {
        let mapped = if ch.is_whitespace() {
            Some('-')
        } else if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            Some(ch)
        } else {
            None
        };

        match mapped {
            Some('-') => {
                if !last_was_dash {
                    out.push('-');
                }
                last_was_dash = true;
            }
            Some(c) => {
                out.push(c);
                last_was_dash = false;
            }
            None => {}
        }
    }

    out.trim_matches('-').to_string()
}

/// A variant is "fabricated" (and should be dropped) iff its slug is a
/// substring of the model slug, or every hyphen-token of the variant slug
/// appears among the model slug's tokens, and the variant slug is
/// non-empty.
#[must_use]
pub fn is_fabricated_variant(model: &str, variant: &str) -> bool {
    let model_slug = slugify(model);
    let variant_slug = slugify(variant);

    if variant_slug.is_empty() {
        return false;
    }

    if model_slug.contains(&variant_slug) {
        return true;
    }

    let model_tokens: Vec<&str> = model_slug.split('-').filter(|t| !t.is_empty()).collect();
    variant_slug
        .split('-')
        .filter(|t| !t.is_empty())
        .all(|tok| model_tokens.contains(&tok))
}

/// Outcome of normalizing a raw identity before building a `ProductId`.
#[derive(Debug, Clone)]
pub struct NormalizedIdentity {
    pub category: Slug,
    pub brand: Slug,
    pub model: Slug,
    pub variant: Option<Slug>,
    pub was_cleaned: bool,
    pub reason: Option<&'static str>,
}

/// Normalize a raw `(category, brand, model, variant)` identity: strip a
/// fabricated variant, if any.
#[must_use]
pub fn normalize_identity(category: &str, brand: &str, model: &str, variant: &str) -> NormalizedIdentity {
    let fabricated = !variant.trim().is_empty() && is_fabricated_variant(model, variant);

    NormalizedIdentity {
        category: Slug::new(category),
        brand: Slug::new(brand),
        model: Slug::new(model),
        variant: if fabricated { None } else {
            let v = Slug::new(variant);
            if v.is_empty() { None } else { Some(v) }
        },
        was_cleaned: fabricated,
        reason: if fabricated { Some("fabricated_variant_stripped") } else { None },
    }
}

/// Build a `ProductId` from a normalized identity.
#[must_use]
pub fn build_product_id(identity: &NormalizedIdentity) -> ProductId {
    ProductId::from_parts(&identity.category, &identity.brand, &identity.model, identity.variant.as_ref())
}
