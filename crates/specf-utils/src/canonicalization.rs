//! Deterministic JSON canonicalization and content hashing.
//!
//! Every artifact the pipeline writes (catalog entries, normalized records,
//! evidence packs, runtime events) is JSON, so canonicalization here means
//! one thing: JCS (RFC 8785). There is no YAML or Markdown normalization in
//! this crate's domain.

use anyhow::{Context, Result};
use blake3::Hasher;
use serde::Serialize;

/// Emit a value as JCS-canonical JSON (RFC 8785).
///
/// This is the standard way to emit JSON for catalog entries, normalized
/// records, and runtime events. JCS ensures deterministic output regardless
/// of field ordering in the source struct, which matters both for stable
/// diffs on disk and for content-addressed hashing.
///
/// # Example
///
/// ```rust,no_run
/// use specf_utils::canonicalization::emit_jcs;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct MyOutput {
///     name: String,
///     value: i32,
/// }
///
/// let output = MyOutput { name: "test".into(), value: 42 };
/// let json = emit_jcs(&output).expect("serialization should succeed");
/// println!("{}", json);
/// ```
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}

pub const CANON_VERSION: &str = "jcs-rfc8785-v1";
pub const CANONICALIZATION_BACKEND: &str = "jcs-rfc8785";

/// Deterministic canonicalization and content hashing for JSON values.
///
/// Used to build the LLM extraction cache key (hash of prompt template
/// version + evidence pack + schema) and to compute stable identity hashes
/// for catalog reconciliation.
pub struct Canonicalizer {
    version: String,
}

impl Canonicalizer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: CANON_VERSION.to_string(),
        }
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub const fn backend(&self) -> &'static str {
        CANONICALIZATION_BACKEND
    }

    /// Compute the BLAKE3 hash of the JCS-canonical form of `value`.
    pub fn hash_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let canonical = emit_jcs(value)?;
        Ok(blake3_hex(canonical.as_bytes()))
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Hex-encoded BLAKE3 hash of raw bytes, used for the LLM content-addressed
/// cache key and for evidence-pack fingerprints.
#[must_use]
pub fn blake3_hex(bytes: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        b: i32,
        a: i32,
    }

    #[test]
    fn jcs_emission_is_stable_regardless_of_struct_field_order() {
        let json = emit_jcs(&Sample { b: 2, a: 1 }).unwrap();
        assert_eq!(json, r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn hash_json_is_deterministic() {
        let canon = Canonicalizer::new();
        let h1 = canon.hash_json(&Sample { b: 2, a: 1 }).unwrap();
        let h2 = canon.hash_json(&Sample { a: 1, b: 2 }).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn blake3_hex_is_64_chars() {
        assert_eq!(blake3_hex(b"hello").len(), 64);
    }
}
