//! Content-addressed cache for LLM extraction calls. The
//! cache key is `blake3(prompt || evidence_hash || model)` so an identical
//! batch re-sent against the same evidence and model is never re-billed.
//! Eviction is lazy: expired entries are dropped on read, not by a
//! background sweep.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use specf_utils::canonicalization::blake3_hex;

use crate::types::StructuredResult;

pub const DEFAULT_TTL_DAYS: i64 = 7;

struct Entry {
    result: StructuredResult,
    inserted_at: DateTime<Utc>,
}

/// In-process LLM response cache, keyed by content hash.
///
/// A production deployment might back this with a shared store so the
/// cache survives across runs; this reference implementation is
/// per-process, matching the in-memory stores the rest of this crate's
/// sibling crates use for their own reference implementations.
pub struct LlmCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl LlmCache {
    #[must_use]
    pub fn new(ttl_days: i64) -> Self {
        Self { ttl: Duration::days(ttl_days), entries: Mutex::new(HashMap::new()) }
    }

    /// Compute the cache key for a `(prompt, evidence_hash, model)` triple.
    #[must_use]
    pub fn key(prompt: &str, evidence_hash: &str, model: &str) -> String {
        let mut buf = String::with_capacity(prompt.len() + evidence_hash.len() + model.len() + 2);
        buf.push_str(prompt);
        buf.push('\0');
        buf.push_str(evidence_hash);
        buf.push('\0');
        buf.push_str(model);
        blake3_hex(buf.as_bytes())
    }

    /// Look up `key`, dropping it if it has expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<StructuredResult> {
        let mut entries = self.entries.lock().expect("llm cache mutex poisoned");
        let Some(entry) = entries.get(key) else { return None };
        if Utc::now() - entry.inserted_at > self.ttl {
            entries.remove(key);
            return None;
        }
        Some(entry.result.clone())
    }

    pub fn put(&self, key: String, result: StructuredResult) {
        let mut entries = self.entries.lock().expect("llm cache mutex poisoned");
        entries.insert(key, Entry { result, inserted_at: Utc::now() });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("llm cache mutex poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LlmCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_DAYS)
    }
}
