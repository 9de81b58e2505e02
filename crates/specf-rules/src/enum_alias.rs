//! Enum alias tables: map free-text spellings ("Wired", "corded") onto one
//! canonical enum value per field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnumAliasTable {
    // field -> (lowercased alias -> canonical value)
    tables: BTreeMap<String, BTreeMap<String, String>>,
}

impl EnumAliasTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_alias(&mut self, field: impl Into<String>, alias: impl Into<String>, canonical: impl Into<String>) {
        self.tables.entry(field.into()).or_default().insert(alias.into().to_lowercase(), canonical.into());
    }

    /// Resolve `raw` to its canonical spelling for `field`, if an alias
    /// exists; otherwise returns `raw` unchanged.
    #[must_use]
    pub fn canonicalize<'a>(&'a self, field: &str, raw: &'a str) -> &'a str {
        self.tables.get(field).and_then(|t| t.get(&raw.to_lowercase())).map(String::as_str).unwrap_or(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_alias_case_insensitively() {
        let mut t = EnumAliasTable::new();
        t.add_alias("connection", "corded", "wired");
        assert_eq!(t.canonicalize("connection", "Corded"), "wired");
    }

    #[test]
    fn unknown_alias_passes_through() {
        let t = EnumAliasTable::new();
        assert_eq!(t.canonicalize("connection", "wireless"), "wireless");
    }
}
