//! Component database + fuzzy matcher: cross-lookup component
//! entities (e.g. a named sensor) and infer properties (max DPI, max IPS)
//! onto the product record, gated by a `VariancePolicy` confidence and a
//! set of constraint expressions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::similarity::char_bag_jaccard;

/// How much a component's stated property can be trusted as-is for the
/// specific product it was matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariancePolicy {
    Authoritative,
    UpperBound,
    LowerBound,
    Range,
    OverrideAllowed,
}

impl VariancePolicy {
    /// Base confidence for an inferred candidate under this policy.
    #[must_use]
    pub fn base_confidence(self) -> f64 {
        match self {
            Self::Authoritative => 0.85,
            Self::UpperBound | Self::LowerBound => 0.80,
            Self::Range => 0.75,
            Self::OverrideAllowed => 0.60,
        }
    }
}

/// One entity in a component database (e.g. a sensor model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEntity {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub properties: BTreeMap<String, String>,
    #[serde(default, rename = "variance_policies")]
    pub variance_policies: BTreeMap<String, VariancePolicy>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

/// Result of a fuzzy lookup against a component type.
#[derive(Debug, Clone)]
pub struct ComponentMatch<'a> {
    pub entity: &'a ComponentEntity,
    pub score: f64,
}

/// A flat, index-based catalog of component entities keyed by db type
/// (e.g. `"sensor"`), loaded once per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentDb {
    pub types: BTreeMap<String, Vec<ComponentEntity>>,
}

impl ComponentDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, db_type: impl Into<String>, entity: ComponentEntity) {
        self.types.entry(db_type.into()).or_default().push(entity);
    }

    /// Fuzzy-match `query_value` against every entity of `db_type`,
    /// returning the best match at or above `threshold`.
    #[must_use]
    pub fn fuzzy_match_component(&self, db_type: &str, query_value: &str, threshold: f64) -> Option<ComponentMatch<'_>> {
        let entities = self.types.get(db_type)?;
        let mut best: Option<ComponentMatch<'_>> = None;

        for entity in entities {
            let score = entity_match_score(entity, query_value);
            if score >= threshold && best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(ComponentMatch { entity, score });
            }
        }
        best
    }
}

fn entity_match_score(entity: &ComponentEntity, query: &str) -> f64 {
    let q = query.trim().to_lowercase();
    if entity.name.to_lowercase() == q || entity.aliases.iter().any(|a| a.to_lowercase() == q) {
        return 1.0;
    }
    let mut best = char_bag_jaccard(&entity.name, query);
    for alias in &entity.aliases {
        best = best.max(char_bag_jaccard(alias, query));
    }
    best
}

/// Evaluate one `"property OP number"` constraint expression against a
/// component's properties merged with current product field values.
/// Supported operators: `<= >= == != < >`. Unparseable expressions are
/// treated as non-violated.
#[must_use]
pub fn evaluate_constraint(expr: &str, values: &BTreeMap<String, f64>) -> bool {
    const OPS: &[&str] = &["<=", ">=", "==", "!=", "<", ">"];
    for op in OPS {
        if let Some(idx) = expr.find(op) {
            let lhs = expr[..idx].trim();
            let rhs = expr[idx + op.len()..].trim();
            let Some(&lval) = values.get(lhs) else { return true };
            let Ok(rval) = rhs.parse::<f64>() else { return true };
            return match *op {
                "<=" => lval <= rval,
                ">=" => lval >= rval,
                "==" => (lval - rval).abs() < f64::EPSILON,
                "!=" => (lval - rval).abs() >= f64::EPSILON,
                "<" => lval < rval,
                ">" => lval > rval,
                _ => true,
            };
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_db() -> ComponentDb {
        let mut db = ComponentDb::new();
        let mut properties = BTreeMap::new();
        properties.insert("max_dpi".to_string(), "30000".to_string());
        properties.insert("max_ips".to_string(), "750".to_string());
        let mut variance_policies = BTreeMap::new();
        variance_policies.insert("max_dpi".to_string(), VariancePolicy::Authoritative);
        db.insert(
            "sensor",
            ComponentEntity {
                name: "PAW3950".to_string(),
                aliases: vec!["PixArt PAW3950".to_string()],
                properties,
                variance_policies,
                constraints: vec!["max_dpi<=30000".to_string()],
            },
        );
        db
    }

    #[test]
    fn s3_exact_alias_match_scores_one() {
        let db = sample_db();
        let m = db.fuzzy_match_component("sensor", "PixArt PAW3950", 0.7).unwrap();
        assert_eq!(m.score, 1.0);
        assert_eq!(m.entity.properties.get("max_dpi").unwrap(), "30000");
    }

    #[test]
    fn below_threshold_yields_no_match() {
        let db = sample_db();
        assert!(db.fuzzy_match_component("sensor", "totally unrelated text", 0.7).is_none());
    }

    #[test]
    fn authoritative_policy_has_highest_base_confidence() {
        assert!(VariancePolicy::Authoritative.base_confidence() > VariancePolicy::OverrideAllowed.base_confidence());
    }

    #[test]
    fn constraint_within_bound_holds() {
        let mut values = BTreeMap::new();
        values.insert("max_dpi".to_string(), 30000.0);
        assert!(evaluate_constraint("max_dpi<=30000", &values));
    }

    #[test]
    fn constraint_violation_detected() {
        let mut values = BTreeMap::new();
        values.insert("max_dpi".to_string(), 32000.0);
        assert!(!evaluate_constraint("max_dpi<=30000", &values));
    }
}
