//! `FieldRulesEngine`: the reference in-process implementation of the
//! "external-ish" rules contract. Loaded once per run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::component_db::{ComponentDb, ComponentMatch};
use crate::enum_alias::EnumAliasTable;
use crate::field_rule::FieldRule;

/// Legacy mapping from a component property name to the output field it
/// should populate, for properties that are not themselves rule keys.
/// Includes `sensor_year -> sensor_date`, since component databases
/// commonly expose a release year under that name.
#[must_use]
pub fn built_in_property_field_map() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("max_dpi", "dpi"),
        ("max_ips", "ips"),
        ("max_acceleration", "acceleration"),
        ("sensor_year", "sensor_date"),
    ])
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldRulesEngine {
    rules: BTreeMap<String, FieldRule>,
    pub component_db: ComponentDb,
    pub enum_aliases: EnumAliasTable,
    property_field_map: BTreeMap<String, String>,
}

impl FieldRulesEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: BTreeMap::new(),
            component_db: ComponentDb::new(),
            enum_aliases: EnumAliasTable::new(),
            property_field_map: built_in_property_field_map().into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    pub fn add_rule(&mut self, rule: FieldRule) {
        self.rules.insert(rule.field.clone(), rule);
    }

    #[must_use]
    pub fn rule(&self, field: &str) -> Option<&FieldRule> {
        self.rules.get(field)
    }

    #[must_use]
    pub fn all_rules(&self) -> impl Iterator<Item = &FieldRule> {
        self.rules.values()
    }

    /// Fuzzy-match a candidate value against the component DB for a field
    /// whose rule declares `component_db_ref`.
    #[must_use]
    pub fn fuzzy_match_component(&self, field: &str, query_value: &str) -> Option<ComponentMatch<'_>> {
        let rule = self.rules.get(field)?;
        let db_type = rule.component_db_ref.as_deref()?;
        self.component_db.fuzzy_match_component(db_type, query_value, rule.fuzzy_threshold())
    }

    /// Resolve which output field a component property should populate.
    /// Property names that are themselves rule keys win; otherwise falls
    /// back to the legacy map. Returns `None` for unmapped properties —
    /// the component resolver must never emit a candidate for those.
    #[must_use]
    pub fn map_component_property(&self, property: &str) -> Option<String> {
        if self.rules.contains_key(property) {
            return Some(property.to_string());
        }
        self.property_field_map.get(property).cloned()
    }

    /// A reference rule set covering the fields named in the specification's
    /// concrete scenarios, for end-to-end testing without an external
    /// rules source.
    #[must_use]
    pub fn built_in() -> Self {
        let mut engine = Self::new();

        engine.add_rule(FieldRule {
            field: "sensor".to_string(),
            synonyms: vec!["sensor model".to_string(), "optical sensor".to_string()],
            search_hints: vec!["sensor".to_string()],
            labels: vec!["Sensor".to_string()],
            unit: None,
            required_level: Some(crate::field_rule::RequiredLevel::Critical),
            source_dependent: false,
            tier_preference: vec![1, 2],
            parse_templates: vec![],
            json_ld_path: None,
            component_db_ref: Some("sensor".to_string()),
            component_fuzzy_threshold: Some(0.7),
            enum_values: vec![],
            extra: Default::default(),
        });

        engine.add_rule(FieldRule {
            field: "polling_rate".to_string(),
            synonyms: vec!["polling rate".to_string(), "report rate".to_string()],
            search_hints: vec!["polling rate".to_string(), "hz".to_string()],
            labels: vec!["Polling Rate".to_string()],
            unit: Some("Hz".to_string()),
            required_level: Some(crate::field_rule::RequiredLevel::Standard),
            source_dependent: false,
            tier_preference: vec![1, 2],
            parse_templates: vec![crate::field_rule::ParseTemplate {
                pattern: r"(\d{2,5})\s*hz".to_string(),
                context_keywords: vec!["polling".to_string(), "report rate".to_string()],
                negative_keywords: vec![],
                capture_group: 1,
                normalizer: None,
            }],
            json_ld_path: None,
            component_db_ref: None,
            component_fuzzy_threshold: None,
            enum_values: vec![],
            extra: Default::default(),
        });

        for (field, unit, label) in [("dpi", "dpi", "Max DPI"), ("ips", "ips", "Max IPS")] {
            engine.add_rule(FieldRule {
                field: field.to_string(),
                synonyms: vec![],
                search_hints: vec![label.to_string()],
                labels: vec![label.to_string()],
                unit: Some(unit.to_string()),
                required_level: Some(crate::field_rule::RequiredLevel::Standard),
                source_dependent: false,
                tier_preference: vec![1],
                parse_templates: vec![],
                json_ld_path: None,
                component_db_ref: None,
                component_fuzzy_threshold: None,
                enum_values: vec![],
                extra: Default::default(),
            });
        }

        engine.add_rule(FieldRule {
            field: "weight".to_string(),
            synonyms: vec!["mass".to_string()],
            search_hints: vec!["weight".to_string(), "grams".to_string()],
            labels: vec!["Weight".to_string()],
            unit: Some("g".to_string()),
            required_level: Some(crate::field_rule::RequiredLevel::Standard),
            source_dependent: false,
            tier_preference: vec![1, 2, 3],
            parse_templates: vec![crate::field_rule::ParseTemplate {
                pattern: r"(\d{1,4})\s*g\b".to_string(),
                context_keywords: vec!["weight".to_string()],
                negative_keywords: vec![],
                capture_group: 1,
                normalizer: None,
            }],
            json_ld_path: None,
            component_db_ref: None,
            component_fuzzy_threshold: None,
            enum_values: vec![],
            extra: Default::default(),
        });

        let mut sensor_properties = BTreeMap::new();
        sensor_properties.insert("max_dpi".to_string(), "30000".to_string());
        sensor_properties.insert("max_ips".to_string(), "750".to_string());
        let mut variance_policies = BTreeMap::new();
        variance_policies.insert("max_dpi".to_string(), crate::component_db::VariancePolicy::Authoritative);
        engine.component_db.insert(
            "sensor",
            crate::component_db::ComponentEntity {
                name: "PAW3950".to_string(),
                aliases: vec!["PixArt PAW3950".to_string()],
                properties: sensor_properties,
                variance_policies,
                constraints: vec!["max_dpi<=30000".to_string()],
            },
        );

        engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_engine_has_s3_scenario_fields() {
        let engine = FieldRulesEngine::built_in();
        assert!(engine.rule("sensor").is_some());
        assert!(engine.rule("polling_rate").is_some());
        assert_eq!(engine.rule("sensor").unwrap().component_db_ref.as_deref(), Some("sensor"));
    }

    #[test]
    fn unmapped_property_returns_none() {
        let engine = FieldRulesEngine::built_in();
        assert_eq!(engine.map_component_property("totally_unknown_property"), None);
    }

    #[test]
    fn property_that_is_itself_a_rule_key_maps_to_itself() {
        let engine = FieldRulesEngine::built_in();
        assert_eq!(engine.map_component_property("weight"), Some("weight".to_string()));
    }

    #[test]
    fn legacy_map_includes_sensor_year_to_sensor_date() {
        let map = built_in_property_field_map();
        assert_eq!(map.get("sensor_year"), Some(&"sensor_date"));
    }
}
