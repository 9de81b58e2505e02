//! `FieldRulesEngine` contract: field rules, parse
//! templates, a component database with fuzzy matching, enum alias tables,
//! and a field-value validator.
//!
//! This crate is "external-ish" — a production deployment might
//! source rules from a managed service — but ships a reference in-process
//! implementation (file-backed, loaded once per run) so the pipeline is
//! runnable and testable end-to-end without one.

pub mod component_db;
pub mod engine;
pub mod enum_alias;
pub mod field_rule;
pub mod similarity;
pub mod validator;

pub use component_db::{ComponentDb, ComponentEntity, ComponentMatch, VariancePolicy};
pub use engine::FieldRulesEngine;
pub use enum_alias::EnumAliasTable;
pub use field_rule::{FieldRule, ParseTemplate, RequiredLevel};
pub use validator::{ValidationIssue, Validator};
