//! Hierarchical configuration for `spec-factory`: CLI > file > env > defaults.
//!
//! `runProfile` (`fast`/`standard`/`thorough`) selects a bundle of defaults
//! for planner budgets, LLM call/budget guards, and aggressive-mode bounds
//!; anything explicit in a `spec-factory.toml`, `SPEC_FACTORY_*`
//! environment variable, or CLI flag overrides the preset field by field.

mod config;

pub use config::*;
