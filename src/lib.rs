//! spec-factory - a 24/7 pipeline that discovers, fetches, and extracts
//! typed, evidence-backed product specification records with per-field
//! provenance and confidence.
//!
//! This crate is a thin facade over the workspace's `specf-*` crates: the
//! catalog/identity engine, source planner, extraction cascade, merger,
//! evidence auditor, and orchestrator each live in their own crate so they
//! can be tested and versioned independently. `spec_factory::run_cli`
//! wires them together for the binary in `src/main.rs`.

pub use specf_cli::{run_cli, Cli, Command, TestModeAction};
pub use specf_config::Config;
pub use specf_orchestrator::{run_daemon, run_product, RunContext};
pub use specf_utils::error::SpecFactoryError;
pub use specf_utils::exit_codes::ExitCode;
pub use specf_utils::types::NormalizedRecord;
