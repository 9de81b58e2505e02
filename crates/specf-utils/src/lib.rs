//! Foundation types, errors, and observability shared across spec-factory crates.
//!
//! This crate has no knowledge of HTTP, LLMs, or storage backends — it only
//! defines the data model (`types`), the library-level error enum (`error`),
//! deterministic JSON canonicalization (`canonicalization`), atomic file
//! writes (`atomic_write`), slug/identity rules (`slug`), path resolution
//! (`paths`), tracing setup (`logging`), and CLI exit codes (`exit_codes`).

pub mod atomic_write;
pub mod canonicalization;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod paths;
pub mod slug;
pub mod types;

pub use error::SpecFactoryError;
