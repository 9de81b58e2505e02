//! Library-level error type with exit-code mapping.
//!
//! `SpecFactoryError` is the error type returned at crate boundaries
//! (catalog, planner, storage, CLI). Most
//! per-source/per-candidate failures (fetch, parse, LLM, audit) are
//! *recoverable* and never reach this type — they are logged and the
//! pipeline continues. Only input errors, migration-fatal conditions, and
//! misconfiguration propagate here.

use thiserror::Error;

use crate::exit_codes::ExitCode;

/// Top-level error type for spec-factory library operations.
#[derive(Error, Debug)]
pub enum SpecFactoryError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("lock error: {0}")]
    Lock(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpecFactoryError {
    /// Map to a CLI process exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Catalog(CatalogError::ProductAlreadyExists { .. })
            | Self::Catalog(CatalogError::ProductNotFound { .. })
            | Self::Catalog(CatalogError::BrandInUse { .. })
            | Self::Catalog(CatalogError::SlugRequired)
            | Self::Config(_) => ExitCode::CLI_ARGS,
            Self::Lock(_) => ExitCode::LOCK_HELD,
            Self::Catalog(CatalogError::MigrationPartialFailure { .. }) => ExitCode::MIGRATION_PARTIAL,
            _ => ExitCode::INTERNAL,
        }
    }
}

/// Catalog & identity errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("category is required")]
    CategoryRequired,

    #[error("brand is required")]
    BrandRequired,

    #[error("product '{product_id}' was not found")]
    ProductNotFound { product_id: String },

    #[error("product '{product_id}' already exists")]
    ProductAlreadyExists { product_id: String },

    #[error("slug is required")]
    SlugRequired,

    #[error("brand '{brand}' is already in use")]
    BrandInUse { brand: String },

    #[error(
        "migration from '{old_slug}' to '{new_slug}' partially failed: {failed_count} key(s) could not be migrated"
    )]
    MigrationPartialFailure {
        old_slug: String,
        new_slug: String,
        failed_count: usize,
    },
}

/// Source planner errors.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("host '{0}' is denied")]
    HostDenied(String),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("missing required configuration: {0}")]
    MissingRequired(String),

    #[error("invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("configuration file not found at {path}")]
    NotFound { path: String },
}

/// Storage capability errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("backend error: {0}")]
    Backend(String),
}
