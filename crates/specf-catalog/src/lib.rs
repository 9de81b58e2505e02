//! Catalog identity, CRUD, and atomic rename/migration engine. The single entry point is [`CatalogStore`]; [`keys`] exposes
//! the storage-key layout for callers (planner, orchestrator) that need
//! to address a product's artifacts without duplicating path logic.

mod catalog;
pub mod keys;
mod migration;
mod reconcile;

pub use catalog::{AddProductOutcome, CategoryCatalog, CatalogStore, ProductPatch, UpdateProductOutcome};
pub use migration::MigrationResult;
pub use reconcile::OrphanReport;
