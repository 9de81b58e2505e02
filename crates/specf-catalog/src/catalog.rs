//! Catalog CRUD: the single source of truth for which products
//! exist, keyed by category. Each category's catalog is one JSON document
//! (`CategoryCatalog`) at [`crate::keys::catalog_key`]; reads and
//! read-modify-write upserts are serialized by the per-category lock in
//! `specf-lock`, so concurrent writers to the same category's catalog
//! document never race.

use std::collections::BTreeMap;
use std::sync::Arc;

use camino::Utf8PathBuf;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use specf_events::EventSink;
use specf_storage::Storage;
use specf_utils::error::{CatalogError, StorageError};
use specf_utils::slug::{build_product_id, normalize_identity};
use specf_utils::types::{CatalogEntry, CatalogStatus, EventKind, EventLevel, Identifier, ProductJob};

use crate::keys;

/// One category's full set of catalog entries, keyed by `productId`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryCatalog {
    #[serde(default)]
    pub products: BTreeMap<String, CatalogEntry>,
}

/// Edits `updateProduct` may apply; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub variant: Option<String>,
    pub status: Option<CatalogStatus>,
    pub seed_urls: Option<Vec<String>>,
}

/// Result of [`CatalogStore::add_product`].
#[derive(Debug, Clone)]
pub struct AddProductOutcome {
    pub product_id: String,
    pub identifier: Identifier,
    pub id: u64,
    pub was_cleaned: bool,
    pub reason: Option<&'static str>,
}

/// Result of [`CatalogStore::update_product`].
#[derive(Debug, Clone)]
pub struct UpdateProductOutcome {
    pub product_id: String,
    pub renamed: bool,
    pub migration: Option<crate::migration::MigrationResult>,
}

/// The catalog capability: CRUD over `CategoryCatalog` documents plus
/// (on rename) the atomic artifact migration protocol.
pub struct CatalogStore {
    storage: Arc<dyn Storage>,
    events: EventSink,
    lock_root: Utf8PathBuf,
    output_prefix: String,
}

impl CatalogStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, events: EventSink, lock_root: Utf8PathBuf, output_prefix: impl Into<String>) -> Self {
        Self { storage, events, lock_root, output_prefix: output_prefix.into() }
    }

    pub(crate) fn storage_ref(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub(crate) fn events_ref(&self) -> &EventSink {
        &self.events
    }

    pub(crate) async fn load_catalog_pub(&self, category: &str) -> Result<CategoryCatalog, CatalogError> {
        self.load_catalog(category).await
    }

    pub(crate) async fn save_catalog_pub(&self, category: &str, catalog: &CategoryCatalog) -> Result<(), StorageError> {
        self.save_catalog(category, catalog).await
    }

    async fn load_catalog(&self, category: &str) -> Result<CategoryCatalog, CatalogError> {
        match self.storage.read(&keys::catalog_key(category)).await {
            Ok(Some(content)) => Ok(serde_json::from_str(&content).unwrap_or_default()),
            Ok(None) => Ok(CategoryCatalog::default()),
            Err(_) => Ok(CategoryCatalog::default()),
        }
    }

    async fn save_catalog(&self, category: &str, catalog: &CategoryCatalog) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(catalog).unwrap_or_default();
        self.storage.write(&keys::catalog_key(category), &json).await
    }

    /// Best-effort per-category serialization. A held lock from
    /// another process is logged and otherwise ignored rather than
    /// failing the operation — the underlying storage write is still
    /// last-writer-wins safe for this process's own concurrent callers,
    /// which all share one `CatalogStore` and therefore one `Storage`.
    fn try_lock_category(&self, category: &str) -> Option<specf_lock::LockGuard> {
        match specf_lock::acquire_category_lock(&self.lock_root, category) {
            Ok(guard) => Some(guard),
            Err(e) => {
                tracing::warn!(category, error = %e, "proceeding without exclusive category lock");
                None
            }
        }
    }

    fn next_id(catalog: &CategoryCatalog) -> u64 {
        let used: std::collections::BTreeSet<u64> = catalog.products.values().map(|e| e.id).collect();
        let mut candidate = 1u64;
        while used.contains(&candidate) {
            candidate += 1;
        }
        candidate
    }

    /// `addProduct`: normalize identity, allocate id/identifier,
    /// write the product job file, and upsert the catalog + queue entry.
    pub async fn add_product(
        &self,
        category: &str,
        brand: &str,
        model: &str,
        variant: &str,
        seed_urls: Vec<String>,
    ) -> Result<AddProductOutcome, CatalogError> {
        if category.trim().is_empty() {
            return Err(CatalogError::CategoryRequired);
        }
        if brand.trim().is_empty() {
            return Err(CatalogError::BrandRequired);
        }

        let identity = normalize_identity(category, brand, model, variant);
        let product_id = build_product_id(&identity);

        let _category_lock = self.try_lock_category(category);
        let mut catalog = self.load_catalog(category).await?;

        if catalog.products.contains_key(product_id.as_str()) {
            return Err(CatalogError::ProductAlreadyExists { product_id: product_id.as_str().to_string() });
        }

        let id = Self::next_id(&catalog);
        let identifier = Identifier::generate();

        let entry = CatalogEntry {
            id,
            identifier: identifier.clone(),
            brand: identity.brand.as_str().to_string(),
            model: identity.model.as_str().to_string(),
            variant: identity.variant.as_ref().map(|v| v.as_str().to_string()).unwrap_or_default(),
            status: CatalogStatus::Active,
            seed_urls: seed_urls.clone(),
            added_at: Utc::now(),
            rename_history: Vec::new(),
        };
        catalog.products.insert(product_id.as_str().to_string(), entry);

        let job = ProductJob {
            product_id: product_id.clone(),
            category: category.to_string(),
            identity_lock: specf_utils::types::IdentityLock {
                id: Some(id),
                identifier: Some(identifier.clone()),
                brand: identity.brand.as_str().to_string(),
                model: identity.model.as_str().to_string(),
                variant: identity.variant.as_ref().map(|v| v.as_str().to_string()).unwrap_or_default(),
                sku: None,
                mpn: None,
                gtin: None,
                extra: Default::default(),
            },
            seed_urls,
            preferred_sources: vec![],
            anchors: Default::default(),
        };
        let job_json = serde_json::to_string_pretty(&job).map_err(|_| CatalogError::SlugRequired)?;
        self.storage.write(&keys::product_job_key(category, product_id.as_str()), &job_json).await.map_err(|_| CatalogError::SlugRequired)?;

        self.save_catalog(category, &catalog).await.map_err(|_| CatalogError::SlugRequired)?;
        self.upsert_queue_entry(category, product_id.as_str()).await.map_err(|_| CatalogError::SlugRequired)?;

        self.events
            .emit_simple(
                EventLevel::Info,
                EventKind::CatalogProductAdded,
                Some(product_id.as_str().to_string()),
                None,
                Default::default(),
            )
            .await;

        Ok(AddProductOutcome { product_id: product_id.as_str().to_string(), identifier, id, was_cleaned: identity.was_cleaned, reason: identity.reason })
    }

    /// `updateProduct`: apply field edits; if the slug changes,
    /// run the atomic rename/migration protocol.
    pub async fn update_product(&self, category: &str, product_id: &str, patch: ProductPatch) -> Result<UpdateProductOutcome, CatalogError> {
        let _category_lock = self.try_lock_category(category);
        let mut catalog = self.load_catalog(category).await?;
        let existing = catalog.products.get(product_id).cloned().ok_or_else(|| CatalogError::ProductNotFound { product_id: product_id.to_string() })?;

        let new_brand = patch.brand.unwrap_or_else(|| existing.brand.clone());
        let new_model = patch.model.unwrap_or_else(|| existing.model.clone());
        let new_variant = patch.variant.unwrap_or_else(|| existing.variant.clone());
        let identity = normalize_identity(category, &new_brand, &new_model, &new_variant);
        let new_product_id = build_product_id(&identity);

        if new_product_id.as_str() == product_id {
            let mut entry = existing;
            entry.brand = identity.brand.as_str().to_string();
            entry.model = identity.model.as_str().to_string();
            entry.variant = identity.variant.as_ref().map(|v| v.as_str().to_string()).unwrap_or_default();
            if let Some(status) = patch.status {
                entry.status = status;
            }
            if let Some(seed_urls) = patch.seed_urls {
                entry.seed_urls = seed_urls;
            }
            catalog.products.insert(product_id.to_string(), entry);
            self.save_catalog(category, &catalog).await.map_err(|_| CatalogError::ProductNotFound { product_id: product_id.to_string() })?;
            return Ok(UpdateProductOutcome { product_id: product_id.to_string(), renamed: false, migration: None });
        }

        if catalog.products.contains_key(new_product_id.as_str()) {
            return Err(CatalogError::ProductAlreadyExists { product_id: new_product_id.as_str().to_string() });
        }

        let migration = crate::migration::migrate_product(self.storage.as_ref(), category, product_id, new_product_id.as_str(), &self.output_prefix).await;

        let mut entry = existing;
        entry.brand = identity.brand.as_str().to_string();
        entry.model = identity.model.as_str().to_string();
        entry.variant = identity.variant.as_ref().map(|v| v.as_str().to_string()).unwrap_or_default();
        if let Some(status) = patch.status {
            entry.status = status;
        }
        if let Some(seed_urls) = patch.seed_urls {
            entry.seed_urls = seed_urls;
        }
        entry.rename_history.push(specf_utils::types::RenameLogEntry {
            identifier: entry.identifier.clone(),
            old_slug: product_id.to_string(),
            new_slug: new_product_id.as_str().to_string(),
            migrated_count: migration.migrated_count,
            failed_count: migration.failed_count,
            renamed_at: Utc::now(),
        });

        catalog.products.remove(product_id);
        catalog.products.insert(new_product_id.as_str().to_string(), entry.clone());
        self.save_catalog(category, &catalog).await.map_err(|_| CatalogError::ProductNotFound { product_id: product_id.to_string() })?;

        crate::migration::append_rename_log(self.storage.as_ref(), category, &entry.rename_history[entry.rename_history.len() - 1]).await;

        let level = if migration.ok() { EventLevel::Info } else { EventLevel::Warn };
        let kind = if migration.ok() { EventKind::CatalogProductRenamed } else { EventKind::CatalogMigrationPartialFailure };
        self.events.emit_simple(level, kind, Some(new_product_id.as_str().to_string()), None, Default::default()).await;

        if !migration.ok() {
            return Err(CatalogError::MigrationPartialFailure {
                old_slug: product_id.to_string(),
                new_slug: new_product_id.as_str().to_string(),
                failed_count: migration.failed_count,
            });
        }

        Ok(UpdateProductOutcome { product_id: new_product_id.as_str().to_string(), renamed: true, migration: Some(migration) })
    }

    pub async fn get(&self, category: &str, product_id: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        let catalog = self.load_catalog(category).await?;
        Ok(catalog.products.get(product_id).cloned())
    }

    pub async fn list(&self, category: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
        let catalog = self.load_catalog(category).await?;
        Ok(catalog.products.into_values().collect())
    }

    async fn upsert_queue_entry(&self, category: &str, product_id: &str) -> Result<(), StorageError> {
        let key = keys::queue_state_key(category);
        let mut state: serde_json::Value = match self.storage.read(&key).await? {
            Some(content) => serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({})),
            None => serde_json::json!({}),
        };
        if !state.is_object() {
            state = serde_json::json!({});
        }
        state.as_object_mut().expect("coerced to object above").insert(product_id.to_string(), serde_json::json!({ "productId": product_id, "status": "queued" }));
        self.storage.write(&key, &serde_json::to_string_pretty(&state).unwrap_or_default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specf_events::spawn_event_writer;
    use specf_storage::LocalFsStorage;
    use specf_utils::paths::with_isolated_home;

    fn store() -> (specf_utils::paths::HomeGuard, CatalogStore) {
        let guard = with_isolated_home();
        let root = specf_utils::paths::workspace_root();
        let storage: Arc<dyn Storage> = Arc::new(LocalFsStorage::new(root.clone()));
        let (events, _handle) = spawn_event_writer(root.join("_runtime").join("events.jsonl"));
        (guard, CatalogStore::new(storage, events, root, "specs/outputs"))
    }

    #[tokio::test]
    async fn s1_fabricated_variant_is_stripped_on_add() {
        let (_guard, store) = store();
        let outcome = store.add_product("mouse", "Cooler Master", "Cestus 310", "310", vec![]).await.unwrap();
        assert!(outcome.was_cleaned);
        assert_eq!(outcome.reason, Some("fabricated_variant_stripped"));
        assert_eq!(outcome.product_id, "mouse-cooler-master-cestus-310");
    }

    #[tokio::test]
    async fn duplicate_add_fails() {
        let (_guard, store) = store();
        store.add_product("mouse", "Acme", "X1", "", vec![]).await.unwrap();
        let err = store.add_product("mouse", "Acme", "X1", "", vec![]).await.unwrap_err();
        assert!(matches!(err, CatalogError::ProductAlreadyExists { .. }));
    }

    #[tokio::test]
    async fn ids_are_smallest_unused_positive_integer() {
        let (_guard, store) = store();
        let a = store.add_product("mouse", "Acme", "X1", "", vec![]).await.unwrap();
        let b = store.add_product("mouse", "Acme", "X2", "", vec![]).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn same_slug_update_does_not_trigger_migration() {
        let (_guard, store) = store();
        store.add_product("mouse", "Acme", "X1", "", vec![]).await.unwrap();
        let outcome = store.update_product("mouse", "mouse-acme-x1", ProductPatch { status: Some(CatalogStatus::Paused), ..Default::default() }).await.unwrap();
        assert!(!outcome.renamed);
        let entry = store.get("mouse", "mouse-acme-x1").await.unwrap().unwrap();
        assert_eq!(entry.status, CatalogStatus::Paused);
    }

    #[tokio::test]
    async fn s2_rename_migrates_artifacts_and_preserves_identifier() {
        let (_guard, store) = store();
        let added = store.add_product("mouse", "Razer", "Viper V3", "Pro", vec![]).await.unwrap();
        assert_eq!(added.product_id, "mouse-razer-viper-v3-pro");

        store
            .storage()
            .write(
                "specs/outputs/mouse/mouse-razer-viper-v3-pro/latest/normalized.json",
                r#"{"product_id":"mouse-razer-viper-v3-pro","fields":{}}"#,
            )
            .await
            .unwrap();

        let outcome = store.update_product("mouse", "mouse-razer-viper-v3-pro", ProductPatch { model: Some("Viper V3 Pro SE".to_string()), ..Default::default() }).await.unwrap();
        assert!(outcome.renamed);
        assert_eq!(outcome.product_id, "mouse-razer-viper-v3-pro-se");

        assert!(store.storage().read("specs/outputs/mouse/mouse-razer-viper-v3-pro/latest/normalized.json").await.unwrap().is_none());
        let migrated = store.storage().read("specs/outputs/mouse/mouse-razer-viper-v3-pro-se/latest/normalized.json").await.unwrap().unwrap();
        assert!(migrated.contains("mouse-razer-viper-v3-pro-se"));

        let entry = store.get("mouse", "mouse-razer-viper-v3-pro-se").await.unwrap().unwrap();
        assert_eq!(entry.identifier, added.identifier);
        assert_eq!(entry.rename_history.len(), 1);
    }

    impl CatalogStore {
        fn storage(&self) -> &dyn Storage {
            self.storage.as_ref()
        }
    }
}
