//! Orphan reconciliation: an input file is a fabricated-variant
//! job (`is_fabricated_variant(model, variant)`) that duplicates a
//! canonical sibling already on file for the same brand/model. Those
//! jobs were queued by mistake — typically a seed list that appended the
//! model number to itself as a "variant" — and once the real canonical
//! job exists, the fabricated one is dead weight in the queue.
//!
//! Classification:
//! - **canonical** — no variant, or a variant that isn't fabricated.
//! - **orphan** — fabricated variant, and a canonical sibling exists.
//! - **warning** — fabricated variant, but no canonical sibling (kept;
//!   logged so an operator can add the missing canonical job).

use std::collections::BTreeSet;

use specf_storage::Storage;
use specf_utils::slug::{build_product_id, is_fabricated_variant, normalize_identity};
use specf_utils::types::{EventKind, EventLevel, ProductId, ProductJob};

use crate::keys;

/// Result of [`CatalogStore::reconcile_orphans`]. In dry-run mode only
/// `would_delete` is populated; in live mode only `deleted` is.
#[derive(Debug, Clone, Default)]
pub struct OrphanReport {
    pub would_delete: Vec<ProductId>,
    pub deleted: Vec<ProductId>,
    pub warnings: Vec<ProductId>,
}

enum Classification {
    Canonical,
    Orphan,
    Warning,
}

fn classify(job: &ProductJob, canonical_pairs: &BTreeSet<(String, String)>) -> Classification {
    let lock = &job.identity_lock;
    if lock.variant.trim().is_empty() || !is_fabricated_variant(&lock.model, &lock.variant) {
        return Classification::Canonical;
    }
    let key = (lock.brand.to_lowercase(), lock.model.to_lowercase());
    if canonical_pairs.contains(&key) {
        Classification::Orphan
    } else {
        Classification::Warning
    }
}

impl crate::CatalogStore {
    /// Scan every input job in `category`, classify it, and (unless
    /// `dry_run`) delete the orphans' job file, catalog entry, and queue
    /// entry. Returns the typed report either way.
    pub async fn reconcile_orphans(&self, category: &str, dry_run: bool) -> Result<OrphanReport, specf_utils::error::StorageError> {
        let prefix = format!("specs/inputs/{category}/products/");
        let job_keys = self.storage_ref().list(&prefix).await?;

        let mut jobs = Vec::new();
        for key in &job_keys {
            if let Some(content) = self.storage_ref().read(key).await? {
                if let Ok(job) = serde_json::from_str::<ProductJob>(&content) {
                    jobs.push((key.clone(), job));
                }
            }
        }

        let canonical_pairs: BTreeSet<(String, String)> = jobs
            .iter()
            .filter(|(_, job)| job.identity_lock.variant.trim().is_empty() || !is_fabricated_variant(&job.identity_lock.model, &job.identity_lock.variant))
            .map(|(_, job)| (job.identity_lock.brand.to_lowercase(), job.identity_lock.model.to_lowercase()))
            .collect();

        let mut report = OrphanReport::default();

        for (key, job) in &jobs {
            let identity = normalize_identity(category, &job.identity_lock.brand, &job.identity_lock.model, &job.identity_lock.variant);
            let product_id = build_product_id(&identity);

            match classify(job, &canonical_pairs) {
                Classification::Canonical => {}
                Classification::Warning => report.warnings.push(product_id),
                Classification::Orphan => {
                    if dry_run {
                        report.would_delete.push(product_id);
                    } else {
                        self.delete_orphan(category, key, product_id.as_str()).await?;
                        report.deleted.push(product_id);
                    }
                }
            }
        }

        Ok(report)
    }

    async fn delete_orphan(&self, category: &str, job_key: &str, product_id: &str) -> Result<(), specf_utils::error::StorageError> {
        self.storage_ref().delete(job_key).await?;

        if let Ok(mut catalog) = self.load_catalog_pub(category).await {
            if catalog.products.remove(product_id).is_some() {
                let _ = self.save_catalog_pub(category, &catalog).await;
            }
        }

        let queue_key = keys::queue_state_key(category);
        if let Ok(Some(content)) = self.storage_ref().read(&queue_key).await {
            if let Ok(mut value) = serde_json::from_str::<serde_json::Value>(&content) {
                if let Some(obj) = value.as_object_mut() {
                    if obj.remove(product_id).is_some() {
                        let _ = self.storage_ref().write(&queue_key, &serde_json::to_string_pretty(&value).unwrap_or_default()).await;
                    }
                }
            }
        }

        self.events_ref()
            .emit_simple(EventLevel::Info, EventKind::CatalogOrphanReconciled, Some(product_id.to_string()), None, Default::default())
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use specf_events::spawn_event_writer;
    use specf_storage::LocalFsStorage;
    use specf_utils::paths::with_isolated_home;

    use crate::CatalogStore;

    fn store() -> (specf_utils::paths::HomeGuard, CatalogStore) {
        let guard = with_isolated_home();
        let root = specf_utils::paths::workspace_root();
        let storage: Arc<dyn Storage> = Arc::new(LocalFsStorage::new(root.clone()));
        let (events, _handle) = spawn_event_writer(root.join("_runtime").join("events.jsonl"));
        (guard, CatalogStore::new(storage, events, root, "specs/outputs"))
    }

    use specf_storage::Storage;

    #[tokio::test]
    async fn fabricated_variant_with_canonical_sibling_is_an_orphan() {
        let (_guard, store) = store();
        store.add_product("mouse", "Cooler Master", "Cestus 310", "", vec![]).await.unwrap();
        store.add_product("mouse", "Cooler Master", "Cestus 310", "310", vec![]).await.unwrap();

        let dry = store.reconcile_orphans("mouse", true).await.unwrap();
        assert_eq!(dry.would_delete.len(), 1);
        assert!(dry.deleted.is_empty());

        let live = store.reconcile_orphans("mouse", false).await.unwrap();
        assert_eq!(live.deleted.len(), 1);
        assert!(store.get("mouse", live.deleted[0].as_str()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fabricated_variant_without_sibling_is_only_a_warning() {
        let (_guard, store) = store();
        store.add_product("mouse", "Cooler Master", "Cestus 310", "310", vec![]).await.unwrap();

        let report = store.reconcile_orphans("mouse", false).await.unwrap();
        assert!(report.deleted.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert!(store.get("mouse", "mouse-cooler-master-cestus-310").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn real_variant_is_canonical_and_never_touched() {
        let (_guard, store) = store();
        store.add_product("mouse", "Razer", "Viper V3", "Wireless", vec![]).await.unwrap();

        let report = store.reconcile_orphans("mouse", false).await.unwrap();
        assert!(report.deleted.is_empty());
        assert!(report.warnings.is_empty());
    }
}
