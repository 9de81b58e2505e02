//! `test-mode`'s fixture store: a URL-keyed map of canned page bodies
//! persisted through the same [`Storage`] backend as everything else, so
//! fixtures survive between `generate` and `run` without a database of
//! their own.

use std::collections::BTreeMap;
use std::sync::Arc;

use specf_orchestrator::fetch::FetchedPage;
use specf_storage::Storage;
use specf_utils::types::{ProductJob, SourceRole, Tier};

fn fixtures_key(category: &str, product_id: &str) -> String {
    format!("_test_fixtures/{category}/{product_id}/pages.json")
}

pub struct FixtureStore {
    storage: Arc<dyn Storage>,
}

impl FixtureStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn load(&self, category: &str, product_id: &str) -> anyhow::Result<BTreeMap<String, FetchedPage>> {
        match self.storage.read(&fixtures_key(category, product_id)).await? {
            Some(content) => Ok(serde_json::from_str(&content)?),
            None => Ok(BTreeMap::new()),
        }
    }

    pub async fn save(&self, category: &str, product_id: &str, pages: &BTreeMap<String, FetchedPage>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(pages)?;
        self.storage.write(&fixtures_key(category, product_id), &json).await?;
        Ok(())
    }

    /// Delete every fixture file under a category's prefix; returns how many were removed.
    pub async fn wipe_category(&self, category: &str) -> anyhow::Result<usize> {
        let prefix = format!("_test_fixtures/{category}/");
        let keys = self.storage.list(&prefix).await?;
        for key in &keys {
            self.storage.delete(key).await?;
        }
        Ok(keys.len())
    }
}

/// Synthesize one canned `key: value` page per seed URL, templated from
/// the job's brand/model. Clearly synthetic; meant only to exercise the
/// pipeline end to end without a network or LLM.
#[must_use]
pub fn generate_fixtures(job: &ProductJob) -> BTreeMap<String, FetchedPage> {
    let lock = &job.identity_lock;
    let body = format!("brand: {} | model: {} | weight: 70 g | sensor: Synthetic Optical X1 | polling rate: 1000Hz", lock.brand, lock.model);

    job.seed_urls
        .iter()
        .cloned()
        .map(|url| (url, FetchedPage { body: body.clone(), tier: Tier(1), role: SourceRole::Manufacturer }))
        .collect()
}

/// Seed URLs with no corresponding fixture entry.
#[must_use]
pub fn validate_fixtures(job: &ProductJob, pages: &BTreeMap<String, FetchedPage>) -> Vec<String> {
    job.seed_urls.iter().filter(|url| !pages.contains_key(url.as_str())).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use specf_storage::LocalFsStorage;
    use specf_utils::paths::with_isolated_home;
    use specf_utils::types::IdentityLock;

    fn job() -> ProductJob {
        ProductJob {
            product_id: specf_utils::types::ProductId::from_parts(&specf_utils::slug::Slug::new("mouse"), &specf_utils::slug::Slug::new("acme"), &specf_utils::slug::Slug::new("x1"), None),
            category: "mouse".to_string(),
            identity_lock: IdentityLock { id: None, identifier: None, brand: "Acme".to_string(), model: "X1".to_string(), variant: String::new(), sku: None, mpn: None, gtin: None, extra: Default::default() },
            seed_urls: vec!["https://acme.example/x1".to_string()],
            preferred_sources: vec![],
            anchors: Default::default(),
        }
    }

    #[test]
    fn generate_fixtures_covers_every_seed_url() {
        let job = job();
        let pages = generate_fixtures(&job);
        assert_eq!(validate_fixtures(&job, &pages), Vec::<String>::new());
    }

    #[test]
    fn validate_reports_missing_fixture() {
        let job = job();
        assert_eq!(validate_fixtures(&job, &BTreeMap::new()), vec!["https://acme.example/x1".to_string()]);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let _guard = with_isolated_home();
        let root = specf_utils::paths::workspace_root();
        let storage: Arc<dyn Storage> = Arc::new(LocalFsStorage::new(root));
        let store = FixtureStore::new(storage);
        let job = job();
        let pages = generate_fixtures(&job);

        store.save(&job.category, job.product_id.as_str(), &pages).await.unwrap();
        let loaded = store.load(&job.category, job.product_id.as_str()).await.unwrap();
        assert_eq!(loaded.len(), pages.len());
    }

    #[tokio::test]
    async fn wipe_category_removes_saved_fixtures() {
        let _guard = with_isolated_home();
        let root = specf_utils::paths::workspace_root();
        let storage: Arc<dyn Storage> = Arc::new(LocalFsStorage::new(root));
        let store = FixtureStore::new(storage);
        let job = job();
        let pages = generate_fixtures(&job);
        store.save(&job.category, job.product_id.as_str(), &pages).await.unwrap();

        let removed = store.wipe_category(&job.category).await.unwrap();
        assert_eq!(removed, 1);
        let loaded = store.load(&job.category, job.product_id.as_str()).await.unwrap();
        assert!(loaded.is_empty());
    }
}
