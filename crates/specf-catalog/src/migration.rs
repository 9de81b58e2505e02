//! Atomic artifact migration on rename.
//!
//! For every known artifact prefix: list the old keys, copy each to its
//! new-slug counterpart (rewriting an embedded `productId`/`product_id`
//! field when the payload is JSON), and only delete the old key once the
//! new one has been written successfully. A crash between copy and delete
//! leaves both keys present; re-running migration is idempotent because it
//! only ever lists what's still under the old prefix.

use specf_storage::Storage;
use specf_utils::types::RenameLogEntry;

use crate::keys;

/// Outcome of migrating one product's artifacts from an old slug to a new one.
#[derive(Debug, Clone, Default)]
pub struct MigrationResult {
    pub migrated_count: usize,
    pub failed_count: usize,
    pub failures: Vec<String>,
}

impl MigrationResult {
    #[must_use]
    pub fn ok(&self) -> bool {
        self.failed_count == 0
    }
}

/// Migrate every artifact owned by `old_pid` to `new_pid`: copy each key to
/// its new-slug counterpart and only delete the old one once the new one is
/// written. Never returns an error itself — per-key failures are collected into the
/// result so the caller can report `ok=false` without losing what did migrate.
pub async fn migrate_product(storage: &dyn Storage, category: &str, old_pid: &str, new_pid: &str, output_prefix: &str) -> MigrationResult {
    let mut result = MigrationResult::default();

    let review_old = keys::review_prefix(category, old_pid);
    let review_new = keys::review_prefix(category, new_pid);
    migrate_prefix(storage, &review_old, &review_new, old_pid, new_pid, &mut result).await;

    let final_old = keys::final_prefix(category, old_pid);
    let final_new = keys::final_prefix(category, new_pid);
    migrate_prefix_excluding(storage, &final_old, &final_new, &review_old, old_pid, new_pid, &mut result).await;

    let latest_old = keys::latest_prefix(output_prefix, category, old_pid);
    let latest_new = keys::latest_prefix(output_prefix, category, new_pid);
    migrate_prefix(storage, &latest_old, &latest_new, old_pid, new_pid, &mut result).await;

    let runs_old = keys::runs_prefix(output_prefix, category, old_pid);
    let runs_new = keys::runs_prefix(output_prefix, category, new_pid);
    migrate_prefix(storage, &runs_old, &runs_new, old_pid, new_pid, &mut result).await;

    let published_old = keys::published_prefix(category, old_pid);
    let published_new = keys::published_prefix(category, new_pid);
    migrate_prefix(storage, &published_old, &published_new, old_pid, new_pid, &mut result).await;

    migrate_single_key(storage, &keys::overrides_key(category, old_pid), &keys::overrides_key(category, new_pid), old_pid, new_pid, &mut result).await;

    migrate_queue_entry(storage, category, old_pid, new_pid, &mut result).await;

    result
}

async fn migrate_prefix(storage: &dyn Storage, old_prefix: &str, new_prefix: &str, old_pid: &str, new_pid: &str, result: &mut MigrationResult) {
    migrate_prefix_excluding(storage, old_prefix, new_prefix, "\u{0}unreachable\u{0}", old_pid, new_pid, result).await;
}

/// Like [`migrate_prefix`] but skips any old key under `exclude_prefix`
/// (used so migrating the `final/` prefix doesn't re-copy the `review/`
/// subtree already migrated separately).
async fn migrate_prefix_excluding(
    storage: &dyn Storage,
    old_prefix: &str,
    new_prefix: &str,
    exclude_prefix: &str,
    old_pid: &str,
    new_pid: &str,
    result: &mut MigrationResult,
) {
    let keys = match storage.list(old_prefix).await {
        Ok(k) => k,
        Err(e) => {
            result.failures.push(format!("list {old_prefix}: {e}"));
            result.failed_count += 1;
            return;
        }
    };

    for old_key in keys {
        if old_key.starts_with(exclude_prefix) {
            continue;
        }
        let Some(suffix) = old_key.strip_prefix(old_prefix) else { continue };
        let new_key = format!("{new_prefix}{suffix}");
        migrate_single_key(storage, &old_key, &new_key, old_pid, new_pid, result).await;
    }
}

async fn migrate_single_key(storage: &dyn Storage, old_key: &str, new_key: &str, old_pid: &str, new_pid: &str, result: &mut MigrationResult) {
    let content = match storage.read(old_key).await {
        Ok(Some(c)) => c,
        Ok(None) => return,
        Err(e) => {
            result.failures.push(format!("read {old_key}: {e}"));
            result.failed_count += 1;
            return;
        }
    };

    let rewritten = rewrite_product_id(&content, old_pid, new_pid);

    if let Err(e) = storage.write(new_key, &rewritten).await {
        result.failures.push(format!("write {new_key}: {e}"));
        result.failed_count += 1;
        return;
    }

    if let Err(e) = storage.delete(old_key).await {
        result.failures.push(format!("delete {old_key}: {e}"));
        result.failed_count += 1;
        return;
    }

    result.migrated_count += 1;
}

/// If `content` parses as a JSON object containing `productId` or
/// `product_id` equal to `old_pid`, rewrite it to `new_pid`. Any other
/// embedded references (URLs, free text) are left untouched.
fn rewrite_product_id(content: &str, old_pid: &str, new_pid: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<serde_json::Value>(content) else {
        return content.to_string();
    };
    let Some(obj) = value.as_object_mut() else {
        return content.to_string();
    };

    let mut changed = false;
    for key in ["productId", "product_id"] {
        if let Some(v) = obj.get(key) {
            if v.as_str() == Some(old_pid) {
                obj.insert(key.to_string(), serde_json::Value::String(new_pid.to_string()));
                changed = true;
            }
        }
    }

    if changed {
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| content.to_string())
    } else {
        content.to_string()
    }
}

async fn migrate_queue_entry(storage: &dyn Storage, category: &str, old_pid: &str, new_pid: &str, result: &mut MigrationResult) {
    let key = keys::queue_state_key(category);
    let Ok(Some(content)) = storage.read(&key).await else { return };
    let Ok(mut value) = serde_json::from_str::<serde_json::Value>(&content) else { return };
    let Some(obj) = value.as_object_mut() else { return };

    let Some(mut entry) = obj.remove(old_pid) else { return };
    if let Some(entry_obj) = entry.as_object_mut() {
        entry_obj.insert("productId".to_string(), serde_json::Value::String(new_pid.to_string()));
    }
    obj.insert(new_pid.to_string(), entry);

    match storage.write(&key, &serde_json::to_string_pretty(&value).unwrap_or_default()).await {
        Ok(()) => result.migrated_count += 1,
        Err(e) => {
            result.failures.push(format!("write {key}: {e}"));
            result.failed_count += 1;
        }
    }
}

/// Append one rename-log entry to `helper_files/{category}/_control_plane/rename_log.json`.
pub async fn append_rename_log(storage: &dyn Storage, category: &str, entry: &RenameLogEntry) {
    let key = keys::rename_log_key(category);
    let mut log: Vec<RenameLogEntry> = match storage.read(&key).await {
        Ok(Some(content)) => serde_json::from_str(&content).unwrap_or_default(),
        _ => Vec::new(),
    };
    log.push(entry.clone());
    let _ = storage.write(&key, &serde_json::to_string_pretty(&log).unwrap_or_default()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use specf_storage::LocalFsStorage;
    use specf_utils::paths::with_isolated_home;

    fn storage() -> (specf_utils::paths::HomeGuard, LocalFsStorage) {
        let guard = with_isolated_home();
        let root = specf_utils::paths::workspace_root();
        (guard, LocalFsStorage::new(root))
    }

    #[tokio::test]
    async fn migrates_latest_dir_and_rewrites_embedded_product_id() {
        let (_guard, storage) = storage();
        storage.write("specs/outputs/mouse/mouse-razer-viper-v3-pro/latest/normalized.json", r#"{"product_id":"mouse-razer-viper-v3-pro"}"#).await.unwrap();

        let result = migrate_product(&storage, "mouse", "mouse-razer-viper-v3-pro", "mouse-razer-viper-v3-pro-se", "specs/outputs").await;
        assert!(result.ok());

        assert!(storage.read("specs/outputs/mouse/mouse-razer-viper-v3-pro/latest/normalized.json").await.unwrap().is_none());
        let migrated = storage.read("specs/outputs/mouse/mouse-razer-viper-v3-pro-se/latest/normalized.json").await.unwrap().unwrap();
        assert!(migrated.contains("mouse-razer-viper-v3-pro-se"));
        assert!(!migrated.contains("\"mouse-razer-viper-v3-pro\""));
    }

    #[tokio::test]
    async fn final_migration_does_not_double_copy_review_subtree() {
        let (_guard, storage) = storage();
        storage.write("final/mouse/mouse-acme-x1/review/state.json", "{}").await.unwrap();
        storage.write("final/mouse/mouse-acme-x1/published.json", "{}").await.unwrap();

        let result = migrate_product(&storage, "mouse", "mouse-acme-x1", "mouse-acme-x2", "specs/outputs").await;
        assert!(result.ok());
        assert!(storage.read("final/mouse/mouse-acme-x2/review/state.json").await.unwrap().is_some());
        assert!(storage.read("final/mouse/mouse-acme-x2/published.json").await.unwrap().is_some());
        // exactly one copy each, not duplicated by both the final and review passes
        assert_eq!(storage.list("final/mouse/mouse-acme-x2").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn leaves_non_json_payloads_untouched() {
        let (_guard, storage) = storage();
        storage.write("specs/outputs/mouse/mouse-acme-x1/latest/page.html", "<html>mouse-acme-x1</html>").await.unwrap();
        let result = migrate_product(&storage, "mouse", "mouse-acme-x1", "mouse-acme-x2", "specs/outputs").await;
        assert!(result.ok());
        let migrated = storage.read("specs/outputs/mouse/mouse-acme-x2/latest/page.html").await.unwrap().unwrap();
        // URLs/embedded text other than productId/product_id are not rewritten.
        assert!(migrated.contains("mouse-acme-x1"));
    }

    #[tokio::test]
    async fn missing_artifacts_migrate_cleanly_with_zero_count() {
        let (_guard, storage) = storage();
        let result = migrate_product(&storage, "mouse", "mouse-acme-x1", "mouse-acme-x2", "specs/outputs").await;
        assert!(result.ok());
        assert_eq!(result.migrated_count, 0);
    }
}
