//! Path resolution for the on-disk storage layout.
//!
//! All paths here are relative to a single workspace root. Callers resolve
//! that root once (via [`workspace_root`]) and pass it down; nothing in this
//! module reaches for a process-global directory on its own, which keeps the
//! layout testable with [`with_isolated_home`].

use camino::Utf8PathBuf;
use std::cell::RefCell;

// Thread-local override used only in tests to avoid process-global env races.
thread_local! {
    static THREAD_HOME: RefCell<Option<Utf8PathBuf>> = const { RefCell::new(None) };
}

/// Resolve the workspace root:
/// 1) thread-local override (tests use this)
/// 2) env `SPEC_FACTORY_HOME` (opt-in for users/CI)
/// 3) default `.spec-factory`
#[must_use]
pub fn workspace_root() -> Utf8PathBuf {
    if let Some(tl) = THREAD_HOME.with(|tl| tl.borrow().clone()) {
        return tl;
    }
    if let Ok(p) = std::env::var("SPEC_FACTORY_HOME") {
        return Utf8PathBuf::from(p);
    }
    Utf8PathBuf::from(".spec-factory")
}

/// `<root>/specs/inputs/<category>/products/<product_id>.json`
#[must_use]
pub fn product_job_path(root: &Utf8PathBuf, category: &str, product_id: &str) -> Utf8PathBuf {
    root.join("specs")
        .join("inputs")
        .join(category)
        .join("products")
        .join(format!("{product_id}.json"))
}

/// `<root>/<output_prefix>/<category>/<product_id>/latest/`
#[must_use]
pub fn latest_dir(root: &Utf8PathBuf, output_prefix: &str, category: &str, product_id: &str) -> Utf8PathBuf {
    root.join(output_prefix).join(category).join(product_id).join("latest")
}

/// `<root>/<output_prefix>/<category>/<product_id>/runs/<run_id>/`
#[must_use]
pub fn run_dir(
    root: &Utf8PathBuf,
    output_prefix: &str,
    category: &str,
    product_id: &str,
    run_id: &str,
) -> Utf8PathBuf {
    root.join(output_prefix)
        .join(category)
        .join(product_id)
        .join("runs")
        .join(run_id)
}

/// `<root>/final/<category>/<product_id>/review/`
#[must_use]
pub fn review_dir(root: &Utf8PathBuf, category: &str, product_id: &str) -> Utf8PathBuf {
    root.join("final").join(category).join(product_id).join("review")
}

/// `<root>/final/<category>/<product_id>/`
#[must_use]
pub fn final_dir(root: &Utf8PathBuf, category: &str, product_id: &str) -> Utf8PathBuf {
    root.join("final").join(category).join(product_id)
}

/// `<root>/<category>/published/<product_id>/`
#[must_use]
pub fn published_dir(root: &Utf8PathBuf, category: &str, product_id: &str) -> Utf8PathBuf {
    root.join(category).join("published").join(product_id)
}

/// `<root>/helper_files/<category>/_control_plane/product_catalog.json`
#[must_use]
pub fn catalog_path(root: &Utf8PathBuf, category: &str) -> Utf8PathBuf {
    root.join("helper_files")
        .join(category)
        .join("_control_plane")
        .join("product_catalog.json")
}

/// `<root>/helper_files/<category>/_control_plane/rename_log.json`
#[must_use]
pub fn rename_log_path(root: &Utf8PathBuf, category: &str) -> Utf8PathBuf {
    root.join("helper_files")
        .join(category)
        .join("_control_plane")
        .join("rename_log.json")
}

/// `<root>/helper_files/<category>/_overrides/<product_id>.overrides.json`
#[must_use]
pub fn overrides_path(root: &Utf8PathBuf, category: &str, product_id: &str) -> Utf8PathBuf {
    root.join("helper_files")
        .join(category)
        .join("_overrides")
        .join(format!("{product_id}.overrides.json"))
}

/// `<root>/helper_files/_global/brand_registry.json`
#[must_use]
pub fn brand_registry_path(root: &Utf8PathBuf) -> Utf8PathBuf {
    root.join("helper_files").join("_global").join("brand_registry.json")
}

/// `<root>/helper_files/_global/brand_rename_log.json`
#[must_use]
pub fn brand_rename_log_path(root: &Utf8PathBuf) -> Utf8PathBuf {
    root.join("helper_files").join("_global").join("brand_rename_log.json")
}

/// `<root>/_queue/<category>/state.json`
#[must_use]
pub fn queue_state_path(root: &Utf8PathBuf, category: &str) -> Utf8PathBuf {
    root.join("_queue").join(category).join("state.json")
}

/// `<root>/_runtime/events.jsonl`
#[must_use]
pub fn events_log_path(root: &Utf8PathBuf) -> Utf8PathBuf {
    root.join("_runtime").join("events.jsonl")
}

/// mkdir -p; treat `AlreadyExists` as success (removes TOCTTOU races).
pub fn ensure_dir_all<P: AsRef<std::path::Path>>(p: P) -> std::io::Result<()> {
    match std::fs::create_dir_all(&p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// RAII guard for an isolated workspace root that clears thread-local state on drop.
#[cfg(any(test, feature = "test-utils"))]
pub struct HomeGuard {
    inner: tempfile::TempDir,
}

#[cfg(any(test, feature = "test-utils"))]
impl Drop for HomeGuard {
    fn drop(&mut self) {
        THREAD_HOME.with(|tl| *tl.borrow_mut() = None);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl std::ops::Deref for HomeGuard {
    type Target = tempfile::TempDir;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Test helper: give this test a unique workspace root under the system temp
/// dir. Hold the `HomeGuard` for the test's duration so the directory stays
/// alive and the thread-local override is cleaned up on drop.
#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(not(test), allow(dead_code))]
#[must_use]
pub fn with_isolated_home() -> HomeGuard {
    let td = tempfile::TempDir::new().expect("create temp home");
    let p = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).unwrap();
    THREAD_HOME.with(|tl| *tl.borrow_mut() = Some(p));
    HomeGuard { inner: td }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_storage_contract() {
        let _guard = with_isolated_home();
        let root = workspace_root();

        assert!(product_job_path(&root, "mouse", "mouse-acme-x1")
            .as_str()
            .ends_with("specs/inputs/mouse/products/mouse-acme-x1.json"));
        assert!(latest_dir(&root, "out", "mouse", "mouse-acme-x1")
            .as_str()
            .ends_with("out/mouse/mouse-acme-x1/latest"));
        assert!(run_dir(&root, "out", "mouse", "mouse-acme-x1", "run-7")
            .as_str()
            .ends_with("out/mouse/mouse-acme-x1/runs/run-7"));
        assert!(published_dir(&root, "mouse", "mouse-acme-x1")
            .as_str()
            .ends_with("mouse/published/mouse-acme-x1"));
        assert!(catalog_path(&root, "mouse")
            .as_str()
            .ends_with("helper_files/mouse/_control_plane/product_catalog.json"));
        assert!(brand_registry_path(&root)
            .as_str()
            .ends_with("helper_files/_global/brand_registry.json"));
        assert!(events_log_path(&root).as_str().ends_with("_runtime/events.jsonl"));
    }

    #[test]
    fn isolated_homes_do_not_collide() {
        let root_a = {
            let _guard = with_isolated_home();
            workspace_root()
        };
        let root_b = {
            let _guard = with_isolated_home();
            workspace_root()
        };
        assert_ne!(root_a, root_b);
    }
}
