//! Advisory file locking for the spec factory pipeline.
//!
//! Two lock families, both backed by `fd-lock` so OS-level advisory
//! exclusivity does the heavy lifting (a crashed process's lock is released
//! by the kernel, no liveness polling required):
//!
//! - **Per-product** locks prevent two runs of the same product overlapping.
//! - **Per-category** locks serialize read-modify-write upserts to a
//!   category's queue state file.
//!
//! A [`LockInfo`] sidecar is written alongside the OS lock purely for human
//! diagnostics (which PID, since when) — staleness is reported from that
//! metadata, but never used to silently break another process's lock.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use fd_lock::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

/// Age beyond which a held lock is reported as stale in error messages.
pub const DEFAULT_STALE_THRESHOLD_SECS: i64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock for '{owner}' is held by pid {pid} (created {age_secs}s ago)")]
    Held { owner: String, pid: u32, age_secs: i64 },

    #[error("lock for '{owner}' is held by pid {pid} (created {age_secs}s ago, exceeds stale threshold)")]
    Stale { owner: String, pid: u32, age_secs: i64 },

    #[error("io error acquiring lock for '{owner}': {source}")]
    Io {
        owner: String,
        #[source]
        source: std::io::Error,
    },
}

/// Metadata recorded inside a lock file, for diagnostics only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

impl LockInfo {
    fn now(owner: &str) -> Self {
        Self {
            pid: std::process::id(),
            owner: owner.to_string(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.created_at).num_seconds().max(0)
    }

    #[must_use]
    pub fn is_stale(&self, threshold_secs: i64) -> bool {
        self.age_secs() > threshold_secs
    }
}

/// A held lock; dropping it releases the OS-level advisory lock.
///
/// The backing `RwLock<File>` is intentionally leaked (`Box::leak`) so the
/// write guard can be `'static` without `unsafe`. Lock acquisition is rare
/// relative to a process's lifetime, so the leaked allocation (one `File` +
/// one `RwLock` per distinct path ever locked) is bounded and acceptable.
pub struct LockGuard {
    _file_lock: RwLockWriteGuard<'static, File>,
    pub path: Utf8PathBuf,
    pub info: LockInfo,
}

fn try_acquire(path: &Utf8PathBuf, owner: &str) -> Result<LockGuard, LockError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LockError::Io { owner: owner.to_string(), source: e })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path.as_std_path())
        .map_err(|e| LockError::Io { owner: owner.to_string(), source: e })?;

    let lock: &'static mut RwLock<File> = Box::leak(Box::new(RwLock::new(file)));

    let mut guard = match lock.try_write() {
        Ok(g) => g,
        Err(_) => {
            let existing = read_lock_info(path, owner);
            return Err(match existing {
                Some(info) if info.is_stale(DEFAULT_STALE_THRESHOLD_SECS) => {
                    LockError::Stale { owner: owner.to_string(), pid: info.pid, age_secs: info.age_secs() }
                }
                Some(info) => LockError::Held { owner: owner.to_string(), pid: info.pid, age_secs: info.age_secs() },
                None => LockError::Held { owner: owner.to_string(), pid: 0, age_secs: 0 },
            });
        }
    };

    let info = LockInfo::now(owner);
    let payload = serde_json::to_vec(&info).unwrap_or_default();
    let _ = guard.set_len(0);
    let _ = guard.seek(SeekFrom::Start(0));
    let _ = guard.write_all(&payload);
    let _ = guard.flush();

    Ok(LockGuard { _file_lock: guard, path: path.clone(), info })
}

fn read_lock_info(path: &Utf8PathBuf, owner: &str) -> Option<LockInfo> {
    let mut file = File::open(path.as_std_path()).ok()?;
    let mut buf = String::new();
    file.read_to_string(&mut buf).ok()?;
    serde_json::from_str(&buf).ok().or(Some(LockInfo { pid: 0, owner: owner.to_string(), created_at: Utc::now() }))
}

/// Acquire the per-product lock at `<root>/_runtime/locks/products/<product_id>.lock`.
pub fn acquire_product_lock(root: &Utf8PathBuf, product_id: &str) -> Result<LockGuard, LockError> {
    let path = root.join("_runtime").join("locks").join("products").join(format!("{product_id}.lock"));
    try_acquire(&path, product_id)
}

/// Acquire the per-category lock at `<root>/_runtime/locks/categories/<category>.lock`,
/// used to serialize queue-state read-modify-write upserts.
pub fn acquire_category_lock(root: &Utf8PathBuf, category: &str) -> Result<LockGuard, LockError> {
    let path = root.join("_runtime").join("locks").join("categories").join(format!("{category}.lock"));
    try_acquire(&path, category)
}
