//! The `Storage` capability: `read`/`write`/`list`/`delete` by
//! key, plus a local-filesystem reference implementation. Keys are
//! slash-separated paths relative to a storage root and never escape it
//! (`..` segments are rejected) — every other crate in this workspace
//! addresses artifacts purely by key, never by raw filesystem path.

mod local_fs;

pub use local_fs::LocalFsStorage;

use async_trait::async_trait;
use specf_utils::error::StorageError;

/// Read/write/list/delete by key. A production deployment might
/// back this with S3 (`outputMode: s3`); this crate ships the trait and a
/// local-FS backend only, per the Non-goals.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the full content at `key`, or `None` if it does not exist.
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `content` to `key`, creating parent directories as needed.
    /// Overwrites any existing content at `key`.
    async fn write(&self, key: &str, content: &str) -> Result<(), StorageError>;

    /// List all keys beginning with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Delete the content at `key`. Deleting a key that does not exist is
    /// not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Whether `key` currently exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.read(key).await?.is_some())
    }
}
