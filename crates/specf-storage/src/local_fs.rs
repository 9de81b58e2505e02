//! Local-filesystem `Storage` backend. Keys map onto paths under a single
//! root directory via [`camino::Utf8PathBuf::join`]; writes go through
//! [`specf_utils::atomic_write::write_file_atomic`] so a crash mid-write
//! never leaves a torn file.

use async_trait::async_trait;
use camino::Utf8PathBuf;
use specf_utils::atomic_write::write_file_atomic;
use specf_utils::error::StorageError;

use crate::Storage;

pub struct LocalFsStorage {
    root: Utf8PathBuf,
}

impl LocalFsStorage {
    #[must_use]
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, key: &str) -> Result<Utf8PathBuf, StorageError> {
        if key.split('/').any(|segment| segment == "..") {
            return Err(StorageError::Backend(format!("key '{key}' escapes storage root")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl Storage for LocalFsStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    async fn write(&self, key: &str, content: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        let content = content.to_string();
        tokio::task::spawn_blocking(move || write_file_atomic(&path, &content))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let base = self.resolve(prefix)?;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || list_recursive(&root, &base))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }
}

fn list_recursive(root: &Utf8PathBuf, base: &Utf8PathBuf) -> Result<Vec<String>, StorageError> {
    let mut keys = Vec::new();
    walk(root, base, &mut keys)?;
    keys.sort();
    Ok(keys)
}

fn walk(root: &Utf8PathBuf, dir: &Utf8PathBuf, keys: &mut Vec<String>) -> Result<(), StorageError> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StorageError::Backend(e.to_string())),
    };
    for entry in read_dir {
        let entry = entry.map_err(|e| StorageError::Backend(e.to_string()))?;
        let path = Utf8PathBuf::from_path_buf(entry.path()).map_err(|p| StorageError::Backend(format!("non-utf8 path: {}", p.display())))?;
        if entry.file_type().map_err(|e| StorageError::Backend(e.to_string()))?.is_dir() {
            walk(root, &path, keys)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            keys.push(rel.as_str().to_string());
        }
    }
    Ok(())
}
