use anyhow::anyhow;
use bytes::Bytes;
use sharenote_core::store::{ObjectMetadata, StorageError, StoreResult};
use std::path::PathBuf;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalStoreConfig {
    pub base_path: String,
}

/// Publishes into a directory tree, e.g. the document root of a static web
/// server. Content type and metadata are not persisted; the serving web
/// server derives the type from the extension.
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        LocalStore {
            base_path: base_path.into(),
        }
    }

    pub fn create(config: LocalStoreConfig) -> Self {
        Self::new(config.base_path)
    }

    fn resolve_path(&self, key: &str) -> StoreResult<PathBuf> {
        if key.contains("..") || key.starts_with('/') {
            return Err(StorageError::rejected(
                key,
                "must be a relative path without '..'",
            ));
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait::async_trait]
impl sharenote_core::StorageBackend for LocalStore {
    /// Checks if a file exists for the given key.
    async fn probe(&self, key: &str) -> StoreResult<Option<String>> {
        let full_path = self.resolve_path(key)?;
        let exists = tokio::fs::try_exists(&full_path)
            .await
            .map_err(StorageError::transient)?;
        Ok(exists.then(|| key.to_owned()))
    }

    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        _content_type: &str,
        _metadata: &ObjectMetadata,
    ) -> StoreResult<String> {
        let full_path = self.resolve_path(key)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(StorageError::transient)?;
        }

        tokio::fs::write(&full_path, &bytes)
            .await
            .map_err(StorageError::transient)?;
        tracing::debug!("local store: wrote {} bytes to {key}", bytes.len());
        Ok(key.to_owned())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let full_path = self.resolve_path(key)?;
        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::transient(e)),
        }
    }

    async fn delete_directory(&self, prefix: &str) -> StoreResult<()> {
        let full_path = self.resolve_path(prefix.trim_end_matches('/'))?;
        match tokio::fs::metadata(&full_path).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&full_path)
                .await
                .map_err(StorageError::transient),
            Ok(_) => Err(StorageError::transient(anyhow!(
                "{} is not a directory",
                full_path.display()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::transient(e)),
        }
    }
}
