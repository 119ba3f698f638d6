use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;

/// User metadata stored alongside an object (`x-amz-meta-*` on S3).
pub type ObjectMetadata = BTreeMap<String, String>;

pub type StoreResult<T, E = StorageError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Network or backend failure that may succeed on a later attempt.
    #[error("transient storage failure: {0}")]
    Transient(#[from] anyhow::Error),
    /// The backend answered and explicitly refused the operation.
    #[error("storage backend rejected {key}: {reason}")]
    Rejected { key: String, reason: String },
}

impl StorageError {
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        Self::Transient(err.into())
    }

    pub fn rejected(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A single bucket-shaped object store.
///
/// Keys are relative, `/`-separated paths. Successful `probe` and `put`
/// calls return the stored relative key; callers resolve it against their
/// public base URL.
#[async_trait]
pub trait StorageBackend: std::fmt::Debug + Send + Sync + 'static {
    /// Returns the stored key if an object exists at `key`.
    async fn probe(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `bytes` at `key`, replacing any previous object.
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StoreResult<String>;

    /// Deletes the object at `key`. Missing objects are not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Deletes every object whose key starts with `prefix/`.
    async fn delete_directory(&self, prefix: &str) -> StoreResult<()>;
}

#[async_trait]
impl<T: StorageBackend + ?Sized> StorageBackend for std::sync::Arc<T> {
    async fn probe(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).probe(key).await
    }

    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StoreResult<String> {
        (**self).put(key, bytes, content_type, metadata).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key).await
    }

    async fn delete_directory(&self, prefix: &str) -> StoreResult<()> {
        (**self).delete_directory(prefix).await
    }
}

/// Normalizes a directory prefix to end in exactly one `/`.
pub fn directory_prefix(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}
