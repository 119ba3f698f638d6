//! Test utilities for `StorageBackend` implementations and their callers.
//!
//! # Usage
//!
//! In your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! sharenote_core = { workspace = true, features = ["testutil"] }
//! ```
//!
//! Conformance suite for a backend:
//!
//! ```ignore
//! use sharenote_core::testutil::BackendTests;
//!
//! #[tokio::test]
//! async fn test_my_backend() {
//!     let backend = MyBackend::new(...);
//!     BackendTests::new(&backend).run_all().await.unwrap();
//! }
//! ```
//!
//! Fault injection for code that drives a backend:
//!
//! ```ignore
//! let backend = ScriptedBackend::new(MemoryStore::new());
//! backend.fail_transiently("notes/a/attachs/x.png", 2);
//! backend.reject("notes/a/attachs/y.png", "quota exceeded");
//! ```

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;

use crate::store::{ObjectMetadata, StorageBackend, StorageError, StoreResult};

/// Test suite for `StorageBackend` implementations.
pub struct BackendTests<'a, B> {
    backend: &'a B,
    /// Prefix for test objects to avoid conflicts
    prefix: String,
}

impl<'a, B: StorageBackend> BackendTests<'a, B> {
    /// Create a new test suite for the given backend.
    pub fn new(backend: &'a B) -> Self {
        let prefix = format!("_test_{}/", rand::rng().random::<u32>());
        Self { backend, prefix }
    }

    /// Create a new test suite with a custom prefix.
    pub fn with_prefix(backend: &'a B, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    async fn put(&self, key: &str, body: &'static [u8]) -> StoreResult<String> {
        self.backend
            .put(
                key,
                Bytes::from_static(body),
                "application/octet-stream",
                &ObjectMetadata::new(),
            )
            .await
    }

    /// Run all tests.
    pub async fn run_all(&self) -> StoreResult<()> {
        self.test_put_returns_key().await?;
        self.test_probe().await?;
        self.test_overwrite().await?;
        self.test_delete().await?;
        self.test_delete_missing().await?;
        self.test_delete_directory().await?;
        Ok(())
    }

    /// `put` answers with the key it stored under.
    pub async fn test_put_returns_key(&self) -> StoreResult<()> {
        let key = self.key("put/object.bin");
        let stored = self.put(&key, b"hello, world!").await?;
        assert_eq!(stored, key, "put should return the stored key");
        Ok(())
    }

    /// `probe` sees objects after `put` and nothing before.
    pub async fn test_probe(&self) -> StoreResult<()> {
        let key = self.key("probe/object.bin");

        assert_eq!(
            self.backend.probe(&key).await?,
            None,
            "object should not exist before creation"
        );

        self.put(&key, b"probe").await?;

        assert_eq!(
            self.backend.probe(&key).await?,
            Some(key.clone()),
            "probe should find the object after creation"
        );
        Ok(())
    }

    /// A second `put` to the same key replaces the object.
    pub async fn test_overwrite(&self) -> StoreResult<()> {
        let key = self.key("overwrite/object.bin");
        self.put(&key, b"original content").await?;
        self.put(&key, b"new content").await?;
        assert!(
            self.backend.probe(&key).await?.is_some(),
            "overwritten object should still exist"
        );
        Ok(())
    }

    /// Test object deletion.
    pub async fn test_delete(&self) -> StoreResult<()> {
        let key = self.key("delete/object.bin");
        self.put(&key, b"to be deleted").await?;
        self.backend.delete(&key).await?;
        assert!(
            self.backend.probe(&key).await?.is_none(),
            "object should not exist after delete"
        );
        Ok(())
    }

    /// Deleting something that was never stored succeeds.
    pub async fn test_delete_missing(&self) -> StoreResult<()> {
        self.backend.delete(&self.key("never/stored.bin")).await
    }

    /// `delete_directory` removes everything under the prefix, nothing else.
    pub async fn test_delete_directory(&self) -> StoreResult<()> {
        let inside = [
            self.key("dir/attachs/a.png"),
            self.key("dir/attachs/b.png"),
        ];
        let sibling = self.key("dir/attachs.html");
        for key in inside.iter().chain([&sibling]) {
            self.put(key, b"dir test").await?;
        }

        self.backend
            .delete_directory(&self.key("dir/attachs"))
            .await?;

        for key in &inside {
            assert!(
                self.backend.probe(key).await?.is_none(),
                "{key} should be removed with its directory"
            );
        }
        assert!(
            self.backend.probe(&sibling).await?.is_some(),
            "objects sharing only a name prefix must survive"
        );
        Ok(())
    }
}

/// One call observed by [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Probe(String),
    Put(String),
    Delete(String),
    DeleteDirectory(String),
}

#[derive(Debug, Default)]
struct Script {
    transient: HashMap<String, u32>,
    rejected: HashMap<String, String>,
    unreachable: HashSet<String>,
    log: Vec<Op>,
}

/// Wraps a backend, records every call in order and injects failures.
#[derive(Debug)]
pub struct ScriptedBackend<B> {
    inner: B,
    script: Mutex<Script>,
}

impl<B: StorageBackend> ScriptedBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            script: Mutex::new(Script::default()),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// The next `times` puts to `key` fail with a transient error.
    pub fn fail_transiently(&self, key: impl Into<String>, times: u32) {
        self.lock().transient.insert(key.into(), times);
    }

    /// Every put to `key` is explicitly rejected.
    pub fn reject(&self, key: impl Into<String>, reason: impl Into<String>) {
        self.lock().rejected.insert(key.into(), reason.into());
    }

    /// Every put to `key` fails transiently, forever.
    pub fn make_unreachable(&self, key: impl Into<String>) {
        self.lock().unreachable.insert(key.into());
    }

    pub fn ops(&self) -> Vec<Op> {
        self.lock().log.clone()
    }

    pub fn puts_to(&self, key: &str) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|op| matches!(op, Op::Put(k) if k == key))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<B: StorageBackend> StorageBackend for ScriptedBackend<B> {
    async fn probe(&self, key: &str) -> StoreResult<Option<String>> {
        self.lock().log.push(Op::Probe(key.to_owned()));
        self.inner.probe(key).await
    }

    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StoreResult<String> {
        {
            let mut script = self.lock();
            script.log.push(Op::Put(key.to_owned()));
            if let Some(reason) = script.rejected.get(key) {
                return Err(StorageError::rejected(key, reason.clone()));
            }
            if script.unreachable.contains(key) {
                return Err(StorageError::transient(anyhow::anyhow!(
                    "injected timeout for {key}"
                )));
            }
            if let Some(remaining) = script.transient.get_mut(key)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(StorageError::transient(anyhow::anyhow!(
                    "injected connection reset for {key}"
                )));
            }
        }
        self.inner.put(key, bytes, content_type, metadata).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.lock().log.push(Op::Delete(key.to_owned()));
        self.inner.delete(key).await
    }

    async fn delete_directory(&self, prefix: &str) -> StoreResult<()> {
        self.lock().log.push(Op::DeleteDirectory(prefix.to_owned()));
        self.inner.delete_directory(prefix).await
    }
}

/// Generate random bytes for testing.
pub fn random_bytes(len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    rand::rng().fill(&mut data[..]);
    Bytes::from(data)
}
