use bytes::Bytes;
use dashmap::DashMap;
use sharenote_core::store::{ObjectMetadata, StoreResult, directory_prefix};

/// An object as the memory store keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
    pub metadata: ObjectMetadata,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: DashMap<String, StoredObject>,
}

impl MemoryStore {
    /// Creates a new, empty `MemoryStore`.
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
        }
    }

    /// Returns a copy of the object stored at `key`.
    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait::async_trait]
impl sharenote_core::StorageBackend for MemoryStore {
    /// Checks if an object exists at the given key.
    async fn probe(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.objects.contains_key(key).then(|| key.to_owned()))
    }

    /// Stores the bytes at the given key.
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StoreResult<String> {
        self.objects.insert(
            key.to_owned(),
            StoredObject {
                bytes,
                content_type: content_type.to_owned(),
                metadata: metadata.clone(),
            },
        );
        Ok(key.to_owned())
    }

    /// Deletes the object at the given key, if any.
    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.objects.remove(key);
        Ok(())
    }

    /// Deletes every object under the given prefix.
    async fn delete_directory(&self, prefix: &str) -> StoreResult<()> {
        let prefix = directory_prefix(prefix);
        self.objects.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharenote_core::StorageBackend;
    use sharenote_core::testutil::BackendTests;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        BackendTests::new(&store).run_all().await.unwrap();
    }

    #[tokio::test]
    async fn keeps_content_type_and_metadata() {
        let store = MemoryStore::new();
        let metadata = ObjectMetadata::from([("hash".to_owned(), "abc".to_owned())]);
        store
            .put("assets/a.css", Bytes::from_static(b"body{}"), "text/css", &metadata)
            .await
            .unwrap();

        let object = store.get("assets/a.css").unwrap();
        assert_eq!(object.bytes.as_ref(), b"body{}");
        assert_eq!(object.content_type, "text/css");
        assert_eq!(object.metadata, metadata);
        assert_eq!(store.keys(), vec!["assets/a.css".to_owned()]);
    }
}
