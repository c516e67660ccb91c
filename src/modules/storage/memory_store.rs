use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::error::AppError;
use crate::modules::storage::BlobStore;

/// In-process blob store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<(), AppError> {
        self.objects.write().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Stored file '{}' not found", key)))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok, block_on};

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        store.put("a/b.txt", b"hello".to_vec(), "text/plain").await.unwrap();
        assert_eq!(store.get("a/b.txt").await.unwrap(), b"hello");

        store.delete("a/b.txt").await.unwrap();
        assert!(matches!(store.get("a/b.txt").await, Err(AppError::NotFound(_))));

        // Deleting twice is fine
        store.delete("a/b.txt").await.unwrap();
    }

    #[test]
    fn test_put_overwrites() {
        let store = MemoryStore::new();
        assert_ok!(block_on(store.put("k", b"one".to_vec(), "text/plain")));
        assert_ok!(block_on(store.put("k", b"two".to_vec(), "text/plain")));
        assert_eq!(block_on(store.get("k")).unwrap(), b"two");
        assert_err!(block_on(store.get("missing")));
    }
}
