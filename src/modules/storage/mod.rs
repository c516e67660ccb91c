//! Object storage for attachment blobs and generated report files.
//!
//! [`MinIOStore`] talks to MinIO or any S3-compatible service;
//! [`MemoryStore`] keeps blobs in process for local development and tests.

mod memory_store;
mod minio_store;

use async_trait::async_trait;

use crate::core::error::AppError;

pub use memory_store::MemoryStore;
pub use minio_store::MinIOStore;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError>;

    /// Deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Best-effort removal of blobs whose rows are already gone. Failures are
/// logged and skipped; returns how many deletes succeeded.
pub async fn delete_all(store: &dyn BlobStore, keys: &[String]) -> usize {
    let mut removed = 0;
    for key in keys {
        match store.delete(key).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Failed to delete stored file {}: {}", key, e),
        }
    }
    removed
}

/// `{prefix}/{yyyy}/{mm}/{id}.{ext}`
pub fn object_key(prefix: &str, id: uuid::Uuid, extension: &str) -> String {
    let now = chrono::Utc::now();
    format!(
        "{}/{}/{}.{}",
        prefix.trim_end_matches('/'),
        now.format("%Y/%m"),
        id,
        extension.trim_start_matches('.').to_ascii_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakyStore {
        inner: MemoryStore,
        broken: &'static str,
    }

    #[async_trait]
    impl BlobStore for FlakyStore {
        async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError> {
            self.inner.put(key, data, content_type).await
        }

        async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
            self.inner.get(key).await
        }

        async fn delete(&self, key: &str) -> Result<(), AppError> {
            if key == self.broken {
                return Err(AppError::Storage("connection reset".to_string()));
            }
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn test_delete_all_skips_failures() {
        let store = FlakyStore {
            inner: MemoryStore::new(),
            broken: "comments/b.png",
        };
        for key in ["comments/a.png", "comments/b.png", "comments/c.png"] {
            store.put(key, vec![1, 2, 3], "image/png").await.unwrap();
        }

        let keys: Vec<String> = ["comments/a.png", "comments/b.png", "comments/c.png"]
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(delete_all(&store, &keys).await, 2);

        assert!(store.get("comments/a.png").await.is_err());
        assert!(store.get("comments/b.png").await.is_ok());
        assert!(store.get("comments/c.png").await.is_err());
    }

    #[test]
    fn test_object_key_layout() {
        let id = uuid::Uuid::new_v4();
        let key = object_key("attachments/", id, ".PDF");
        assert!(key.starts_with("attachments/"));
        assert!(key.ends_with(&format!("{}.pdf", id)));
        assert_eq!(key.matches('/').count(), 3);
    }
}
