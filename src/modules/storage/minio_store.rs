//! MinIO/S3-compatible blob store built on rust-s3.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use tracing::{debug, info, warn};

use crate::core::config::StorageConfig;
use crate::core::error::AppError;
use crate::modules::storage::BlobStore;

pub struct MinIOStore {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
}

impl MinIOStore {
    pub fn new(config: &StorageConfig) -> Result<Self, AppError> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Storage(format!("Failed to create MinIO credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Storage(format!("Failed to create MinIO bucket handle: {}", e)))?;

        // Path-style URLs for MinIO (http://endpoint/bucket instead of http://bucket.endpoint)
        bucket.set_path_style();

        info!(
            "MinIO store configured for endpoint: {}, bucket: {}",
            config.endpoint, config.bucket
        );

        Ok(Self {
            bucket,
            region,
            credentials,
        })
    }

    /// Create the bucket if it does not exist yet
    pub async fn ensure_bucket_exists(&self) -> Result<(), AppError> {
        let name = self.bucket.name();
        match Bucket::create_with_path_style(
            &name,
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await
        {
            Ok(_) => {
                info!("Bucket '{}' created", name);
                Ok(())
            }
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", name);
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        name, e
                    );
                }
                Ok(())
            }
        }
    }

    pub fn bucket_name(&self) -> String {
        self.bucket.name()
    }
}

fn check_status(action: &str, key: &str, status: u16) -> Result<(), AppError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(AppError::NotFound(format!("Stored file '{}' not found", key))),
        other => Err(AppError::Storage(format!(
            "Failed to {} '{}': status {}",
            action, key, other
        ))),
    }
}

#[async_trait]
impl BlobStore for MinIOStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload '{}': {}", key, e)))?;
        check_status("upload", key, response.status_code())?;

        debug!("Uploaded '{}' ({} bytes)", key, data.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let response = self
            .bucket
            .get_object(key)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to download '{}': {}", key, e)))?;
        check_status("download", key, response.status_code())?;

        Ok(response.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let response = self
            .bucket
            .delete_object(key)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete '{}': {}", key, e)))?;

        match check_status("delete", key, response.status_code()) {
            Ok(()) | Err(AppError::NotFound(_)) => {
                debug!("Deleted '{}'", key);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(check_status("upload", "k", 200).is_ok());
        assert!(matches!(
            check_status("download", "k", 404),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            check_status("upload", "k", 503),
            Err(AppError::Storage(_))
        ));
    }
}
