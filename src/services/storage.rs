use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};

/// Read access to the bucket exports land in.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// All object keys under `prefix`, sorted.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    fn bucket_name(&self) -> &str;
}

/// S3-compatible object store client.
pub struct S3Store {
    bucket: Box<Bucket>,
}

impl S3Store {
    /// Connect to `bucket_name`. A custom `endpoint` selects path-style addressing.
    pub fn new(
        bucket_name: &str,
        region: &str,
        endpoint: Option<&str>,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = match endpoint {
            Some(endpoint) => Region::Custom {
                region: region.to_string(),
                endpoint: endpoint.to_string(),
            },
            None => region
                .parse::<Region>()
                .map_err(|e| StorageError::Config(e.to_string()))?,
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let mut bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;
        if endpoint.is_some() {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let pages = self.bucket.list(prefix.to_string(), None).await?;
        let mut keys: Vec<String> = pages
            .into_iter()
            .flat_map(|page| page.contents.into_iter().map(|object| object.key))
            .collect();
        keys.sort();

        tracing::debug!(prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.bucket.get_object(key).await?;
        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StorageError::Status {
                key: key.to_string(),
                status,
            });
        }
        Ok(response.to_vec())
    }

    fn bucket_name(&self) -> &str {
        &self.bucket.name
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Object {key} returned status {status}")]
    Status { key: String, status: u16 },

    #[error("Storage configuration error: {0}")]
    Config(String),
}
