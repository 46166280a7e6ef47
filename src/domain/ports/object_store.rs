use async_trait::async_trait;

use crate::domain::ports::errors::ObjectStoreError;

/// Blob storage for installation images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `path` and return the public URL of the object.
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError>;
}
