//! The blob staging seam between pipeline stages.

use async_trait::async_trait;

use crate::error::StorageResult;

/// Storage for media handed from one stage to the next.
///
/// A key is referenced by exactly one in-flight task, so implementations do
/// not coordinate concurrent writers of the same key.
#[async_trait]
pub trait BlobStaging: Send + Sync {
    /// Store `data` under `key`, replacing any previous object.
    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<()>;

    /// Read the object at `key`.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Remove the object at `key`. Removing a missing object succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Whether an object exists at `key`.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Backend name for logs and health output.
    fn backend(&self) -> &'static str;
}
