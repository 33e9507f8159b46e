//! Object-store port used by the refresher, the durability manager and the
//! next-up lookup.

mod memory;
mod s3;

pub use memory::{InMemoryObjectStore, ListingGate};
pub use s3::{S3ObjectStore, S3Settings};

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::StorageError;

/// Listing entry for one remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// Minimal, async-capable object store abstraction.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lazily list objects under `prefix`. The stream ends early with an error
    /// item if the backend fails part-way through.
    fn list_objects<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, Result<ObjectInfo, StorageError>>;

    /// `Ok(false)` only when the backend positively reports the key missing.
    async fn object_exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Time-limited GET URL for `key`.
    async fn presigned_url(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StorageError>;

    /// Object contents, or `None` if the key does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError>;
}
