//! Blob storage backends.
//!
//! The coordinator only sees flat `key -> payload` pairs through [`DataStorage`].
//! Both bundled backends stage writes and deletes in memory and make them
//! visible to durable storage only on [`DataStorage::commit`].

pub mod file;
pub mod memory;
pub mod staging;

pub use file::{FileFormat, FileStorage, FileStorageConfig};
pub use memory::MemoryStorage;

use crate::core::{Payload, Result};
use async_trait::async_trait;

/// Durable key/value storage used by the coordinator.
#[async_trait]
pub trait DataStorage: Send + Sync {
    /// Returns `None` when nothing is stored under `key`.
    async fn get_blob(&self, key: &str) -> Result<Option<Payload>>;

    async fn set_blob(&self, key: &str, payload: Payload) -> Result<()>;

    async fn delete_key(&self, key: &str) -> Result<()>;

    /// Flushes every staged change to the durable medium.
    async fn commit(&self) -> Result<()>;
}
