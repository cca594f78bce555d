use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheError;

/// Raw byte-level cache backend.
///
/// The typed API lives on `CacheService`; backends only move bytes.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get raw bytes, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Set raw bytes with a per-entry TTL.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Remove a key; returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Whether a live entry exists for the key.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}
