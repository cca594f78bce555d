//! TTL cache
//!
//! Thread-safe key -> (value, expiry) map with per-entry TTLs and
//! namespaced keys. Entries are created on first miss, overwritten on
//! refresh, and evicted lazily on read when expired. Invalidation is by
//! TTL or explicit delete only; queries never clear caches mid-flight.

mod backend;
mod error;
mod key;
mod memory;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use backend::CacheBackend;
pub use error::CacheError;
pub use key::CacheKey;

use memory::InMemoryCache;

use crate::core::config::CacheConfig;

/// Typed cache service over a byte-level backend.
///
/// Values are MessagePack-encoded. A value that no longer decodes as the
/// requested type is treated as corrupt: the entry is dropped and the read
/// reports a miss, so the caller recomputes.
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

impl CacheService {
    pub fn new(config: &CacheConfig) -> Self {
        tracing::debug!(max_entries = config.max_entries, "Initializing in-memory cache");
        Self {
            backend: Arc::new(InMemoryCache::new(config)),
        }
    }

    /// Get a typed value from cache.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, CacheError> {
        let raw = self.backend.get(&key.to_string()).await?;
        let Some(bytes) = raw else {
            metrics::counter!("cache_misses_total", "namespace" => key.namespace().to_string())
                .increment(1);
            return Ok(None);
        };

        match rmp_serde::from_slice(&bytes) {
            Ok(value) => {
                metrics::counter!("cache_hits_total", "namespace" => key.namespace().to_string())
                    .increment(1);
                Ok(Some(value))
            }
            Err(e) => {
                // Corrupt entry: drop it and report a miss so the value is
                // recomputed instead of failing the query.
                tracing::warn!(key = %key, error = %e, "Dropping corrupt cache entry");
                self.backend.delete(&key.to_string()).await?;
                metrics::counter!("cache_misses_total", "namespace" => key.namespace().to_string())
                    .increment(1);
                Ok(None)
            }
        }
    }

    /// Set a typed value with the given TTL. Zero TTLs are rejected.
    pub async fn set<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl(ttl.as_secs()));
        }
        let bytes =
            rmp_serde::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.backend.set(&key.to_string(), bytes, ttl).await
    }

    /// Remove a key; returns whether it existed.
    pub async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.backend.delete(&key.to_string()).await
    }

    /// Whether a live entry exists.
    pub async fn exists(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.backend.exists(&key.to_string()).await
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::{
        DEFAULT_TTL_DASHBOARD_SECS, DEFAULT_TTL_FIELD_IDS_SECS, DEFAULT_TTL_NAMES_SECS,
        DEFAULT_TTL_RANKING_SECS, DEFAULT_TTL_TECH_METRICS_SECS,
    };

    fn test_config() -> CacheConfig {
        CacheConfig {
            max_entries: 1000,
            dashboard_ttl: Duration::from_secs(DEFAULT_TTL_DASHBOARD_SECS),
            ranking_ttl: Duration::from_secs(DEFAULT_TTL_RANKING_SECS),
            tech_metrics_ttl: Duration::from_secs(DEFAULT_TTL_TECH_METRICS_SECS),
            field_ids_ttl: Duration::from_secs(DEFAULT_TTL_FIELD_IDS_SECS),
            names_ttl: Duration::from_secs(DEFAULT_TTL_NAMES_SECS),
        }
    }

    #[tokio::test]
    async fn typed_get_set_roundtrip() {
        let cache = CacheService::new(&test_config());
        let key = CacheKey::user_name("42");

        cache
            .set(&key, &"Maria Souza".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        let got: Option<String> = cache.get(&key).await.unwrap();
        assert_eq!(got.as_deref(), Some("Maria Souza"));
    }

    #[tokio::test]
    async fn get_returns_none_for_missing_key() {
        let cache = CacheService::new(&test_config());
        let got: Option<String> = cache.get(&CacheKey::dashboard()).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn same_value_until_expiry_then_removed() {
        let cache = CacheService::new(&test_config());
        let key = CacheKey::technician_metrics("7");

        cache
            .set(&key, &vec![1u32, 2, 3], Duration::from_millis(80))
            .await
            .unwrap();

        let first: Option<Vec<u32>> = cache.get(&key).await.unwrap();
        let second: Option<Vec<u32>> = cache.get(&key).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Some(vec![1, 2, 3]));

        tokio::time::sleep(Duration::from_millis(120)).await;
        let expired: Option<Vec<u32>> = cache.get(&key).await.unwrap();
        assert!(expired.is_none());
        assert!(!cache.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn zero_ttl_rejected() {
        let cache = CacheService::new(&test_config());
        let err = cache
            .set(&CacheKey::dashboard(), &1u32, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidTtl(_)));
    }

    #[tokio::test]
    async fn overwrite_resets_value() {
        let cache = CacheService::new(&test_config());
        let key = CacheKey::ranking(Some(3));

        cache.set(&key, &10u64, Duration::from_secs(60)).await.unwrap();
        cache.set(&key, &20u64, Duration::from_secs(60)).await.unwrap();
        let got: Option<u64> = cache.get(&key).await.unwrap();
        assert_eq!(got, Some(20));
    }

    #[tokio::test]
    async fn corrupt_entry_dropped_on_type_mismatch() {
        let cache = CacheService::new(&test_config());
        let key = CacheKey::field_ids();

        cache
            .set(&key, &"not a number".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        // Read back as an incompatible type: entry is dropped, miss reported.
        let got: Option<u64> = cache.get(&key).await.unwrap();
        assert!(got.is_none());
        assert!(!cache.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn explicit_delete_removes_entry() {
        let cache = CacheService::new(&test_config());
        let key = CacheKey::user_name("9");

        cache
            .set(&key, &"x".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.delete(&key).await.unwrap());
        assert!(!cache.delete(&key).await.unwrap());
    }
}
