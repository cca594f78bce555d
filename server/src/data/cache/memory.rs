//! In-memory cache implementation using moka
//!
//! moka handles eviction (TinyLFU) and expiry; per-entry TTLs are wired
//! through an `Expiry` implementation so each namespace can carry its own
//! lifetime.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use super::backend::CacheBackend;
use super::error::CacheError;
use crate::core::config::CacheConfig;

/// Cache entry with data and its TTL
#[derive(Clone)]
struct CacheEntry {
    data: Vec<u8>,
    ttl: Duration,
}

/// Per-entry expiry tracking for variable TTLs
struct VariableTtlExpiry;

impl Expiry<String, CacheEntry> for VariableTtlExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_read(
        &self,
        _key: &String,
        _value: &CacheEntry,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        duration_until_expiry
    }
}

pub struct InMemoryCache {
    cache: Cache<String, CacheEntry>,
}

impl InMemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .initial_capacity((config.max_entries as usize / 4).min(1_000))
            .expire_after(VariableTtlExpiry)
            .build();

        Self { cache }
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.cache.get(key).await.map(|entry| entry.data.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry { data: value, ttl };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let existed = self.cache.contains_key(key);
        self.cache.invalidate(key).await;
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.cache.contains_key(key))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
