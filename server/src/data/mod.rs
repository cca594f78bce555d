//! Data layer
//!
//! The service is stateless; the only data infrastructure is the in-memory
//! TTL cache that shields GLPI from repeated aggregate queries.

pub mod cache;

pub use cache::{CacheBackend, CacheError, CacheKey, CacheService};
