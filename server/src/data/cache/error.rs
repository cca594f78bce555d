use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    #[error("Invalid TTL: {0} seconds (must be positive)")]
    InvalidTtl(u64),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
