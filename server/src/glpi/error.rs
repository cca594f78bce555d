use thiserror::Error;

/// Errors surfaced by the GLPI integration engine.
///
/// Transport-class errors (`Timeout`, `Connection`, `Http` 5xx) are retried
/// inside the client before they ever reach a caller; schema-class errors
/// (`Decode`) are usually downgraded to zeros or skipped rows by the
/// aggregation engines.
#[derive(Error, Debug)]
pub enum GlpiError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("GLPI authentication failed: {0}")]
    AuthFailure(String),

    #[error("GLPI request timed out: {0}")]
    Timeout(String),

    #[error("GLPI connection error: {0}")]
    Connection(String),

    #[error("GLPI returned HTTP {status}")]
    Http { status: u16 },

    #[error("Failed to decode GLPI response: {0}")]
    Decode(String),
}

impl GlpiError {
    /// Whether the error class is worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GlpiError::Timeout(_) | GlpiError::Connection(_) | GlpiError::Http { status: 500..=599 }
        )
    }
}

impl From<reqwest::Error> for GlpiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GlpiError::Timeout(e.to_string())
        } else if e.is_connect() {
            GlpiError::Connection(e.to_string())
        } else if e.is_decode() {
            GlpiError::Decode(e.to_string())
        } else {
            GlpiError::Connection(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classes() {
        assert!(GlpiError::Timeout("t".into()).is_retryable());
        assert!(GlpiError::Connection("c".into()).is_retryable());
        assert!(GlpiError::Http { status: 503 }.is_retryable());
        assert!(!GlpiError::Http { status: 404 }.is_retryable());
        assert!(!GlpiError::InvalidArgument("x".into()).is_retryable());
        assert!(!GlpiError::Decode("d".into()).is_retryable());
    }
}
