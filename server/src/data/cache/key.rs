//! Namespaced cache keys
//!
//! Every cached value lives in a fixed namespace; some namespaces carry a
//! secondary key (e.g. the filtered dashboard is keyed by its date window).

use std::fmt;

use super::error::CacheError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    namespace: String,
    sub: Option<String>,
}

impl CacheKey {
    pub fn new(namespace: &str, sub: Option<String>) -> Result<Self, CacheError> {
        if namespace.trim().is_empty() {
            return Err(CacheError::InvalidKey("empty namespace".to_string()));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            sub,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    // =========================================================================
    // Namespace constructors
    // =========================================================================

    /// Unfiltered dashboard snapshot
    pub fn dashboard() -> Self {
        Self {
            namespace: "dashboard_metrics".to_string(),
            sub: None,
        }
    }

    /// Filtered dashboard snapshot, keyed by its date window
    pub fn dashboard_filtered(start: Option<&str>, end: Option<&str>) -> Self {
        Self {
            namespace: "dashboard_metrics_filtered".to_string(),
            sub: Some(format!(
                "{}|{}",
                start.unwrap_or("none"),
                end.unwrap_or("none")
            )),
        }
    }

    /// Technician ranking, keyed by the requested limit
    pub fn ranking(limit: Option<usize>) -> Self {
        Self {
            namespace: "technician_ranking".to_string(),
            sub: Some(limit.map_or_else(|| "all".to_string(), |l| l.to_string())),
        }
    }

    /// Per-technician lifetime totals
    pub fn technician_metrics(tech_id: &str) -> Self {
        Self {
            namespace: "technician_metrics".to_string(),
            sub: Some(tech_id.to_string()),
        }
    }

    /// Discovered search-option field ids
    pub fn field_ids() -> Self {
        Self {
            namespace: "field_ids".to_string(),
            sub: None,
        }
    }

    /// User display names
    pub fn user_name(user_id: &str) -> Self {
        Self {
            namespace: "user_names".to_string(),
            sub: Some(user_id.to_string()),
        }
    }

    /// Category display names
    pub fn category_name(category_id: &str) -> Self {
        Self {
            namespace: "category_names".to_string(),
            sub: Some(category_id.to_string()),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub {
            Some(sub) => write!(f, "{}:{}", self.namespace, sub),
            None => write!(f, "{}", self.namespace),
        }
    }
}
