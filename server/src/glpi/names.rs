//! Display-name resolution with caching
//!
//! User and category names are looked up once and cached for an hour. The
//! resolvers never fail: an unreachable GLPI degrades to a generic
//! placeholder so listings still render.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::http::GlpiClient;
use crate::data::cache::{CacheKey, CacheService};

pub struct NameResolver {
    client: Arc<GlpiClient>,
    cache: Arc<CacheService>,
    ttl: Duration,
}

impl NameResolver {
    pub fn new(client: Arc<GlpiClient>, cache: Arc<CacheService>, ttl: Duration) -> Self {
        Self { client, cache, ttl }
    }

    /// Resolve a user's display name. Falls back to `"Técnico <id>"`.
    pub async fn user_name(&self, user_id: &str) -> String {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return "Não informado".to_string();
        }

        let key = CacheKey::user_name(user_id);
        if let Ok(Some(name)) = self.cache.get::<String>(&key).await {
            return name;
        }

        let name = match self.client.get_json(&format!("User/{}", user_id), &[]).await {
            Ok(payload) => {
                display_name(&payload).unwrap_or_else(|| format!("Técnico {}", user_id))
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "User lookup failed");
                format!("Técnico {}", user_id)
            }
        };

        if let Err(e) = self.cache.set(&key, &name, self.ttl).await {
            tracing::warn!(user_id, error = %e, "Failed to cache user name");
        }
        name
    }

    /// Resolve a category's display name. Falls back to `"Categoria <id>"`.
    pub async fn category_name(&self, category_id: &str) -> String {
        let category_id = category_id.trim();
        if category_id.is_empty() || category_id == "0" {
            return "Não informado".to_string();
        }

        let key = CacheKey::category_name(category_id);
        if let Ok(Some(name)) = self.cache.get::<String>(&key).await {
            return name;
        }

        let name = match self
            .client
            .get_json(&format!("ITILCategory/{}", category_id), &[])
            .await
        {
            Ok(payload) => payload
                .get("completename")
                .or_else(|| payload.get("name"))
                .and_then(|n| n.as_str())
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("Categoria {}", category_id)),
            Err(e) => {
                tracing::warn!(category_id, error = %e, "Category lookup failed");
                format!("Categoria {}", category_id)
            }
        };

        if let Err(e) = self.cache.set(&key, &name, self.ttl).await {
            tracing::warn!(category_id, error = %e, "Failed to cache category name");
        }
        name
    }
}

/// Build a display name from a GLPI user payload, by priority:
/// `completename`, then `realname`, then `name` (login), then
/// `firstname lastname`.
pub fn display_name(user: &Value) -> Option<String> {
    for field in ["completename", "realname", "name"] {
        if let Some(value) = non_empty(user.get(field)) {
            return Some(value);
        }
    }

    let firstname = non_empty(user.get("firstname"));
    let lastname = non_empty(user.get("lastname"));
    match (firstname, lastname) {
        (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
        (Some(first), None) => Some(first),
        _ => None,
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
