//! Search-option field-id discovery
//!
//! GLPI addresses ticket fields by numeric search-option ids that can vary
//! between installations and locales. The registry discovers them once from
//! `listSearchOptions/Ticket` by field name, caches the result for 30
//! minutes, and degrades to well-known defaults when discovery fails:
//! aggregate queries must keep working against an unreachable or odd GLPI.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::http::GlpiClient;
use crate::data::cache::{CacheKey, CacheService};

/// Numeric search-option ids, kept as decimal strings the way GLPI search
/// parameters want them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIds {
    pub group: String,
    pub status: String,
    pub technician: String,
    pub date_creation: String,
    pub date_mod: String,
}

impl Default for FieldIds {
    fn default() -> Self {
        Self {
            group: "8".to_string(),
            status: "12".to_string(),
            technician: "5".to_string(),
            date_creation: "15".to_string(),
            date_mod: "19".to_string(),
        }
    }
}

/// Candidate field names, matched case-insensitively against the discovery
/// payload. Portuguese first: that is what stock GLPI installations in this
/// domain report.
const GROUP_NAMES: [&str; 4] = ["grupo técnico", "technical group", "assigned group", "group"];
const STATUS_NAMES: [&str; 3] = ["status", "estado", "state"];
const TECHNICIAN_NAMES: [&str; 4] = ["técnico", "technician", "assigned to", "atribuído"];
const DATE_MOD_NAMES: [&str; 3] = ["data de modificação", "last update", "última atualização"];

/// Names identifying the assigned-technician field (as opposed to the
/// responsible technician, search-option 95).
const ASSIGNED_TECH_FIELD: &str = "5";
const RESPONSIBLE_TECH_FIELD: &str = "95";

pub struct FieldRegistry {
    client: Arc<GlpiClient>,
    cache: Arc<CacheService>,
    ttl: Duration,
    tech_field: OnceCell<String>,
}

impl FieldRegistry {
    pub fn new(client: Arc<GlpiClient>, cache: Arc<CacheService>, ttl: Duration) -> Self {
        Self {
            client,
            cache,
            ttl,
            tech_field: OnceCell::new(),
        }
    }

    /// The field-id map, discovered or defaulted. Never fails: a broken
    /// discovery call degrades to the defaults (uncached, so the next call
    /// retries discovery).
    pub async fn field_ids(&self) -> FieldIds {
        let key = CacheKey::field_ids();
        if let Ok(Some(ids)) = self.cache.get::<FieldIds>(&key).await {
            return ids;
        }

        match self.discover().await {
            Ok(ids) => {
                if let Err(e) = self.cache.set(&key, &ids, self.ttl).await {
                    tracing::warn!(error = %e, "Failed to cache field ids");
                }
                ids
            }
            Err(e) => {
                tracing::warn!(error = %e, "Field-id discovery failed, using defaults");
                FieldIds::default()
            }
        }
    }

    /// The assigned-technician field id (search-option 5), distinguished
    /// from the responsible technician (95). Resolved once per process.
    pub async fn tech_field_id(&self) -> String {
        self.tech_field
            .get_or_init(|| async {
                match self.discover_tech_field().await {
                    Ok(id) => id,
                    Err(e) => {
                        tracing::warn!(error = %e,
                            "Technician field discovery failed, using default");
                        ASSIGNED_TECH_FIELD.to_string()
                    }
                }
            })
            .await
            .clone()
    }

    async fn discover(&self) -> Result<FieldIds, super::error::GlpiError> {
        let options = self
            .client
            .get_json("listSearchOptions/Ticket", &[])
            .await?;

        let mut group = None;
        let mut status = None;
        let mut technician = None;
        let mut date_mod = None;

        if let Some(map) = options.as_object() {
            for (id, data) in map {
                let Some(name) = data.get("name").and_then(|n| n.as_str()) else {
                    continue;
                };
                let lower = name.to_lowercase();

                if group.is_none() && GROUP_NAMES.contains(&lower.as_str()) {
                    group = Some(id.clone());
                } else if status.is_none() && STATUS_NAMES.contains(&lower.as_str()) {
                    status = Some(id.clone());
                } else if technician.is_none() && TECHNICIAN_NAMES.contains(&lower.as_str()) {
                    technician = Some(id.clone());
                } else if date_mod.is_none() && DATE_MOD_NAMES.contains(&lower.as_str()) {
                    date_mod = Some(id.clone());
                }
            }
        }

        let defaults = FieldIds::default();
        let ids = FieldIds {
            group: group.unwrap_or(defaults.group),
            status: status.unwrap_or(defaults.status),
            technician: technician.unwrap_or(defaults.technician),
            // GLPI convention: field 15 is the creation date everywhere,
            // whatever the localized discovery payload claims.
            date_creation: defaults.date_creation,
            date_mod: date_mod.unwrap_or(defaults.date_mod),
        };

        tracing::debug!(?ids, "Field ids discovered");
        Ok(ids)
    }

    async fn discover_tech_field(&self) -> Result<String, super::error::GlpiError> {
        let options = self
            .client
            .get_json("listSearchOptions/Ticket", &[])
            .await?;

        for (field_id, expected) in [
            (ASSIGNED_TECH_FIELD, "técnico"),
            (RESPONSIBLE_TECH_FIELD, "técnico encarregado"),
        ] {
            if let Some(name) = options
                .get(field_id)
                .and_then(|d| d.get("name"))
                .and_then(|n| n.as_str())
                && name.to_lowercase() == expected
            {
                tracing::debug!(field_id, name, "Technician field resolved");
                return Ok(field_id.to_string());
            }
        }

        // Fallback: scan every option for a technician-shaped name.
        if let Some(map) = options.as_object() {
            for (id, data) in map {
                if let Some(name) = data.get("name").and_then(|n| n.as_str())
                    && TECHNICIAN_NAMES.contains(&name.to_lowercase().as_str())
                {
                    return Ok(id.clone());
                }
            }
        }

        Ok(ASSIGNED_TECH_FIELD.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{CacheConfig, GlpiConfig, TimeoutConfig};
    use crate::glpi::session::SessionManager;

    fn cache() -> Arc<CacheService> {
        Arc::new(CacheService::new(&CacheConfig {
            max_entries: 100,
            dashboard_ttl: Duration::from_secs(180),
            ranking_ttl: Duration::from_secs(300),
            tech_metrics_ttl: Duration::from_secs(3600),
            field_ids_ttl: Duration::from_secs(1800),
            names_ttl: Duration::from_secs(3600),
        }))
    }

    fn registry_for(server: &mockito::ServerGuard) -> FieldRegistry {
        let http = reqwest::Client::new();
        let config = GlpiConfig {
            base_url: server.url(),
            app_token: "app".to_string(),
            user_token: "user".to_string(),
        };
        let session = Arc::new(SessionManager::new(
            http.clone(),
            config,
            Duration::from_secs(5),
        ));
        let client = Arc::new(GlpiClient::new(
            http,
            server.url(),
            session,
            TimeoutConfig {
                fast: Duration::from_secs(5),
                slow: Duration::from_secs(20),
                default: Duration::from_secs(12),
            },
        ));
        FieldRegistry::new(client, cache(), Duration::from_secs(1800))
    }

    async fn mock_auth(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/initSession")
            .with_status(200)
            .with_body(r#"{"session_token": "T"}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn discovery_maps_names_and_forces_creation_date() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let options = serde_json::json!({
            "7": {"name": "Grupo técnico"},
            "11": {"name": "Status"},
            "5": {"name": "Técnico"},
            "14": {"name": "Data de criação"},
            "20": {"name": "Data de modificação"},
        });
        let mock = server
            .mock("GET", "/listSearchOptions/Ticket")
            .with_status(200)
            .with_body(options.to_string())
            .expect(1)
            .create_async()
            .await;

        let registry = registry_for(&server);
        let ids = registry.field_ids().await;
        assert_eq!(ids.group, "7");
        assert_eq!(ids.status, "11");
        assert_eq!(ids.technician, "5");
        // Creation date is pinned to 15 regardless of discovery.
        assert_eq!(ids.date_creation, "15");
        assert_eq!(ids.date_mod, "20");

        // Second call is served from cache.
        let again = registry.field_ids().await;
        assert_eq!(again, ids);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn discovery_failure_degrades_to_defaults() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        server
            .mock("GET", "/listSearchOptions/Ticket")
            .with_status(404)
            .create_async()
            .await;

        let registry = registry_for(&server);
        let ids = registry.field_ids().await;
        assert_eq!(ids, FieldIds::default());
    }

    #[tokio::test]
    async fn partially_discovered_slots_fall_back() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let options = serde_json::json!({
            "11": {"name": "Status"},
        });
        server
            .mock("GET", "/listSearchOptions/Ticket")
            .with_status(200)
            .with_body(options.to_string())
            .create_async()
            .await;

        let registry = registry_for(&server);
        let ids = registry.field_ids().await;
        assert_eq!(ids.status, "11");
        assert_eq!(ids.group, "8");
        assert_eq!(ids.technician, "5");
    }

    #[tokio::test]
    async fn tech_field_prefers_assigned_over_responsible() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let options = serde_json::json!({
            "5": {"name": "Técnico"},
            "95": {"name": "Técnico encarregado"},
        });
        let mock = server
            .mock("GET", "/listSearchOptions/Ticket")
            .with_status(200)
            .with_body(options.to_string())
            .expect(1)
            .create_async()
            .await;

        let registry = registry_for(&server);
        assert_eq!(registry.tech_field_id().await, "5");
        // Process-lifetime cache: no second discovery call.
        assert_eq!(registry.tech_field_id().await, "5");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn tech_field_defaults_on_failure() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        server
            .mock("GET", "/listSearchOptions/Ticket")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let registry = registry_for(&server);
        assert_eq!(registry.tech_field_id().await, "5");
    }
}
