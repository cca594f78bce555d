//! Ticket counts by (support level, status)
//!
//! Fast path: a single paginated `/search/Ticket` query filtered on the
//! group-hierarchy text, classified row by row. One round-trip per 1000
//! tickets instead of one per (level, status) cell. GLPI occasionally
//! returns inconsistent or empty data under hierarchy filters, so an
//! all-zero or failed fast path falls back to 24 individual count queries.

use std::collections::HashMap;
use std::sync::Arc;

use super::types::{SupportLevel, TicketMetrics, TicketStatus};
use crate::core::config::{LevelDateField, LevelGroups};
use crate::core::constants::{PAGINATION_SAFETY_LIMIT, SEARCH_PAGE_SIZE};
use crate::glpi::error::GlpiError;
use crate::glpi::fields::FieldRegistry;
use crate::glpi::http::GlpiClient;
use crate::glpi::parse::int_value;
use crate::glpi::search::{self, Link, SearchQuery, SearchType};

pub type LevelCounts = HashMap<SupportLevel, TicketMetrics>;

pub struct AggregateEngine {
    client: Arc<GlpiClient>,
    fields: Arc<FieldRegistry>,
    levels: LevelGroups,
    level_date_field: LevelDateField,
}

impl AggregateEngine {
    pub fn new(
        client: Arc<GlpiClient>,
        fields: Arc<FieldRegistry>,
        levels: LevelGroups,
        level_date_field: LevelDateField,
    ) -> Self {
        Self {
            client,
            fields,
            levels,
            level_date_field,
        }
    }

    /// Count tickets per (level, status) over the optional date window.
    ///
    /// Always returns all four concrete levels, zero-filled where GLPI has
    /// nothing.
    pub async fn counts_by_level(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<LevelCounts, GlpiError> {
        // Validate the window before going near the network.
        search::date_criteria(start, end, "19", 0)?;

        match self.fast_path(start, end).await {
            Ok(counts) if counts.values().any(|m| m.total() > 0) => Ok(counts),
            Ok(_) => {
                tracing::warn!("Hierarchy search returned all zeros, falling back");
                self.slow_path(start, end).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Hierarchy search failed, falling back");
                self.slow_path(start, end).await
            }
        }
    }

    fn date_field<'a>(&self, fields: &'a crate::glpi::fields::FieldIds) -> &'a str {
        match self.level_date_field {
            LevelDateField::DateMod => &fields.date_mod,
            LevelDateField::DateCreation => &fields.date_creation,
        }
    }

    async fn fast_path(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<LevelCounts, GlpiError> {
        let fields = self.fields.field_ids().await;

        let mut query = SearchQuery::new()
            .is_deleted(false)
            .force_display(&["2", &fields.group, &fields.status]);

        // OR-chain over the hierarchy markers...
        for level in SupportLevel::CONCRETE {
            query = query.criterion(Link::Or, &fields.group, SearchType::Contains, level.marker());
        }
        // ...narrowed by an OR-chain over the status ids.
        for (i, status) in TicketStatus::ALL.iter().enumerate() {
            let link = if i == 0 { Link::And } else { Link::Or };
            query = query.criterion(link, &fields.status, SearchType::Equals, &status.id().to_string());
        }
        query = query.date_range(start, end, self.date_field(&fields))?;

        let rows = search::fetch_all_pages(
            &self.client,
            "search/Ticket",
            query.params(),
            SEARCH_PAGE_SIZE,
            PAGINATION_SAFETY_LIMIT,
        )
        .await?;

        let mut counts = empty_counts();
        for row in &rows {
            let hierarchy = row
                .get(fields.group.as_str())
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let level = SupportLevel::from_hierarchy(hierarchy);
            if level == SupportLevel::Unknown {
                continue;
            }

            let Some(status) = row
                .get(fields.status.as_str())
                .and_then(int_value)
                .and_then(TicketStatus::from_id)
            else {
                // A status outside 1..6 belongs to no bucket.
                continue;
            };

            if let Some(metrics) = counts.get_mut(&level) {
                metrics.increment(status);
            }
        }

        tracing::debug!(rows = rows.len(), "Hierarchy search classified");
        Ok(counts)
    }

    /// One `range=0-0` count per (level, status) cell.
    async fn slow_path(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<LevelCounts, GlpiError> {
        metrics::counter!("glpi_fallback_used_total", "query" => "counts_by_level").increment(1);
        tracing::warn!("fallback_used");

        let fields = self.fields.field_ids().await;
        let mut counts = empty_counts();

        for level in SupportLevel::CONCRETE {
            let Some(group_id) = level.group_id(&self.levels) else {
                continue;
            };
            for status in TicketStatus::ALL {
                let count = self
                    .count_cell(&fields, group_id, status, start, end)
                    .await?;
                if let Some(metrics) = counts.get_mut(&level) {
                    metrics.set(status, count);
                }
            }
        }

        Ok(counts)
    }

    async fn count_cell(
        &self,
        fields: &crate::glpi::fields::FieldIds,
        group_id: u32,
        status: TicketStatus,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<u64, GlpiError> {
        let query = SearchQuery::new()
            .is_deleted(false)
            .range(0, 0)
            .criterion(Link::And, &fields.group, SearchType::Equals, &group_id.to_string())
            .criterion(Link::And, &fields.status, SearchType::Equals, &status.id().to_string())
            .date_range(start, end, self.date_field(fields))?;

        search::count_query(&self.client, "search/Ticket", query.params()).await
    }
}

fn empty_counts() -> LevelCounts {
    SupportLevel::CONCRETE
        .into_iter()
        .map(|level| (level, TicketMetrics::default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{GlpiConfig, TimeoutConfig};
    use crate::data::cache::CacheService;
    use crate::glpi::session::SessionManager;
    use std::time::Duration;

    fn engine_for(server: &mockito::ServerGuard) -> AggregateEngine {
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
        let cache = Arc::new(CacheService::new(&crate::core::config::CacheConfig {
            max_entries: 100,
            dashboard_ttl: Duration::from_secs(180),
            ranking_ttl: Duration::from_secs(300),
            tech_metrics_ttl: Duration::from_secs(3600),
            field_ids_ttl: Duration::from_secs(1800),
            names_ttl: Duration::from_secs(3600),
        }));
        let fields = Arc::new(FieldRegistry::new(
            client.clone(),
            cache,
            Duration::from_secs(1800),
        ));
        AggregateEngine::new(client, fields, LevelGroups::default(), LevelDateField::DateMod)
    }

    async fn mock_auth(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/initSession")
            .with_status(200)
            .with_body(r#"{"session_token": "T"}"#)
            .create_async()
            .await
    }

    async fn mock_field_discovery_failure(server: &mut mockito::ServerGuard) -> mockito::Mock {
        // 404 is not retried, so discovery falls straight back to defaults.
        server
            .mock("GET", "/listSearchOptions/Ticket")
            .with_status(404)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn fast_path_classifies_rows_by_marker_and_status() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let _fields = mock_field_discovery_failure(&mut server).await;

        let body = serde_json::json!({
            "data": [
                {"2": 1, "8": "DTIC > N1", "12": 1},
                {"2": 2, "8": "DTIC > N1", "12": 1},
                {"2": 3, "8": "DTIC > N2 > Redes", "12": 5},
                {"2": 4, "8": "DTIC > N2", "12": "6"},
                {"2": 5, "8": "Outro grupo", "12": 1},
                {"2": 6, "8": "DTIC > N3", "12": 9},
            ]
        });
        server
            .mock("GET", "/search/Ticket")
            .match_query(mockito::Matcher::Regex("range=0-999".to_string()))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let engine = engine_for(&server);
        let counts = engine.counts_by_level(None, None).await.unwrap();

        assert_eq!(counts[&SupportLevel::N1].new, 2);
        assert_eq!(counts[&SupportLevel::N2].solved, 1);
        assert_eq!(counts[&SupportLevel::N2].closed, 1);
        // Unrecognised hierarchy and out-of-range status count nowhere.
        assert_eq!(counts[&SupportLevel::N3].total(), 0);
        assert_eq!(counts[&SupportLevel::N4].total(), 0);
        let grand_total: u64 = counts.values().map(|m| m.total()).sum();
        assert_eq!(grand_total, 4);
    }

    #[tokio::test]
    async fn all_zero_fast_path_falls_back_to_cell_counts() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let _fields = mock_field_discovery_failure(&mut server).await;

        // Fast path: empty page.
        server
            .mock("GET", "/search/Ticket")
            .match_query(mockito::Matcher::Regex("range=0-999".to_string()))
            .with_status(200)
            .with_body(r#"{"data": []}"#)
            .create_async()
            .await;

        // Slow path: 4 levels x 6 statuses individual counts.
        let cell = server
            .mock("GET", "/search/Ticket")
            .match_query(mockito::Matcher::Regex("range=0-0".to_string()))
            .with_status(200)
            .with_header("Content-Range", "items 0-0/2")
            .with_body(r#"{"data": []}"#)
            .expect(24)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let counts = engine.counts_by_level(None, None).await.unwrap();

        cell.assert_async().await;
        for level in SupportLevel::CONCRETE {
            assert_eq!(counts[&level].total(), 12);
            assert_eq!(counts[&level].new, 2);
        }
    }

    #[tokio::test]
    async fn fast_path_error_falls_back_to_cell_counts() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let _fields = mock_field_discovery_failure(&mut server).await;

        // Fast path: undecodable body on every attempt.
        server
            .mock("GET", "/search/Ticket")
            .match_query(mockito::Matcher::Regex("range=0-999".to_string()))
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let cell = server
            .mock("GET", "/search/Ticket")
            .match_query(mockito::Matcher::Regex("range=0-0".to_string()))
            .with_status(200)
            .with_header("Content-Range", "0-0/1")
            .with_body(r#"{"data": []}"#)
            .expect(24)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let counts = engine.counts_by_level(None, None).await.unwrap();

        cell.assert_async().await;
        let grand_total: u64 = counts.values().map(|m| m.total()).sum();
        assert_eq!(grand_total, 24);
    }

    #[tokio::test]
    async fn invalid_dates_rejected_before_any_request() {
        let server = mockito::Server::new_async().await;
        let engine = engine_for(&server);
        let err = engine
            .counts_by_level(Some("not-a-date"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GlpiError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn pagination_stops_on_short_page() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;
        let _fields = mock_field_discovery_failure(&mut server).await;

        // A single short page: no second range request is issued.
        let page = server
            .mock("GET", "/search/Ticket")
            .match_query(mockito::Matcher::Regex("range=0-999".to_string()))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "data": [{"2": 1, "8": "N1", "12": 1}]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let engine = engine_for(&server);
        let counts = engine.counts_by_level(None, None).await.unwrap();
        page.assert_async().await;
        assert_eq!(counts[&SupportLevel::N1].new, 1);
    }
}
