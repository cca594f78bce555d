//! Technician ranking
//!
//! Enumerates candidate technicians (assigned-tech ids seen on recent
//! tickets, with a Profile_User fallback), resolves their names and levels,
//! fans out to per-technician ticket counts over a bounded worker pool, and
//! ranks by ticket count. A timed-out worker contributes a zero-count row;
//! it never fails the whole ranking.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use super::types::{SupportLevel, Technician, TechnicianMetrics};
use crate::core::config::LevelGroups;
use crate::core::constants::{
    FANOUT_WORKER_TIMEOUT_SECS, METRIC_FETCH_CONCURRENCY, NAME_FETCH_CONCURRENCY,
    PAGINATION_SAFETY_LIMIT, SEARCH_PAGE_SIZE, TECH_BATCH_SIZE, TECH_CANDIDATE_CAP,
    TECH_DISCOVERY_DAYS,
};
use crate::data::cache::{CacheKey, CacheService};
use crate::glpi::error::GlpiError;
use crate::glpi::fields::FieldRegistry;
use crate::glpi::http::GlpiClient;
use crate::glpi::names::display_name;
use crate::glpi::parse::{int_value, technician_id};
use crate::glpi::search::{self, Link, SearchQuery, SearchType};

/// Profile id GLPI assigns to technicians.
const TECHNICIAN_PROFILE_ID: &str = "6";

#[derive(Debug, Clone, Default)]
pub struct RankingParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub level: Option<SupportLevel>,
    pub limit: Option<usize>,
    pub entity: Option<u64>,
}

impl RankingParams {
    fn is_filtered(&self) -> bool {
        self.start.is_some() || self.end.is_some() || self.level.is_some() || self.entity.is_some()
    }
}

struct Candidate {
    id: String,
    name: String,
}

pub struct RankingService {
    client: Arc<GlpiClient>,
    fields: Arc<FieldRegistry>,
    cache: Arc<CacheService>,
    levels: LevelGroups,
    /// Fallback mapping of lowercase display name to level marker.
    level_names: HashMap<String, String>,
    ranking_ttl: Duration,
    tech_metrics_ttl: Duration,
}

impl RankingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<GlpiClient>,
        fields: Arc<FieldRegistry>,
        cache: Arc<CacheService>,
        levels: LevelGroups,
        level_names: HashMap<String, String>,
        ranking_ttl: Duration,
        tech_metrics_ttl: Duration,
    ) -> Self {
        Self {
            client,
            fields,
            cache,
            levels,
            level_names,
            ranking_ttl,
            tech_metrics_ttl,
        }
    }

    /// Rank technicians by ticket count, descending, ties broken by id.
    pub async fn rank(&self, params: &RankingParams) -> Result<Vec<Technician>, GlpiError> {
        search::date_criteria(params.start.as_deref(), params.end.as_deref(), "15", 0)?;

        let filtered = params.is_filtered();
        let key = CacheKey::ranking(params.limit);
        if !filtered
            && let Ok(Some(cached)) = self.cache.get::<Vec<Technician>>(&key).await
        {
            tracing::debug!("Ranking served from cache");
            return Ok(cached);
        }

        let tech_field = self.fields.tech_field_id().await;
        let candidate_ids = self.discover_candidates(&tech_field, params.entity).await?;
        if candidate_ids.is_empty() {
            tracing::warn!("No technician candidates found");
            return Ok(Vec::new());
        }

        let candidates = self.resolve_candidates(candidate_ids).await;
        let counts = self
            .collect_metrics(&candidates, &tech_field, params)
            .await;
        let levels = self.classify_levels(&candidates).await;

        let mut ranking: Vec<Technician> = candidates
            .into_iter()
            .map(|candidate| {
                let metrics = counts.get(&candidate.id).copied().unwrap_or_default();
                let level = levels
                    .get(&candidate.id)
                    .copied()
                    .unwrap_or(SupportLevel::N1);
                Technician {
                    id: candidate.id,
                    name: candidate.name,
                    level,
                    ticket_count: metrics.total,
                    resolved_count: metrics.resolved,
                    pending_count: metrics.pending,
                    rank: 0,
                }
            })
            .collect();

        if let Some(level) = params.level {
            ranking.retain(|t| t.level == level);
        }

        ranking.sort_by(|a, b| {
            b.ticket_count
                .cmp(&a.ticket_count)
                .then_with(|| numeric_id(&a.id).cmp(&numeric_id(&b.id)))
        });
        for (i, tech) in ranking.iter_mut().enumerate() {
            tech.rank = (i + 1) as u32;
        }
        if let Some(limit) = params.limit {
            ranking.truncate(limit);
        }

        if !filtered
            && let Err(e) = self.cache.set(&key, &ranking, self.ranking_ttl).await
        {
            tracing::warn!(error = %e, "Failed to cache ranking");
        }

        Ok(ranking)
    }

    // =========================================================================
    // Candidate discovery
    // =========================================================================

    /// Distinct assigned-tech ids from tickets of the last 90 days; when
    /// that yields nothing (fresh installs, empty windows), enumerate users
    /// holding the technician profile.
    async fn discover_candidates(
        &self,
        tech_field: &str,
        entity: Option<u64>,
    ) -> Result<Vec<String>, GlpiError> {
        let fields = self.fields.field_ids().await;
        let since = (Utc::now() - chrono::Duration::days(TECH_DISCOVERY_DAYS))
            .format("%Y-%m-%d")
            .to_string();

        let mut query = SearchQuery::new()
            .range(0, 4999)
            .force_display(&["2", tech_field, &fields.date_creation])
            .criterion(Link::And, &fields.date_creation, SearchType::MoreThan, &since);
        if let Some(entity) = entity {
            query = query.criterion(Link::And, "80", SearchType::Equals, &entity.to_string());
        }

        let body = self.client.get_json("search/Ticket", query.params()).await?;
        let mut ids: BTreeSet<String> = BTreeSet::new();
        if let Some(rows) = body.get("data").and_then(|d| d.as_array()) {
            for row in rows {
                if let Some(id) = row.get(tech_field).and_then(technician_id) {
                    ids.insert(id);
                }
            }
        }

        if ids.is_empty() {
            tracing::debug!("No technicians on recent tickets, trying Profile_User");
            ids = self.profile_candidates().await?;
        }

        if ids.len() > TECH_CANDIDATE_CAP {
            tracing::warn!(
                candidates = ids.len(),
                cap = TECH_CANDIDATE_CAP,
                "Candidate set capped"
            );
        }

        Ok(ids.into_iter().take(TECH_CANDIDATE_CAP).collect())
    }

    /// `/search/Profile_User` with the technician profile. The user column
    /// arrives either as a numeric id or as a login name; login names are
    /// resolved to ids through a batched user search.
    async fn profile_candidates(&self) -> Result<BTreeSet<String>, GlpiError> {
        let query = SearchQuery::new()
            .range(0, 999)
            .force_display(&["2", "5", "4", "80"])
            .criterion(Link::And, "4", SearchType::Equals, TECHNICIAN_PROFILE_ID);

        let body = self
            .client
            .get_json("search/Profile_User", query.params())
            .await?;

        let mut ids = BTreeSet::new();
        let mut logins = BTreeSet::new();
        if let Some(rows) = body.get("data").and_then(|d| d.as_array()) {
            for row in rows {
                let Some(value) = row.get("5") else { continue };
                match technician_id(value) {
                    Some(id) => {
                        ids.insert(id);
                    }
                    None => {
                        if let Some(login) = value.as_str().map(str::trim).filter(|s| !s.is_empty())
                        {
                            logins.insert(login.to_string());
                        }
                    }
                }
            }
        }

        for batch in logins.iter().collect::<Vec<_>>().chunks(TECH_BATCH_SIZE) {
            let mut query = SearchQuery::new().range(0, 999).force_display(&["2", "1"]);
            for (i, login) in batch.iter().enumerate() {
                let link = if i == 0 { Link::And } else { Link::Or };
                query = query.criterion(link, "1", SearchType::Equals, login);
            }
            let body = self.client.get_json("search/User", query.params()).await?;
            if let Some(rows) = body.get("data").and_then(|d| d.as_array()) {
                for row in rows {
                    if let Some(id) = row.get("2").and_then(technician_id) {
                        ids.insert(id);
                    }
                }
            }
        }

        Ok(ids)
    }

    // =========================================================================
    // Name resolution
    // =========================================================================

    /// Fetch `/User/{id}` for every candidate over a bounded pool, dropping
    /// inactive and deleted users. A failed or timed-out lookup keeps the
    /// candidate under a placeholder name rather than dropping the row.
    async fn resolve_candidates(&self, ids: Vec<String>) -> Vec<Candidate> {
        let timeout = Duration::from_secs(FANOUT_WORKER_TIMEOUT_SECS);

        let resolved: Vec<Option<Candidate>> = stream::iter(ids)
            .map(|id| {
                let client = self.client.clone();
                async move {
                    let path = format!("User/{}", id);
                    let lookup = client.get_json(&path, &[]);
                    match tokio::time::timeout(timeout, lookup).await {
                        Ok(Ok(user)) => {
                            if !user_is_active(&user) {
                                tracing::debug!(%id, "Skipping inactive or deleted user");
                                return None;
                            }
                            let name =
                                display_name(&user).unwrap_or_else(|| format!("Técnico {}", id));
                            Some(Candidate { id, name })
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(%id, error = %e, "User lookup failed");
                            let name = format!("Técnico {}", id);
                            Some(Candidate { id, name })
                        }
                        Err(_) => {
                            tracing::warn!(%id, "User lookup timed out");
                            let name = format!("Técnico {}", id);
                            Some(Candidate { id, name })
                        }
                    }
                }
            })
            .buffer_unordered(NAME_FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut candidates: Vec<Candidate> = resolved.into_iter().flatten().collect();
        candidates.sort_by_key(|c| numeric_id(&c.id));
        candidates
    }

    // =========================================================================
    // Metric collection
    // =========================================================================

    async fn collect_metrics(
        &self,
        candidates: &[Candidate],
        tech_field: &str,
        params: &RankingParams,
    ) -> HashMap<String, TechnicianMetrics> {
        let filtered = params.start.is_some() || params.end.is_some();

        if !filtered {
            match self.batch_metrics(candidates, tech_field).await {
                Ok(counts) => return counts,
                Err(e) => {
                    metrics::counter!("glpi_fallback_used_total", "query" => "ranking_batch")
                        .increment(1);
                    tracing::warn!(error = %e, "Batch count failed, falling back to per-technician");
                }
            }
        }

        self.per_tech_metrics(candidates, tech_field, params).await
    }

    /// One OR-chained search per sub-batch of candidates, aggregated by the
    /// parsed technician field. Far fewer round-trips than per-candidate
    /// counting.
    async fn batch_metrics(
        &self,
        candidates: &[Candidate],
        tech_field: &str,
    ) -> Result<HashMap<String, TechnicianMetrics>, GlpiError> {
        let fields = self.fields.field_ids().await;
        let mut counts: HashMap<String, TechnicianMetrics> = HashMap::new();

        for batch in candidates.chunks(TECH_BATCH_SIZE) {
            let mut query = SearchQuery::new()
                .is_deleted(false)
                .force_display(&["2", tech_field, &fields.status]);
            for (i, candidate) in batch.iter().enumerate() {
                let link = if i == 0 { Link::And } else { Link::Or };
                query = query.criterion(link, tech_field, SearchType::Equals, &candidate.id);
            }

            let rows = search::fetch_all_pages(
                &self.client,
                "search/Ticket",
                query.params(),
                SEARCH_PAGE_SIZE,
                PAGINATION_SAFETY_LIMIT,
            )
            .await?;

            for row in &rows {
                let Some(id) = row.get(tech_field).and_then(technician_id) else {
                    continue;
                };
                let entry = counts.entry(id).or_default();
                entry.total += 1;
                match row.get(fields.status.as_str()).and_then(int_value) {
                    Some(5) | Some(6) => entry.resolved += 1,
                    Some(2) | Some(3) | Some(4) => entry.pending += 1,
                    _ => {}
                }
            }
        }

        Ok(counts)
    }

    /// One ticket search per candidate over a bounded pool. Used when date
    /// filters demand per-window counting, or when batch mode failed. A
    /// timed-out worker yields a zero row.
    async fn per_tech_metrics(
        &self,
        candidates: &[Candidate],
        tech_field: &str,
        params: &RankingParams,
    ) -> HashMap<String, TechnicianMetrics> {
        let fields = self.fields.field_ids().await;
        let filtered = params.start.is_some() || params.end.is_some();
        let timeout = Duration::from_secs(FANOUT_WORKER_TIMEOUT_SECS);

        let results: Vec<(String, TechnicianMetrics)> = stream::iter(candidates.iter())
            .map(|candidate| {
                let id = candidate.id.clone();
                let fields = fields.clone();
                let start = params.start.clone();
                let end = params.end.clone();
                async move {
                    let cache_key = CacheKey::technician_metrics(&id);
                    if !filtered
                        && let Ok(Some(cached)) =
                            self.cache.get::<TechnicianMetrics>(&cache_key).await
                    {
                        return (id, cached);
                    }

                    let work = self.count_for_technician(
                        &id,
                        tech_field,
                        &fields,
                        start.as_deref(),
                        end.as_deref(),
                    );
                    let metrics = match tokio::time::timeout(timeout, work).await {
                        Ok(Ok(metrics)) => metrics,
                        Ok(Err(e)) => {
                            tracing::warn!(%id, error = %e, "Technician count failed, using zero");
                            TechnicianMetrics::default()
                        }
                        Err(_) => {
                            tracing::warn!(%id, "Technician count timed out, using zero");
                            TechnicianMetrics::default()
                        }
                    };

                    if !filtered
                        && let Err(e) = self
                            .cache
                            .set(&cache_key, &metrics, self.tech_metrics_ttl)
                            .await
                    {
                        tracing::warn!(%id, error = %e, "Failed to cache technician metrics");
                    }

                    (id, metrics)
                }
            })
            .buffer_unordered(METRIC_FETCH_CONCURRENCY)
            .collect()
            .await;

        results.into_iter().collect()
    }

    async fn count_for_technician(
        &self,
        id: &str,
        tech_field: &str,
        fields: &crate::glpi::fields::FieldIds,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<TechnicianMetrics, GlpiError> {
        let query = SearchQuery::new()
            .is_deleted(false)
            .force_display(&["2", &fields.status])
            .criterion(Link::And, tech_field, SearchType::Equals, id)
            .date_range(start, end, &fields.date_creation)?;

        let rows = search::fetch_all_pages(
            &self.client,
            "search/Ticket",
            query.params(),
            SEARCH_PAGE_SIZE,
            PAGINATION_SAFETY_LIMIT,
        )
        .await?;

        let mut metrics = TechnicianMetrics {
            total: rows.len() as u64,
            ..Default::default()
        };
        for row in &rows {
            match row.get(fields.status.as_str()).and_then(int_value) {
                Some(5) | Some(6) => metrics.resolved += 1,
                Some(2) | Some(3) | Some(4) => metrics.pending += 1,
                _ => {}
            }
        }
        Ok(metrics)
    }

    // =========================================================================
    // Level classification
    // =========================================================================

    /// Group membership is authoritative; the configured name table is a
    /// best-effort fallback; N1 is the default.
    async fn classify_levels(&self, candidates: &[Candidate]) -> HashMap<String, SupportLevel> {
        let timeout = Duration::from_secs(FANOUT_WORKER_TIMEOUT_SECS);

        let results: Vec<(String, SupportLevel)> = stream::iter(candidates.iter())
            .map(|candidate| {
                let id = candidate.id.clone();
                let name = candidate.name.clone();
                async move {
                    let lookup = self.group_level(&id);
                    let level = match tokio::time::timeout(timeout, lookup).await {
                        Ok(Some(level)) => level,
                        _ => self.name_table_level(&name),
                    };
                    (id, level)
                }
            })
            .buffer_unordered(METRIC_FETCH_CONCURRENCY)
            .collect()
            .await;

        results.into_iter().collect()
    }

    async fn group_level(&self, user_id: &str) -> Option<SupportLevel> {
        let query = SearchQuery::new()
            .range(0, 99)
            .force_display(&["3", "4"])
            .criterion(Link::And, "4", SearchType::Equals, user_id);

        let body = self
            .client
            .get_json("search/Group_User", query.params())
            .await
            .ok()?;

        let rows = body.get("data")?.as_array()?;
        for row in rows {
            if let Some(group_id) = row.get("3").and_then(int_value)
                && let Some(level) = SupportLevel::from_group_id(&self.levels, group_id as u32)
            {
                return Some(level);
            }
        }
        None
    }

    fn name_table_level(&self, name: &str) -> SupportLevel {
        self.level_names
            .get(&name.to_lowercase())
            .and_then(|marker| SupportLevel::from_marker(marker))
            .unwrap_or(SupportLevel::N1)
    }
}

fn numeric_id(id: &str) -> u64 {
    id.parse().unwrap_or(u64::MAX)
}

fn user_is_active(user: &serde_json::Value) -> bool {
    let as_flag = |key: &str| -> i64 {
        match user.get(key) {
            Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
            Some(serde_json::Value::Bool(b)) => *b as i64,
            _ => 0,
        }
    };
    as_flag("is_active") == 1 && as_flag("is_deleted") != 1
}
