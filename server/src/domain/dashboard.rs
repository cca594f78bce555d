//! Dashboard assembly
//!
//! Composes general totals (all tickets, by status only), the per-level
//! breakdown, and trends into one snapshot. General totals filter on the
//! creation date (field 15); per-level metrics filter on the configured
//! level date field (modification date by default). "Opened in window"
//! and "active in window" are different business questions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::aggregate::{AggregateEngine, LevelCounts};
use super::trends::{self, trends_from_totals};
use super::types::{
    Buckets, DashboardMetrics, FiltersApplied, LevelMetrics, Niveis, SupportLevel, Technician,
    TicketMetrics, TicketStatus, Trends,
};
use crate::data::cache::{CacheKey, CacheService};
use crate::glpi::error::GlpiError;
use crate::glpi::fields::FieldRegistry;
use crate::glpi::http::GlpiClient;
use crate::glpi::search::{self, Link, SearchQuery, SearchType};

pub struct DashboardService {
    client: Arc<GlpiClient>,
    fields: Arc<FieldRegistry>,
    cache: Arc<CacheService>,
    aggregate: Arc<AggregateEngine>,
    ttl: Duration,
}

impl DashboardService {
    pub fn new(
        client: Arc<GlpiClient>,
        fields: Arc<FieldRegistry>,
        cache: Arc<CacheService>,
        aggregate: Arc<AggregateEngine>,
        ttl: Duration,
    ) -> Self {
        Self {
            client,
            fields,
            cache,
            aggregate,
            ttl,
        }
    }

    /// The dashboard snapshot for the optional date window.
    pub async fn dashboard(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<DashboardMetrics, GlpiError> {
        let filtered = start.is_some() || end.is_some();
        let key = if filtered {
            CacheKey::dashboard_filtered(start, end)
        } else {
            CacheKey::dashboard()
        };

        if let Ok(Some(cached)) = self.cache.get::<DashboardMetrics>(&key).await {
            tracing::debug!(%key, "Dashboard served from cache");
            return Ok(cached);
        }

        // Validate the window once, before fanning out.
        search::date_criteria(start, end, "15", 0)?;

        let general = self.general_totals(start, end).await;
        let by_level = self.aggregate.counts_by_level(start, end).await?;
        let tech_counts = self.technician_counts().await;
        let tendencias = self.compute_trends(&general, (start, end)).await;

        report_closure_slack(&general, &by_level);

        let geral = Buckets::from(&general);
        let metrics = DashboardMetrics {
            novos: geral.novos,
            pendentes: geral.pendentes,
            progresso: geral.progresso,
            resolvidos: geral.resolvidos,
            total: geral.total,
            niveis: Niveis {
                geral,
                n1: level_metrics(SupportLevel::N1, &by_level, &tech_counts),
                n2: level_metrics(SupportLevel::N2, &by_level, &tech_counts),
                n3: level_metrics(SupportLevel::N3, &by_level, &tech_counts),
                n4: level_metrics(SupportLevel::N4, &by_level, &tech_counts),
            },
            tendencias,
            filtros_aplicados: filtered.then(|| FiltersApplied {
                data_inicio: start.map(str::to_string),
                data_fim: end.map(str::to_string),
            }),
            timestamp: Utc::now(),
        };

        if let Err(e) = self.cache.set(&key, &metrics, self.ttl).await {
            tracing::warn!(%key, error = %e, "Failed to cache dashboard");
        }

        Ok(metrics)
    }

    /// Six independent status counts over all tickets, no level filter.
    /// A failed count degrades to zero so one bad status cannot sink the
    /// whole snapshot.
    async fn general_totals(&self, start: Option<&str>, end: Option<&str>) -> TicketMetrics {
        let fields = self.fields.field_ids().await;
        let mut totals = TicketMetrics::default();

        for status in TicketStatus::ALL {
            let query = SearchQuery::new()
                .is_deleted(false)
                .range(0, 0)
                .criterion(Link::And, &fields.status, SearchType::Equals, &status.id().to_string());
            let query = match query.date_range(start, end, &fields.date_creation) {
                Ok(q) => q,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid window for general totals");
                    return totals;
                }
            };

            match search::count_query(&self.client, "search/Ticket", query.params()).await {
                Ok(count) => totals.set(status, count),
                Err(e) => {
                    tracing::warn!(status = status.label(), error = %e,
                        "General total failed, counting zero");
                }
            }
        }

        totals
    }

    /// Trends against the previous window, computed from general totals
    /// only. Trend failures degrade to flat zeros.
    async fn compute_trends(
        &self,
        current: &TicketMetrics,
        window: (Option<&str>, Option<&str>),
    ) -> Trends {
        let today = Utc::now().date_naive();
        let (prev_start, prev_end) = match trends::previous_window(window.0, window.1, today) {
            Ok(window) => window,
            Err(e) => {
                tracing::warn!(error = %e, "Trend window computation failed");
                return Trends::default();
            }
        };

        let previous = self
            .general_totals(Some(&prev_start), Some(&prev_end))
            .await;

        trends_from_totals(
            (
                current.novos(),
                current.pendentes(),
                current.progresso(),
                current.resolvidos(),
            ),
            (
                previous.novos(),
                previous.pendentes(),
                previous.progresso(),
                previous.resolvidos(),
            ),
        )
    }

    /// Technician headcount per level, read from the cached ranking when
    /// one exists. The dashboard never triggers the ranking fan-out itself.
    async fn technician_counts(&self) -> [u64; 4] {
        let mut counts = [0u64; 4];
        let key = CacheKey::ranking(None);
        if let Ok(Some(ranking)) = self.cache.get::<Vec<Technician>>(&key).await {
            for tech in ranking {
                if let Some(i) = SupportLevel::CONCRETE.iter().position(|l| *l == tech.level) {
                    counts[i] += 1;
                }
            }
        }
        counts
    }
}

fn level_metrics(level: SupportLevel, counts: &LevelCounts, tech_counts: &[u64; 4]) -> LevelMetrics {
    let tickets = counts.get(&level).copied().unwrap_or_default();
    let index = SupportLevel::CONCRETE
        .iter()
        .position(|l| *l == level)
        .unwrap_or(0);
    LevelMetrics {
        level,
        buckets: Buckets::from(&tickets),
        tecnicos: tech_counts[index],
        tempo_medio_resolucao: None,
    }
}

/// The unfiltered top-line bucket should equal the sum across levels plus
/// tickets with no recognised level. The slack is reported, never hidden.
fn report_closure_slack(general: &TicketMetrics, by_level: &LevelCounts) {
    let level_total: u64 = by_level.values().map(|m| m.total()).sum();
    let general_total = general.total();
    if general_total >= level_total {
        tracing::debug!(
            unclassified = general_total - level_total,
            "Aggregate closure slack"
        );
    } else {
        tracing::warn!(
            general = general_total,
            levels = level_total,
            "Level counts exceed general totals"
        );
    }
}
