//! Dashboard metrics endpoints

use std::time::Instant;

use axum::Extension;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::middleware::CorrelationId;
use crate::api::server::AppState;
use crate::api::types::{ApiError, envelope};

#[derive(Debug, Deserialize, IntoParams)]
pub struct MetricsQuery {
    /// Window start, `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// Window end, `YYYY-MM-DD`
    pub end_date: Option<String>,
}

/// Dashboard totals, per-level breakdown, and trends
#[utoipa::path(
    get,
    path = "/api/metrics",
    tag = "metrics",
    params(MetricsQuery),
    responses(
        (status = 200, description = "Dashboard metrics"),
        (status = 400, description = "Invalid date filter"),
    )
)]
pub async fn metrics(
    State(state): State<AppState>,
    Extension(cid): Extension<CorrelationId>,
    Query(query): Query<MetricsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();

    let data = state
        .dashboard
        .dashboard(query.start_date.as_deref(), query.end_date.as_deref())
        .await
        .map_err(|e| ApiError::from_glpi(&cid.0, e))?;

    metrics::counter!("dashboard_requests_total", "endpoint" => "metrics").increment(1);
    Ok(envelope(data, started, &cid.0))
}

/// Alias kept for dashboards that call the filtered path explicitly.
#[utoipa::path(
    get,
    path = "/api/metrics/filtered",
    tag = "metrics",
    params(MetricsQuery),
    responses((status = 200, description = "Dashboard metrics"))
)]
pub async fn metrics_filtered(
    state: State<AppState>,
    cid: Extension<CorrelationId>,
    query: Query<MetricsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    metrics(state, cid, query).await
}
