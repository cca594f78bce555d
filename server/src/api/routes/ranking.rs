//! Technician ranking endpoint

use std::time::Instant;

use axum::Extension;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::api::middleware::CorrelationId;
use crate::api::server::AppState;
use crate::api::types::{ApiError, envelope, validation_messages};
use crate::domain::ranking::RankingParams;
use crate::domain::types::SupportLevel;

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct RankingQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Support level filter, `N1`..`N4`
    pub level: Option<String>,
    #[validate(range(min = 1, message = "must be >= 1"))]
    pub limit: Option<usize>,
    pub entity_id: Option<u64>,
}

/// Technicians ranked by ticket count
#[utoipa::path(
    get,
    path = "/api/ranking",
    tag = "ranking",
    params(RankingQuery),
    responses(
        (status = 200, description = "Ranked technicians"),
        (status = 400, description = "Invalid filter"),
    )
)]
pub async fn ranking(
    State(state): State<AppState>,
    Extension(cid): Extension<CorrelationId>,
    Query(query): Query<RankingQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();

    query.validate().map_err(|e| {
        ApiError::bad_request(&cid.0, "limit must be positive", validation_messages(&e))
    })?;

    let level = match query.level.as_deref() {
        None => None,
        Some(raw) => match SupportLevel::from_marker(&raw.trim().to_uppercase()) {
            Some(level) => Some(level),
            None => {
                return Err(ApiError::bad_request(
                    &cid.0,
                    format!("unknown level '{}'", raw),
                    vec!["level must be one of N1, N2, N3, N4".to_string()],
                ));
            }
        },
    };

    let params = RankingParams {
        start: query.start_date,
        end: query.end_date,
        level,
        limit: query.limit,
        entity: query.entity_id,
    };

    let data = state
        .ranking
        .rank(&params)
        .await
        .map_err(|e| ApiError::from_glpi(&cid.0, e))?;

    metrics::counter!("dashboard_requests_total", "endpoint" => "ranking").increment(1);
    Ok(envelope(data, started, &cid.0))
}
