//! New-tickets listing and single-ticket detail

use std::time::Instant;

use axum::Extension;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::api::middleware::CorrelationId;
use crate::api::server::AppState;
use crate::api::types::{ApiError, envelope, validation_messages};
use crate::domain::tickets::NewTicketsParams;
use crate::glpi::search;

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct NewTicketsQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, message = "must be >= 1"))]
    pub limit: usize,
    /// Priority name, e.g. `Alta`
    pub priority: Option<String>,
    pub category: Option<String>,
    /// Technician id
    pub technician: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Most recent tickets in status New
#[utoipa::path(
    get,
    path = "/api/tickets/new",
    tag = "tickets",
    params(NewTicketsQuery),
    responses(
        (status = 200, description = "New tickets, newest first"),
        (status = 400, description = "Invalid filter"),
    )
)]
pub async fn new_tickets(
    State(state): State<AppState>,
    Extension(cid): Extension<CorrelationId>,
    Query(query): Query<NewTicketsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();

    query.validate().map_err(|e| {
        ApiError::bad_request(&cid.0, "limit must be positive", validation_messages(&e))
    })?;
    // Date validation happens here; the listing itself never errors.
    search::date_criteria(query.start_date.as_deref(), query.end_date.as_deref(), "15", 0)
        .map_err(|e| ApiError::from_glpi(&cid.0, e))?;

    let params = NewTicketsParams {
        limit: query.limit,
        priority: query.priority,
        category: query.category,
        technician: query.technician,
        start: query.start_date,
        end: query.end_date,
    };

    let data = state.tickets.new_tickets(&params).await;
    metrics::counter!("dashboard_requests_total", "endpoint" => "tickets_new").increment(1);
    Ok(envelope(data, started, &cid.0))
}

/// Single ticket with expanded dropdowns
#[utoipa::path(
    get,
    path = "/api/ticket/{id}",
    tag = "tickets",
    params(("id" = String, Path, description = "Ticket id")),
    responses(
        (status = 200, description = "Ticket detail"),
        (status = 400, description = "Invalid id"),
        (status = 404, description = "Ticket not found"),
    )
)]
pub async fn ticket(
    State(state): State<AppState>,
    Extension(cid): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();

    let detail = state
        .tickets
        .ticket(&id)
        .await
        .map_err(|e| ApiError::from_glpi(&cid.0, e))?;

    match detail {
        Some(ticket) => {
            metrics::counter!("dashboard_requests_total", "endpoint" => "ticket").increment(1);
            Ok(envelope(ticket, started, &cid.0))
        }
        None => Err(ApiError::not_found(
            &cid.0,
            format!("Ticket {} não encontrado", id),
        )),
    }
}
