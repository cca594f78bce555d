//! OpenAPI specification

use axum::response::{IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{health, metrics, prometheus, ranking, status, tickets};
use crate::domain::types::{
    Buckets, DashboardMetrics, FiltersApplied, LevelMetrics, NewTicket, Niveis, PartyRef, Priority,
    SupportLevel, Technician, TicketDetail, TicketMetrics, TicketStatus, TimeTracking, Trends,
};
use crate::glpi::status::{ProbeState, SystemStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "GLPI Dash API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Read-only metrics aggregation service for GLPI"
    ),
    tags(
        (name = "metrics", description = "Dashboard metrics"),
        (name = "ranking", description = "Technician ranking"),
        (name = "tickets", description = "Ticket listings and detail"),
        (name = "status", description = "GLPI liveness probe"),
        (name = "health", description = "Service health"),
        (name = "observability", description = "Prometheus exposition")
    ),
    paths(
        metrics::metrics,
        metrics::metrics_filtered,
        ranking::ranking,
        tickets::new_tickets,
        tickets::ticket,
        status::status,
        health::health,
        prometheus::metrics_exposition,
    ),
    components(schemas(
        DashboardMetrics,
        Niveis,
        LevelMetrics,
        Buckets,
        TicketMetrics,
        Trends,
        FiltersApplied,
        SupportLevel,
        TicketStatus,
        Priority,
        Technician,
        NewTicket,
        TicketDetail,
        PartyRef,
        TimeTracking,
        SystemStatus,
        ProbeState,
    ))
)]
pub struct ApiDoc;

/// Serve the OpenAPI document as JSON
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_all_endpoints() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/api/metrics",
            "/api/metrics/filtered",
            "/api/ranking",
            "/api/tickets/new",
            "/api/ticket/{id}",
            "/api/status",
            "/health",
            "/metrics",
        ] {
            assert!(
                paths.iter().any(|p| *p == expected),
                "missing path {}",
                expected
            );
        }
    }
}
