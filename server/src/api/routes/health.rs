//! Service health endpoint

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::server::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthChecks {
    pub cache: &'static str,
    pub glpi_session: &'static str,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: HealthChecks,
    pub active_alerts: Vec<String>,
}

/// Process liveness. Cheap by design: no upstream round-trip.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let session = if state.session.is_valid().await {
        "valid"
    } else {
        "absent"
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            checks: HealthChecks {
                cache: state.cache.backend_name(),
                glpi_session: session,
            },
            active_alerts: Vec::new(),
        }),
    )
}
