//! GLPI status probe endpoint

use std::time::Instant;

use axum::Extension;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::api::middleware::CorrelationId;
use crate::api::server::AppState;
use crate::api::types::envelope;

/// Cheap GLPI liveness probe
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "status",
    responses((status = 200, description = "Upstream status"))
)]
pub async fn status(
    State(state): State<AppState>,
    Extension(cid): Extension<CorrelationId>,
) -> impl IntoResponse {
    let started = Instant::now();
    let probe = state.probe.probe().await;
    envelope(probe, started, &cid.0)
}
