//! Prometheus exposition endpoint

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::api::server::AppState;

/// Prometheus text exposition of the service's metrics
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "observability",
    responses((status = 200, description = "Prometheus text exposition"))
)]
pub async fn metrics_exposition(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus.render(),
    )
}
