//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use super::middleware::{self, AllowedOrigins};
use super::routes::{health, metrics, prometheus, ranking, status, tickets};
use crate::data::cache::CacheService;
use crate::domain::dashboard::DashboardService;
use crate::domain::ranking::RankingService;
use crate::domain::tickets::TicketService;
use crate::glpi::session::SessionManager;
use crate::glpi::status::StatusProbe;

/// Shared handler state: the engines plus the metrics handle.
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<DashboardService>,
    pub ranking: Arc<RankingService>,
    pub tickets: Arc<TicketService>,
    pub probe: Arc<StatusProbe>,
    pub session: Arc<SessionManager>,
    pub cache: Arc<CacheService>,
    pub prometheus: PrometheusHandle,
}

/// Build the service router with all middleware layers.
pub fn router(state: AppState, allowed: &AllowedOrigins) -> Router {
    Router::new()
        .route("/api/metrics", get(metrics::metrics))
        .route("/api/metrics/filtered", get(metrics::metrics_filtered))
        .route("/api/ranking", get(ranking::ranking))
        .route("/api/tickets/new", get(tickets::new_tickets))
        .route("/api/ticket/{id}", get(tickets::ticket))
        .route("/api/status", get(status::status))
        .route("/health", get(health::health))
        .route("/metrics", get(prometheus::metrics_exposition))
        .route("/api/openapi.json", get(super::openapi::openapi_json))
        .fallback(middleware::handle_404)
        .layer(axum::middleware::from_fn(middleware::correlation_middleware))
        .layer(middleware::cors(allowed))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}

pub struct ApiServer {
    state: AppState,
    host: String,
    port: u16,
}

impl ApiServer {
    pub fn new(state: AppState, host: String, port: u16) -> Self {
        Self { state, host, port }
    }

    /// Serve until the shutdown signal fires.
    pub async fn start(self, mut shutdown: tokio::sync::watch::Receiver<bool>) -> Result<()> {
        let allowed = AllowedOrigins::new(&self.host, self.port);
        let app = router(self.state, &allowed);

        let addr = SocketAddr::new(self.host.parse()?, self.port);
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "API server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await?;

        Ok(())
    }
}
