//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

use crate::api::{ApiServer, AppState};
use crate::core::cli::{self, Cli};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::cache::CacheService;
use crate::domain::aggregate::AggregateEngine;
use crate::domain::dashboard::DashboardService;
use crate::domain::ranking::RankingService;
use crate::domain::tickets::TicketService;
use crate::glpi::fields::FieldRegistry;
use crate::glpi::http::GlpiClient;
use crate::glpi::names::NameResolver;
use crate::glpi::session::SessionManager;
use crate::glpi::status::StatusProbe;

pub struct CoreApp {
    pub config: AppConfig,
    pub state: AppState,
    pub shutdown: ShutdownService,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        let cli = cli::parse();
        Self::init_logging(&cli);

        tracing::debug!(app = APP_NAME, "Application starting");

        let app = Self::init(&cli)?;
        Self::start_server(app).await
    }

    fn init_logging(cli: &Cli) {
        let filter = cli
            .log
            .clone()
            .or_else(|| std::env::var(ENV_LOG).ok())
            .unwrap_or_else(|| "info".to_string());

        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_target(false)
            .init();
    }

    fn init(cli: &Cli) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let prometheus = Self::init_metrics()?;

        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        let session = Arc::new(SessionManager::new(
            http.clone(),
            config.glpi.clone(),
            config.timeouts.fast,
        ));
        let client = Arc::new(GlpiClient::new(
            http.clone(),
            config.glpi.base_url.clone(),
            session.clone(),
            config.timeouts,
        ));

        let cache = Arc::new(CacheService::new(&config.cache));
        tracing::debug!(backend = cache.backend_name(), "Cache initialized");

        let fields = Arc::new(FieldRegistry::new(
            client.clone(),
            cache.clone(),
            config.cache.field_ids_ttl,
        ));
        let names = Arc::new(NameResolver::new(
            client.clone(),
            cache.clone(),
            config.cache.names_ttl,
        ));

        let aggregate = Arc::new(AggregateEngine::new(
            client.clone(),
            fields.clone(),
            config.level_groups,
            config.level_date_field,
        ));
        let dashboard = Arc::new(DashboardService::new(
            client.clone(),
            fields.clone(),
            cache.clone(),
            aggregate,
            config.cache.dashboard_ttl,
        ));
        let ranking = Arc::new(RankingService::new(
            client.clone(),
            fields.clone(),
            cache.clone(),
            config.level_groups,
            config.tech_level_names.clone(),
            config.cache.ranking_ttl,
            config.cache.tech_metrics_ttl,
        ));
        let tickets = Arc::new(TicketService::new(client.clone(), fields, names));
        let probe = Arc::new(StatusProbe::new(
            http,
            config.glpi.base_url.clone(),
            session.clone(),
        ));

        let shutdown = ShutdownService::new(session.clone());

        let state = AppState {
            dashboard,
            ranking,
            tickets,
            probe,
            session,
            cache,
            prometheus,
        };

        Ok(Self {
            config,
            state,
            shutdown,
        })
    }

    fn init_metrics() -> Result<PrometheusHandle> {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder)
            .map_err(|e| anyhow::anyhow!("Failed to install metrics recorder: {}", e))?;
        Ok(handle)
    }

    async fn start_server(app: CoreApp) -> Result<()> {
        let shutdown = app.shutdown.clone();
        let server = ApiServer::new(
            app.state,
            app.config.server.host.clone(),
            app.config.server.port,
        );

        let signal_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                signal_shutdown.trigger();
            }
        });

        server.start(shutdown.subscribe()).await?;
        shutdown.shutdown().await;
        Ok(())
    }
}
