//! GLPI liveness probe
//!
//! Deliberately cheap: reuses the current session token when one exists and
//! pings anonymously otherwise. It never triggers authentication, so a
//! status page cannot exhaust the auth budget of a struggling GLPI.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use utoipa::ToSchema;

use super::session::SessionManager;
use crate::core::constants::STATUS_PROBE_TIMEOUT_SECS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProbeState {
    Online,
    Warning,
    Offline,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemStatus {
    pub status: ProbeState,
    pub message: String,
    /// Probe round-trip in seconds, absent when the transport failed
    pub response_time: Option<f64>,
    pub token_valid: bool,
}

pub struct StatusProbe {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionManager>,
}

impl StatusProbe {
    pub fn new(http: reqwest::Client, base_url: String, session: Arc<SessionManager>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub async fn probe(&self) -> SystemStatus {
        let timeout = Duration::from_secs(STATUS_PROBE_TIMEOUT_SECS);
        let started = Instant::now();

        match self.session.current_headers().await {
            Some(headers) => {
                let mut builder = self
                    .http
                    .get(format!("{}/getGlpiConfig", self.base_url))
                    .timeout(timeout);
                for (name, value) in &headers {
                    builder = builder.header(*name, value.as_str());
                }
                Self::classify(builder.send().await, started, true, |status| {
                    if status == 200 {
                        (ProbeState::Online, "GLPI conectado e autenticado")
                    } else {
                        (ProbeState::Warning, "GLPI respondeu com status inesperado")
                    }
                })
            }
            None => {
                let result = self
                    .http
                    .get(format!("{}/", self.base_url))
                    .timeout(timeout)
                    .send()
                    .await;
                Self::classify(result, started, false, |status| {
                    // 401/403 still mean the server is up and answering.
                    if matches!(status, 200 | 401 | 403) {
                        (ProbeState::Online, "GLPI acessível")
                    } else {
                        (ProbeState::Warning, "GLPI respondeu com status inesperado")
                    }
                })
            }
        }
    }

    fn classify(
        result: Result<reqwest::Response, reqwest::Error>,
        started: Instant,
        token_valid: bool,
        map_status: impl Fn(u16) -> (ProbeState, &'static str),
    ) -> SystemStatus {
        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(response) => {
                let (status, message) = map_status(response.status().as_u16());
                SystemStatus {
                    status,
                    message: message.to_string(),
                    response_time: Some(elapsed),
                    token_valid,
                }
            }
            Err(e) if e.is_timeout() => SystemStatus {
                status: ProbeState::Warning,
                message: "GLPI demorou a responder".to_string(),
                response_time: Some(elapsed),
                token_valid,
            },
            Err(e) => SystemStatus {
                status: ProbeState::Offline,
                message: format!("Erro de conexão: {}", e),
                response_time: None,
                token_valid,
            },
        }
    }
}
