//! GLPI session lifecycle
//!
//! A session token is acquired from `initSession`, held for up to an hour,
//! renewed five minutes before expiry, and released on shutdown. All state
//! transitions serialise on one mutex, so concurrent callers observe the
//! same token and exactly one authentication runs per expiry cycle.

use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;

use super::error::GlpiError;
use crate::core::config::GlpiConfig;
use crate::core::constants::{
    MAX_RETRIES, RETRY_BACKOFF_CAP_SECS, SESSION_RENEW_BUFFER_SECS, SESSION_TTL_SECS,
};
use crate::utils::retry::retry_with_backoff;

#[derive(Debug, Clone)]
struct Session {
    token: String,
    created_at: SystemTime,
}

impl Session {
    /// A session is invalid once it is within the renewal buffer of expiry,
    /// or when its creation time sits in the future (clock skew).
    fn is_valid(&self) -> bool {
        let now = SystemTime::now();
        let Ok(age) = now.duration_since(self.created_at) else {
            return false;
        };
        age < Duration::from_secs(SESSION_TTL_SECS - SESSION_RENEW_BUFFER_SECS)
    }
}

pub struct SessionManager {
    http: reqwest::Client,
    config: GlpiConfig,
    auth_timeout: Duration,
    state: Mutex<Option<Session>>,
}

impl SessionManager {
    pub fn new(http: reqwest::Client, config: GlpiConfig, auth_timeout: Duration) -> Self {
        Self {
            http,
            config,
            auth_timeout,
            state: Mutex::new(None),
        }
    }

    /// Auth headers for an upstream request, authenticating first if the
    /// session is missing or stale. Callers arriving during authentication
    /// block until it completes.
    pub async fn headers(&self) -> Result<Vec<(&'static str, String)>, GlpiError> {
        let mut state = self.state.lock().await;

        let token = match state.as_ref() {
            Some(session) if session.is_valid() => session.token.clone(),
            _ => {
                let session = retry_with_backoff(MAX_RETRIES, RETRY_BACKOFF_CAP_SECS, || {
                    self.authenticate()
                })
                .await?;
                let token = session.token.clone();
                *state = Some(session);
                token
            }
        };

        Ok(vec![
            ("Session-Token", token),
            ("App-Token", self.config.app_token.clone()),
        ])
    }

    /// Drop the current session so the next caller re-authenticates.
    /// Idempotent.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if state.take().is_some() {
            tracing::debug!("GLPI session invalidated");
        }
    }

    /// Whether a live, non-stale token is currently held. Never triggers
    /// authentication.
    pub async fn is_valid(&self) -> bool {
        self.state
            .lock()
            .await
            .as_ref()
            .is_some_and(Session::is_valid)
    }

    /// Auth headers only if a valid session already exists; never triggers
    /// authentication. Used by the status probe to stay cheap.
    pub async fn current_headers(&self) -> Option<Vec<(&'static str, String)>> {
        let state = self.state.lock().await;
        let session = state.as_ref().filter(|s| s.is_valid())?;
        Some(vec![
            ("Session-Token", session.token.clone()),
            ("App-Token", self.config.app_token.clone()),
        ])
    }

    /// Release the session via `killSession`. Best effort: failures are
    /// logged and swallowed, the local state is cleared either way.
    pub async fn kill(&self) {
        let mut state = self.state.lock().await;
        let Some(session) = state.take() else {
            return;
        };

        let result = self
            .http
            .get(format!("{}/killSession", self.config.base_url))
            .header("Session-Token", session.token.as_str())
            .header("App-Token", self.config.app_token.as_str())
            .timeout(self.auth_timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("GLPI session released")
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "killSession returned an error")
            }
            Err(e) => tracing::warn!(error = %e, "killSession failed"),
        }
    }

    async fn authenticate(&self) -> Result<Session, GlpiError> {
        tracing::debug!("Authenticating against GLPI");

        let response = self
            .http
            .get(format!("{}/initSession", self.config.base_url))
            .header("Content-Type", "application/json")
            .header("App-Token", self.config.app_token.as_str())
            .header(
                "Authorization",
                format!("user_token {}", self.config.user_token),
            )
            .timeout(self.auth_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GlpiError::AuthFailure(format!(
                "initSession returned {}",
                status
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GlpiError::Decode(format!("initSession body: {}", e)))?;
        let token = body
            .get("session_token")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                GlpiError::AuthFailure("initSession response missing session_token".to_string())
            })?;

        metrics::counter!("glpi_auth_refresh_total").increment(1);
        tracing::debug!("GLPI authentication succeeded");

        Ok(Session {
            token: token.to_string(),
            created_at: SystemTime::now(),
        })
    }

    #[cfg(test)]
    pub(crate) async fn force_session(&self, token: &str, created_at: SystemTime) {
        *self.state.lock().await = Some(Session {
            token: token.to_string(),
            created_at,
        });
    }
}
