//! Authenticated GLPI request pipeline
//!
//! Every outbound call funnels through `GlpiClient::request`: auth headers
//! come from the session manager, timeouts are picked per endpoint class,
//! transport failures and 5xx responses are retried with capped backoff,
//! and 401/403 responses invalidate the session and retry on a separate
//! budget. Correlation ids travel in the caller's tracing span, so every
//! event emitted here carries them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Method, Response};

use super::error::GlpiError;
use super::session::SessionManager;
use crate::core::config::TimeoutConfig;
use crate::core::constants::{
    AUTH_BACKOFF_CAP_SECS, MAX_RETRIES, RETRY_BACKOFF_CAP_SECS, SLOW_RESPONSE_SECS,
};
use crate::utils::retry::backoff_delay;

pub struct GlpiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionManager>,
    timeouts: TimeoutConfig,
}

impl GlpiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        session: Arc<SessionManager>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            timeouts,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET convenience wrapper.
    pub async fn get(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Response, GlpiError> {
        self.request(Method::GET, path, params).await
    }

    /// GET a JSON body, mapping non-2xx statuses to `Http` errors.
    pub async fn get_json(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, GlpiError> {
        let response = self.get(path, params).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GlpiError::Http {
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| GlpiError::Decode(e.to_string()))
    }

    /// Issue an authenticated request.
    ///
    /// The final response is returned whatever its status code; the caller
    /// inspects it. An `Err` means invalid input, an unrecoverable auth
    /// failure, or exhausted transport retries.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Response, GlpiError> {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Err(GlpiError::InvalidArgument("empty request path".to_string()));
        }

        let url = format!("{}/{}", self.base_url, path);
        let timeout = self.timeout_for(path);
        let label = endpoint_label(path);

        let mut attempt = 0u32; // transport retries
        let mut auth_attempt = 0u32; // 401/403 retries, budgeted separately

        loop {
            let headers = self.session.headers().await?;

            let mut builder = self
                .http
                .request(method.clone(), url.as_str())
                .timeout(timeout)
                .query(params);
            for (name, value) in &headers {
                builder = builder.header(*name, value.as_str());
            }

            let started = Instant::now();
            let result = builder.send().await;
            let elapsed = started.elapsed();

            metrics::histogram!("glpi_request_duration_seconds", "endpoint" => label.clone())
                .record(elapsed.as_secs_f64());
            if elapsed.as_secs_f64() > SLOW_RESPONSE_SECS {
                tracing::warn!(
                    endpoint = %label,
                    elapsed_ms = elapsed.as_millis() as u64,
                    attempt,
                    "Slow GLPI response"
                );
            }

            match result {
                Ok(response) => {
                    let status = response.status();

                    if status.as_u16() == 401 || status.as_u16() == 403 {
                        self.session.invalidate().await;
                        auth_attempt += 1;
                        if auth_attempt >= MAX_RETRIES {
                            tracing::warn!(endpoint = %label, status = status.as_u16(),
                                "Auth retries exhausted");
                            return Ok(response);
                        }
                        tracing::warn!(endpoint = %label, status = status.as_u16(),
                            auth_attempt, "Session rejected, re-authenticating");
                        tokio::time::sleep(backoff_delay(auth_attempt - 1, AUTH_BACKOFF_CAP_SECS))
                            .await;
                        continue;
                    }

                    if status.is_server_error() {
                        attempt += 1;
                        metrics::counter!("glpi_request_retries_total", "endpoint" => label.clone())
                            .increment(1);
                        if attempt >= MAX_RETRIES {
                            return Ok(response);
                        }
                        tracing::warn!(endpoint = %label, status = status.as_u16(), attempt,
                            "GLPI server error, retrying");
                        tokio::time::sleep(backoff_delay(attempt - 1, RETRY_BACKOFF_CAP_SECS))
                            .await;
                        continue;
                    }

                    tracing::debug!(
                        method = %method,
                        endpoint = %label,
                        status = status.as_u16(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        attempt,
                        "GLPI request complete"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    let error = GlpiError::from(e);
                    attempt += 1;
                    metrics::counter!("glpi_request_retries_total", "endpoint" => label.clone())
                        .increment(1);
                    if attempt >= MAX_RETRIES || !error.is_retryable() {
                        return Err(error);
                    }
                    tracing::warn!(endpoint = %label, error = %error, attempt,
                        "GLPI transport error, retrying");
                    tokio::time::sleep(backoff_delay(attempt - 1, RETRY_BACKOFF_CAP_SECS)).await;
                }
            }
        }
    }

    /// Timeout class by endpoint path: session control and the status probe
    /// are fast; search-shaped queries are slow; everything else default.
    fn timeout_for(&self, path: &str) -> Duration {
        if path.starts_with("initSession")
            || path.starts_with("killSession")
            || path.starts_with("getGlpiConfig")
            || path.starts_with("status")
        {
            self.timeouts.fast
        } else if path.contains("search") || path.contains("report") || path.contains("listSearchOptions")
        {
            self.timeouts.slow
        } else {
            self.timeouts.default
        }
    }
}

/// Low-cardinality endpoint label for metrics: `search/Ticket` keeps its
/// item type, everything else is reduced to the first path segment.
fn endpoint_label(path: &str) -> String {
    let mut segments = path.split('/');
    let first = segments.next().unwrap_or_default();
    if first == "search" || first == "listSearchOptions" {
        match segments.next() {
            Some(item) => format!("{}/{}", first, item),
            None => first.to_string(),
        }
    } else {
        first.to_string()
    }
}
