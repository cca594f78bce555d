//! Shared API types
//!
//! Every endpoint answers with the same envelope: `success`, `data`, an
//! ISO-8601 UTC timestamp, the wall-clock execution time in milliseconds,
//! and the request's correlation id. Errors carry a human message plus a
//! detail list, and never leak internals.

use std::time::Instant;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use validator::ValidationErrors;

use crate::glpi::error::GlpiError;

/// Success envelope
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: T,
    /// ISO-8601 UTC
    pub timestamp: String,
    /// Wall-clock execution time in milliseconds
    pub tempo_execucao: f64,
    pub correlation_id: String,
}

/// Wrap a payload in the success envelope.
pub fn envelope<T: Serialize>(data: T, started: Instant, correlation_id: &str) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        tempo_execucao: started.elapsed().as_secs_f64() * 1000.0,
        correlation_id: correlation_id.to_string(),
    })
}

/// Standard API error, rendered as the error envelope.
#[derive(Debug)]
pub enum ApiError {
    BadRequest {
        message: String,
        errors: Vec<String>,
        correlation_id: String,
    },
    NotFound {
        message: String,
        correlation_id: String,
    },
    Internal {
        message: String,
        correlation_id: String,
    },
}

impl ApiError {
    pub fn bad_request(
        correlation_id: &str,
        message: impl Into<String>,
        errors: Vec<String>,
    ) -> Self {
        Self::BadRequest {
            message: message.into(),
            errors,
            correlation_id: correlation_id.to_string(),
        }
    }

    pub fn not_found(correlation_id: &str, message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        }
    }

    pub fn internal(correlation_id: &str, message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        }
    }

    /// Map an engine error without leaking upstream detail to clients.
    pub fn from_glpi(correlation_id: &str, error: GlpiError) -> Self {
        match error {
            GlpiError::InvalidArgument(message) => {
                Self::bad_request(correlation_id, message.clone(), vec![message])
            }
            GlpiError::AuthFailure(_)
            | GlpiError::Timeout(_)
            | GlpiError::Connection(_)
            | GlpiError::Http { .. } => {
                tracing::error!(correlation_id, error = %error, "Upstream failure");
                Self::internal(correlation_id, "Upstream unavailable")
            }
            GlpiError::Decode(_) => {
                tracing::error!(correlation_id, error = %error, "Upstream schema error");
                Self::internal(correlation_id, "Upstream returned unexpected data")
            }
        }
    }
}

/// Flatten validator output into the envelope's `errors` list.
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{}: {}", field, message),
                None => format!("{}: invalid value", field),
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
    errors: Vec<String>,
    correlation_id: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, errors, correlation_id) = match self {
            ApiError::BadRequest {
                message,
                errors,
                correlation_id,
            } => (StatusCode::BAD_REQUEST, message, errors, correlation_id),
            ApiError::NotFound {
                message,
                correlation_id,
            } => (StatusCode::NOT_FOUND, message, Vec::new(), correlation_id),
            ApiError::Internal {
                message,
                correlation_id,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                message,
                Vec::new(),
                correlation_id,
            ),
        };

        let body = ErrorEnvelope {
            success: false,
            error,
            errors,
            correlation_id,
        };
        (status, Json(body)).into_response()
    }
}
