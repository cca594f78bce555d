//! HTTP middleware (CORS, correlation ids, 404 handler)

use axum::extract::Request;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::Instrument;
use uuid::Uuid;

/// Correlation id attached to every request, readable by handlers through
/// request extensions.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Assign a correlation id, open a request span carrying it, and echo it in
/// the response headers. Incoming ids are honoured so callers can stitch
/// traces across services.
pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(CorrelationId(id.clone()));

    let span = tracing::info_span!("request", correlation_id = %id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

/// Allowed origins configuration
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    /// Origins derived from the host/port the dashboard UI is served from.
    pub fn new(host: &str, port: u16) -> Self {
        let mut origins = vec![format!("http://{}:{}", host, port)];

        if host == "127.0.0.1" || host == "localhost" {
            origins.push(format!("http://localhost:{}", port));
            origins.push(format!("http://127.0.0.1:{}", port));
            origins.push("http://localhost".to_string());
            origins.push("http://127.0.0.1".to_string());
        }

        Self { origins }
    }

    fn as_header_values(&self) -> Vec<HeaderValue> {
        self.origins.iter().filter_map(|o| o.parse().ok()).collect()
    }
}

/// Create the CORS layer. The service is read-only, so only GET (plus
/// preflight) is allowed.
pub fn cors(allowed: &AllowedOrigins) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed.as_header_values()))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
}

/// Handle 404 Not Found with debug logging
pub async fn handle_404(request: Request) -> impl IntoResponse {
    tracing::debug!(
        method = %request.method(),
        uri = %request.uri(),
        "No route matched"
    );
    StatusCode::NOT_FOUND
}
