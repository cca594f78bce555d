//! HTTP surface
//!
//! Per-endpoint orchestration plus the response envelope. Routing, CORS,
//! correlation ids, and the Prometheus exposition live here; everything
//! else is delegated to the domain engines.

pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod types;

pub use middleware::AllowedOrigins;
pub use server::{ApiServer, AppState};
