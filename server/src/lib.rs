//! Read-only metrics aggregation service in front of a GLPI REST API.
//!
//! Translates expensive, paginated, weakly-typed GLPI search calls into
//! fast, consistent JSON responses for a dashboard UI. The process holds no
//! persistent state; everything is recomputed through a TTL cache.

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod glpi;
pub mod utils;
