//! GLPI integration engine
//!
//! Session + token lifecycle, the authenticated request pipeline with
//! retry/backoff, dynamic field-id discovery, search-query construction,
//! polymorphic field parsing, name resolution, and the liveness probe.
//! Everything outbound funnels through [`http::GlpiClient`].

pub mod error;
pub mod fields;
pub mod http;
pub mod names;
pub mod parse;
pub mod search;
pub mod session;
pub mod status;

pub use error::GlpiError;
pub use fields::{FieldIds, FieldRegistry};
pub use http::GlpiClient;
pub use names::NameResolver;
pub use search::{Link, Order, SearchQuery, SearchType};
pub use session::SessionManager;
pub use status::{ProbeState, StatusProbe, SystemStatus};
