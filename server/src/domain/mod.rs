//! Aggregation engines
//!
//! The domain layer turns GLPI search results into the dashboard's shapes:
//! per-level counts, technician ranking, dashboard snapshots with trends,
//! and ticket listings.

pub mod aggregate;
pub mod dashboard;
pub mod ranking;
pub mod tickets;
pub mod trends;
pub mod types;

pub use aggregate::AggregateEngine;
pub use dashboard::DashboardService;
pub use ranking::{RankingParams, RankingService};
pub use tickets::{NewTicketsParams, TicketService};
pub use types::{
    DashboardMetrics, NewTicket, SupportLevel, Technician, TicketDetail, TicketStatus,
};
