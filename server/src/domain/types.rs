//! Domain model
//!
//! Support levels, ticket statuses, priorities, and the response shapes the
//! dashboard consumes. Wire field names are Portuguese where the dashboard
//! contract says so (`novos`, `niveis`, `tendencias`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core::config::LevelGroups;

// =============================================================================
// Support Level
// =============================================================================

/// Support tiers N1..N4, materialised in GLPI as four groups. `Unknown`
/// absorbs tickets whose hierarchy text carries no recognised marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum SupportLevel {
    N1,
    N2,
    N3,
    N4,
    Unknown,
}

impl SupportLevel {
    /// The four concrete levels, in rank order.
    pub const CONCRETE: [SupportLevel; 4] = [
        SupportLevel::N1,
        SupportLevel::N2,
        SupportLevel::N3,
        SupportLevel::N4,
    ];

    /// Hierarchy marker as it appears in GLPI field-8 text.
    pub fn marker(self) -> &'static str {
        match self {
            SupportLevel::N1 => "N1",
            SupportLevel::N2 => "N2",
            SupportLevel::N3 => "N3",
            SupportLevel::N4 => "N4",
            SupportLevel::Unknown => "",
        }
    }

    /// First level whose marker occurs in the given hierarchy text.
    pub fn from_hierarchy(text: &str) -> SupportLevel {
        Self::CONCRETE
            .into_iter()
            .find(|level| text.contains(level.marker()))
            .unwrap_or(SupportLevel::Unknown)
    }

    pub fn from_marker(marker: &str) -> Option<SupportLevel> {
        match marker {
            "N1" => Some(SupportLevel::N1),
            "N2" => Some(SupportLevel::N2),
            "N3" => Some(SupportLevel::N3),
            "N4" => Some(SupportLevel::N4),
            _ => None,
        }
    }

    /// Configured GLPI group id backing this level.
    pub fn group_id(self, groups: &LevelGroups) -> Option<u32> {
        match self {
            SupportLevel::N1 => Some(groups.n1),
            SupportLevel::N2 => Some(groups.n2),
            SupportLevel::N3 => Some(groups.n3),
            SupportLevel::N4 => Some(groups.n4),
            SupportLevel::Unknown => None,
        }
    }

    /// Level owning the given GLPI group id, if any.
    pub fn from_group_id(groups: &LevelGroups, group_id: u32) -> Option<SupportLevel> {
        Self::CONCRETE
            .into_iter()
            .find(|level| level.group_id(groups) == Some(group_id))
    }
}

// =============================================================================
// Ticket Status
// =============================================================================

/// GLPI ticket status, with its fixed ordinal binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum TicketStatus {
    New,
    Assigned,
    Planned,
    Pending,
    Solved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 6] = [
        TicketStatus::New,
        TicketStatus::Assigned,
        TicketStatus::Planned,
        TicketStatus::Pending,
        TicketStatus::Solved,
        TicketStatus::Closed,
    ];

    pub fn id(self) -> i64 {
        match self {
            TicketStatus::New => 1,
            TicketStatus::Assigned => 2,
            TicketStatus::Planned => 3,
            TicketStatus::Pending => 4,
            TicketStatus::Solved => 5,
            TicketStatus::Closed => 6,
        }
    }

    pub fn from_id(id: i64) -> Option<TicketStatus> {
        match id {
            1 => Some(TicketStatus::New),
            2 => Some(TicketStatus::Assigned),
            3 => Some(TicketStatus::Planned),
            4 => Some(TicketStatus::Pending),
            5 => Some(TicketStatus::Solved),
            6 => Some(TicketStatus::Closed),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TicketStatus::New => "Novo",
            TicketStatus::Assigned => "Processando (atribuído)",
            TicketStatus::Planned => "Processando (planejado)",
            TicketStatus::Pending => "Pendente",
            TicketStatus::Solved => "Solucionado",
            TicketStatus::Closed => "Fechado",
        }
    }
}

/// Portuguese label for a raw status id; unknown ids get a generic label.
pub fn status_label(id: i64) -> &'static str {
    TicketStatus::from_id(id).map_or("desconhecido", TicketStatus::label)
}

// =============================================================================
// Priority
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Priority {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
    Critical,
}

impl Priority {
    pub fn id(self) -> i64 {
        match self {
            Priority::VeryLow => 1,
            Priority::Low => 2,
            Priority::Medium => 3,
            Priority::High => 4,
            Priority::VeryHigh => 5,
            Priority::Critical => 6,
        }
    }

    pub fn from_id(id: i64) -> Option<Priority> {
        match id {
            1 => Some(Priority::VeryLow),
            2 => Some(Priority::Low),
            3 => Some(Priority::Medium),
            4 => Some(Priority::High),
            5 => Some(Priority::VeryHigh),
            6 => Some(Priority::Critical),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::VeryLow => "Muito Baixa",
            Priority::Low => "Baixa",
            Priority::Medium => "Média",
            Priority::High => "Alta",
            Priority::VeryHigh => "Muito Alta",
            Priority::Critical => "Crítica",
        }
    }

    /// Reverse lookup by Portuguese label, for the priority filter.
    pub fn from_label(label: &str) -> Option<Priority> {
        let lower = label.trim().to_lowercase();
        [
            Priority::VeryLow,
            Priority::Low,
            Priority::Medium,
            Priority::High,
            Priority::VeryHigh,
            Priority::Critical,
        ]
        .into_iter()
        .find(|p| p.label().to_lowercase() == lower)
    }
}

/// Portuguese label for a raw priority id; unknown ids read as normal.
pub fn priority_label(id: i64) -> &'static str {
    Priority::from_id(id).map_or("normal", Priority::label)
}

// =============================================================================
// Ticket Metrics
// =============================================================================

/// Per-status ticket counts. The six statuses are always all present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TicketMetrics {
    pub new: u64,
    pub assigned: u64,
    pub planned: u64,
    pub pending: u64,
    pub solved: u64,
    pub closed: u64,
}

impl TicketMetrics {
    pub fn get(&self, status: TicketStatus) -> u64 {
        match status {
            TicketStatus::New => self.new,
            TicketStatus::Assigned => self.assigned,
            TicketStatus::Planned => self.planned,
            TicketStatus::Pending => self.pending,
            TicketStatus::Solved => self.solved,
            TicketStatus::Closed => self.closed,
        }
    }

    pub fn set(&mut self, status: TicketStatus, count: u64) {
        match status {
            TicketStatus::New => self.new = count,
            TicketStatus::Assigned => self.assigned = count,
            TicketStatus::Planned => self.planned = count,
            TicketStatus::Pending => self.pending = count,
            TicketStatus::Solved => self.solved = count,
            TicketStatus::Closed => self.closed = count,
        }
    }

    pub fn increment(&mut self, status: TicketStatus) {
        self.set(status, self.get(status) + 1);
    }

    pub fn total(&self) -> u64 {
        TicketStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }

    // Derived buckets

    pub fn novos(&self) -> u64 {
        self.new
    }

    pub fn progresso(&self) -> u64 {
        self.assigned + self.planned
    }

    pub fn pendentes(&self) -> u64 {
        self.pending
    }

    pub fn resolvidos(&self) -> u64 {
        self.solved + self.closed
    }
}

// =============================================================================
// Dashboard shapes
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LevelMetrics {
    pub level: SupportLevel,
    #[serde(flatten)]
    pub buckets: Buckets,
    pub tecnicos: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo_medio_resolucao: Option<f64>,
}

/// Derived status buckets as the dashboard consumes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Buckets {
    pub novos: u64,
    pub progresso: u64,
    pub pendentes: u64,
    pub resolvidos: u64,
    pub total: u64,
}

impl From<&TicketMetrics> for Buckets {
    fn from(metrics: &TicketMetrics) -> Self {
        Self {
            novos: metrics.novos(),
            progresso: metrics.progresso(),
            pendentes: metrics.pendentes(),
            resolvidos: metrics.resolvidos(),
            total: metrics.total(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Niveis {
    pub geral: Buckets,
    pub n1: LevelMetrics,
    pub n2: LevelMetrics,
    pub n3: LevelMetrics,
    pub n4: LevelMetrics,
}

/// Percent change of each bucket against the previous window, one decimal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Trends {
    pub novos: f64,
    pub pendentes: f64,
    pub progresso: f64,
    pub resolvidos: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FiltersApplied {
    pub data_inicio: Option<String>,
    pub data_fim: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardMetrics {
    pub novos: u64,
    pub pendentes: u64,
    pub progresso: u64,
    pub resolvidos: u64,
    pub total: u64,
    pub niveis: Niveis,
    pub tendencias: Trends,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtros_aplicados: Option<FiltersApplied>,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Technician ranking
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Technician {
    /// GLPI user id, decimal string
    pub id: String,
    pub name: String,
    pub level: SupportLevel,
    pub ticket_count: u64,
    pub resolved_count: u64,
    pub pending_count: u64,
    pub rank: u32,
}

/// Per-technician totals, cached independently of the assembled ranking.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct TechnicianMetrics {
    pub total: u64,
    pub resolved: u64,
    pub pending: u64,
}

// =============================================================================
// Ticket listings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewTicket {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: String,
    pub requester: String,
    pub priority: String,
    pub category: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PartyRef {
    pub id: String,
    pub name: String,
}

/// Time-tracking figures in seconds, as GLPI reports them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct TimeTracking {
    pub total: u64,
    pub waiting: u64,
    pub solve_delay: u64,
    pub close_delay: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketDetail {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub status: String,
    pub priority: String,
    pub category: String,
    #[serde(rename = "type")]
    pub ticket_type: String,
    pub urgency: String,
    pub impact: String,
    pub source: String,
    pub location: String,
    pub entity: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solve_date: Option<String>,
    pub requester: PartyRef,
    pub technician: PartyRef,
    pub group: PartyRef,
    pub time_tracking: TimeTracking,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ordinals_are_fixed() {
        assert_eq!(TicketStatus::New.id(), 1);
        assert_eq!(TicketStatus::Closed.id(), 6);
        assert_eq!(TicketStatus::from_id(4), Some(TicketStatus::Pending));
        assert_eq!(TicketStatus::from_id(7), None);
        assert_eq!(TicketStatus::from_id(0), None);
    }

    #[test]
    fn status_labels() {
        assert_eq!(status_label(1), "Novo");
        assert_eq!(status_label(2), "Processando (atribuído)");
        assert_eq!(status_label(99), "desconhecido");
    }

    #[test]
    fn priority_labels_and_reverse_lookup() {
        assert_eq!(priority_label(4), "Alta");
        assert_eq!(priority_label(0), "normal");
        assert_eq!(Priority::from_label("Alta"), Some(Priority::High));
        assert_eq!(Priority::from_label("alta"), Some(Priority::High));
        assert_eq!(Priority::from_label("urgente"), None);
    }

    #[test]
    fn hierarchy_markers_resolve_levels() {
        assert_eq!(
            SupportLevel::from_hierarchy("DTIC > N2 > Redes"),
            SupportLevel::N2
        );
        assert_eq!(
            SupportLevel::from_hierarchy("Suporte geral"),
            SupportLevel::Unknown
        );
    }

    #[test]
    fn level_group_ids_follow_config() {
        let groups = LevelGroups::default();
        assert_eq!(SupportLevel::N3.group_id(&groups), Some(91));
        assert_eq!(SupportLevel::Unknown.group_id(&groups), None);
        assert_eq!(
            SupportLevel::from_group_id(&groups, 92),
            Some(SupportLevel::N4)
        );
        assert_eq!(SupportLevel::from_group_id(&groups, 50), None);
    }

    #[test]
    fn bucket_derivation() {
        let metrics = TicketMetrics {
            new: 10,
            assigned: 3,
            planned: 2,
            pending: 5,
            solved: 7,
            closed: 8,
        };
        assert_eq!(metrics.total(), 35);
        assert_eq!(metrics.novos(), 10);
        assert_eq!(metrics.progresso(), 5);
        assert_eq!(metrics.pendentes(), 5);
        assert_eq!(metrics.resolvidos(), 15);

        let buckets = Buckets::from(&metrics);
        assert_eq!(buckets.total, 35);
        assert_eq!(buckets.resolvidos, 15);
    }

    #[test]
    fn metrics_increment_by_status() {
        let mut metrics = TicketMetrics::default();
        metrics.increment(TicketStatus::Solved);
        metrics.increment(TicketStatus::Solved);
        metrics.increment(TicketStatus::New);
        assert_eq!(metrics.solved, 2);
        assert_eq!(metrics.new, 1);
        assert_eq!(metrics.total(), 3);
    }
}
