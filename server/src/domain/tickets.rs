//! Ticket listings and single-ticket detail
//!
//! The new-tickets listing is a best-effort view: any upstream failure
//! degrades to an empty list so the dashboard widget renders. Ticket detail
//! is stricter: absent tickets are `None`, invalid ids are rejected.

use std::sync::Arc;

use serde_json::Value;

use super::types::{NewTicket, PartyRef, Priority, TicketDetail, TimeTracking, priority_label, status_label};
use crate::glpi::error::GlpiError;
use crate::glpi::fields::FieldRegistry;
use crate::glpi::http::GlpiClient;
use crate::glpi::names::NameResolver;
use crate::glpi::parse::{int_value, technician_id};
use crate::glpi::search::{Link, Order, SearchQuery, SearchType};
use crate::utils::html::{extract_phone, format_description};

/// GLPI search-option id for the ticket category column.
const CATEGORY_FIELD: &str = "7";
/// GLPI search-option id for the requester column.
const REQUESTER_FIELD: &str = "4";
/// GLPI search-option id for the priority column.
const PRIORITY_FIELD: &str = "3";
/// GLPI search-option id for the description column.
const DESCRIPTION_FIELD: &str = "21";

#[derive(Debug, Clone)]
pub struct NewTicketsParams {
    pub limit: usize,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub technician: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl Default for NewTicketsParams {
    fn default() -> Self {
        Self {
            limit: 10,
            priority: None,
            category: None,
            technician: None,
            start: None,
            end: None,
        }
    }
}

pub struct TicketService {
    client: Arc<GlpiClient>,
    fields: Arc<FieldRegistry>,
    names: Arc<NameResolver>,
}

impl TicketService {
    pub fn new(client: Arc<GlpiClient>, fields: Arc<FieldRegistry>, names: Arc<NameResolver>) -> Self {
        Self {
            client,
            fields,
            names,
        }
    }

    /// The most recent tickets in status New, newest first. Upstream
    /// failures yield an empty list, never an error.
    pub async fn new_tickets(&self, params: &NewTicketsParams) -> Vec<NewTicket> {
        let fields = self.fields.field_ids().await;
        let tech_field = self.fields.tech_field_id().await;

        let mut query = SearchQuery::new()
            .is_deleted(false)
            .range(0, params.limit.saturating_sub(1))
            .sort(&fields.date_creation, Order::Desc)
            .force_display(&[
                "2",
                "1",
                DESCRIPTION_FIELD,
                &fields.date_creation,
                REQUESTER_FIELD,
                PRIORITY_FIELD,
                &fields.technician,
                CATEGORY_FIELD,
                &fields.status,
            ])
            .criterion(Link::And, &fields.status, SearchType::Equals, "1");

        if let Some(priority) = params.priority.as_deref() {
            match Priority::from_label(priority) {
                Some(p) => {
                    query = query.criterion(
                        Link::And,
                        PRIORITY_FIELD,
                        SearchType::Equals,
                        &p.id().to_string(),
                    );
                }
                None => tracing::warn!(priority, "Unknown priority name, ignoring filter"),
            }
        }
        if let Some(technician) = params.technician.as_deref() {
            query = query.criterion(Link::And, &tech_field, SearchType::Equals, technician);
        }
        if params.category.is_some() {
            // GLPI's search path offers no reliable category criterion for
            // this listing; categories are resolved for display only.
            tracing::debug!("Category filter requested, resolving names only");
        }
        let query = match query.date_range(
            params.start.as_deref(),
            params.end.as_deref(),
            &fields.date_creation,
        ) {
            Ok(q) => q,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid date filter for new tickets");
                return Vec::new();
            }
        };

        let body = match self.client.get_json("search/Ticket", query.params()).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "New-tickets search failed");
                return Vec::new();
            }
        };

        let rows = body
            .get("data")
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default();

        let mut tickets = Vec::with_capacity(rows.len());
        for row in &rows {
            tickets.push(self.map_row(row, &fields).await);
        }
        tickets
    }

    async fn map_row(&self, row: &Value, fields: &crate::glpi::fields::FieldIds) -> NewTicket {
        let requester = match row.get(REQUESTER_FIELD) {
            Some(value) => match technician_id(value) {
                Some(id) => self.names.user_name(&id).await,
                None => value
                    .as_str()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or("Não informado")
                    .to_string(),
            },
            None => "Não informado".to_string(),
        };

        let category = match row.get(CATEGORY_FIELD) {
            Some(Value::Number(n)) => self.names.category_name(&n.to_string()).await,
            Some(Value::String(s)) if !s.trim().is_empty() => {
                match s.trim().parse::<u64>() {
                    Ok(id) => self.names.category_name(&id.to_string()).await,
                    Err(_) => s.trim().to_string(),
                }
            }
            _ => "Não informado".to_string(),
        };

        NewTicket {
            id: stringify(row.get("2")),
            title: row
                .get("1")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .unwrap_or("Sem título")
                .to_string(),
            description: format_description(&stringify(row.get(DESCRIPTION_FIELD))),
            date: stringify(row.get(fields.date_creation.as_str())),
            requester,
            priority: priority_label(int_or(row.get(PRIORITY_FIELD), 3)).to_string(),
            category,
            status: "Novo".to_string(),
        }
    }

    /// One ticket with expanded dropdowns, or `None` when GLPI does not
    /// have it.
    pub async fn ticket(&self, id: &str) -> Result<Option<TicketDetail>, GlpiError> {
        let id = id.trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(GlpiError::InvalidArgument(format!(
                "invalid ticket id '{}'",
                id
            )));
        }

        let params = vec![
            ("expand_dropdowns".to_string(), "true".to_string()),
            ("with_devices".to_string(), "true".to_string()),
        ];
        let response = self.client.get(&format!("Ticket/{}", id), &params).await?;
        if !response.status().is_success() {
            tracing::debug!(id, status = response.status().as_u16(), "Ticket not available");
            return Ok(None);
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| GlpiError::Decode(e.to_string()))?;

        Ok(Some(self.map_detail(id, &payload).await))
    }

    async fn map_detail(&self, id: &str, payload: &Value) -> TicketDetail {
        let raw_description = stringify(payload.get("content"));
        let phone = {
            let extension = extract_phone(&raw_description);
            (!extension.is_empty()).then_some(extension)
        };

        let category = match payload.get("itilcategories_id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => self.names.category_name(&n.to_string()).await,
            _ => "Não informado".to_string(),
        };

        TicketDetail {
            id: id.to_string(),
            title: stringify(payload.get("name")),
            description: format_description(&raw_description),
            phone,
            status: status_label(int_or(payload.get("status"), 0)).to_string(),
            priority: priority_label(int_or(payload.get("priority"), 3)).to_string(),
            category,
            ticket_type: match int_or(payload.get("type"), 1) {
                2 => "Requisição".to_string(),
                _ => "Incidente".to_string(),
            },
            urgency: priority_label(int_or(payload.get("urgency"), 3)).to_string(),
            impact: priority_label(int_or(payload.get("impact"), 3)).to_string(),
            source: stringify(payload.get("requesttypes_id")),
            location: stringify(payload.get("locations_id")),
            entity: stringify(payload.get("entities_id")),
            created_at: stringify(payload.get("date")),
            updated_at: stringify(payload.get("date_mod")),
            due_date: non_empty_string(payload.get("time_to_resolve")),
            close_date: non_empty_string(payload.get("closedate")),
            solve_date: non_empty_string(payload.get("solvedate")),
            requester: self.user_party(payload.get("users_id_recipient")).await,
            technician: self.user_party(payload.get("users_id_tech")).await,
            group: group_party(payload.get("groups_id_tech")),
            time_tracking: TimeTracking {
                total: uint_or(payload.get("actiontime")),
                waiting: uint_or(payload.get("waiting_duration")),
                solve_delay: uint_or(payload.get("solve_delay_stat")),
                close_delay: uint_or(payload.get("close_delay_stat")),
            },
        }
    }

    /// Expanded dropdowns arrive as display names; raw payloads as ids.
    /// Both are accepted.
    async fn user_party(&self, value: Option<&Value>) -> PartyRef {
        match value {
            Some(Value::Number(n)) => {
                let id = n.to_string();
                let name = self.names.user_name(&id).await;
                PartyRef { id, name }
            }
            Some(Value::String(s)) if !s.trim().is_empty() => match s.trim().parse::<u64>() {
                Ok(id) => {
                    let id = id.to_string();
                    let name = self.names.user_name(&id).await;
                    PartyRef { id, name }
                }
                Err(_) => PartyRef {
                    id: String::new(),
                    name: s.trim().to_string(),
                },
            },
            _ => PartyRef::default(),
        }
    }
}

fn group_party(value: Option<&Value>) -> PartyRef {
    match value {
        Some(Value::Number(n)) => PartyRef {
            id: n.to_string(),
            name: String::new(),
        },
        Some(Value::String(s)) if !s.trim().is_empty() => PartyRef {
            id: String::new(),
            name: s.trim().to_string(),
        },
        _ => PartyRef::default(),
    }
}

fn stringify(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    let s = stringify(value);
    (!s.trim().is_empty()).then(|| s.trim().to_string())
}

fn int_or(value: Option<&Value>, default: i64) -> i64 {
    value.and_then(int_value).unwrap_or(default)
}

fn uint_or(value: Option<&Value>) -> u64 {
    value
        .and_then(int_value)
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{CacheConfig, GlpiConfig, TimeoutConfig};
    use crate::data::cache::CacheService;
    use crate::glpi::session::SessionManager;
    use std::time::Duration;

    fn service_for(server: &mockito::ServerGuard) -> TicketService {
        let http = reqwest::Client::new();
        let config = GlpiConfig {
            base_url: server.url(),
            app_token: "app".to_string(),
            user_token: "user".to_string(),
        };
        let session = Arc::new(SessionManager::new(
            http.clone(),
            config,
            Duration::from_secs(5),
        ));
        let client = Arc::new(GlpiClient::new(
            http,
            server.url(),
            session,
            TimeoutConfig {
                fast: Duration::from_secs(5),
                slow: Duration::from_secs(20),
                default: Duration::from_secs(12),
            },
        ));
        let cache = Arc::new(CacheService::new(&CacheConfig {
            max_entries: 100,
            dashboard_ttl: Duration::from_secs(180),
            ranking_ttl: Duration::from_secs(300),
            tech_metrics_ttl: Duration::from_secs(3600),
            field_ids_ttl: Duration::from_secs(1800),
            names_ttl: Duration::from_secs(3600),
        }));
        let fields = Arc::new(FieldRegistry::new(
            client.clone(),
            cache.clone(),
            Duration::from_secs(1800),
        ));
        let names = Arc::new(NameResolver::new(
            client.clone(),
            cache,
            Duration::from_secs(3600),
        ));
        TicketService::new(client, fields, names)
    }

    async fn mock_common(server: &mut mockito::ServerGuard) {
        server
            .mock("GET", "/initSession")
            .with_status(200)
            .with_body(r#"{"session_token": "T"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/listSearchOptions/Ticket")
            .with_status(404)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn new_tickets_filters_by_priority_and_maps_names() {
        let mut server = mockito::Server::new_async().await;
        mock_common(&mut server).await;

        let rows = serde_json::json!({"data": [
            {"2": 31, "1": "Impressora parada", "21": "<p>Sem papel</p>",
             "15": "2024-05-03 10:00:00", "4": 9, "3": 4, "7": "Suporte > Impressão", "12": 1},
            {"2": 30, "1": "Sem rede", "21": "Cabo rompido",
             "15": "2024-05-02 09:00:00", "4": 9, "3": 4, "7": "Suporte > Redes", "12": 1},
            {"2": 29, "1": "Monitor", "21": "",
             "15": "2024-05-01 08:00:00", "4": 9, "3": 4, "7": "Suporte", "12": 1},
        ]});

        let search = server
            .mock("GET", "/search/Ticket")
            .match_query(mockito::Matcher::AllOf(vec![
                // status = Novo at index 0, priority = Alta (4) at index 1
                mockito::Matcher::Regex("criteria%5B0%5D%5Bvalue%5D=1".to_string()),
                mockito::Matcher::Regex("criteria%5B1%5D%5Bvalue%5D=4".to_string()),
                mockito::Matcher::Regex("range=0-2".to_string()),
                mockito::Matcher::Regex("order=DESC".to_string()),
            ]))
            .with_status(200)
            .with_body(rows.to_string())
            .create_async()
            .await;

        server
            .mock("GET", "/User/9")
            .with_status(200)
            .with_body(serde_json::json!({"realname": "Pereira", "firstname": "Rita"}).to_string())
            .create_async()
            .await;

        let service = service_for(&server);
        let params = NewTicketsParams {
            limit: 3,
            priority: Some("Alta".to_string()),
            ..Default::default()
        };
        let tickets = service.new_tickets(&params).await;

        search.assert_async().await;
        assert_eq!(tickets.len(), 3);
        assert!(tickets.iter().all(|t| t.priority == "Alta"));
        assert!(tickets.iter().all(|t| t.status == "Novo"));
        assert_eq!(tickets[0].id, "31");
        assert_eq!(tickets[0].requester, "Pereira");
        assert_eq!(tickets[0].category, "Suporte > Impressão");
        // Date order follows GLPI's DESC sort.
        assert!(tickets[0].date > tickets[2].date);
    }

    #[tokio::test]
    async fn new_tickets_failure_degrades_to_empty_list() {
        let mut server = mockito::Server::new_async().await;
        mock_common(&mut server).await;
        server
            .mock("GET", "/search/Ticket")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let service = service_for(&server);
        let tickets = service.new_tickets(&NewTicketsParams::default()).await;
        assert!(tickets.is_empty());
    }

    #[tokio::test]
    async fn ticket_detail_maps_payload() {
        let mut server = mockito::Server::new_async().await;
        mock_common(&mut server).await;

        let payload = serde_json::json!({
            "id": 55,
            "name": "Telefone mudo",
            "content": "<p>Dados do formulário LOCALIZAÇÃO: Sala 12 RAMAL: 4411 \
                        DESCRIÇÃO DO PEDIDO: Sem linha</p>",
            "status": 2,
            "priority": 5,
            "type": 2,
            "urgency": 4,
            "impact": 3,
            "itilcategories_id": "Telefonia",
            "requesttypes_id": "Formulário",
            "locations_id": "Prédio A",
            "entities_id": "Raiz",
            "date": "2024-04-01 08:00:00",
            "date_mod": "2024-04-02 09:30:00",
            "time_to_resolve": "2024-04-05 18:00:00",
            "users_id_recipient": "Rita Pereira",
            "users_id_tech": 10,
            "groups_id_tech": "DTIC > N2",
            "actiontime": 3600,
            "waiting_duration": 120,
            "solve_delay_stat": 7200,
            "close_delay_stat": 9000,
        });
        server
            .mock("GET", "/Ticket/55")
            .match_query(mockito::Matcher::UrlEncoded(
                "expand_dropdowns".to_string(),
                "true".to_string(),
            ))
            .with_status(200)
            .with_body(payload.to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/User/10")
            .with_status(200)
            .with_body(serde_json::json!({"realname": "Moraes"}).to_string())
            .create_async()
            .await;

        let service = service_for(&server);
        let ticket = service.ticket("55").await.unwrap().unwrap();

        assert_eq!(ticket.id, "55");
        assert_eq!(ticket.title, "Telefone mudo");
        assert_eq!(ticket.phone.as_deref(), Some("4411"));
        assert!(ticket.description.contains("LOCALIZAÇÃO: Sala 12"));
        assert_eq!(ticket.status, "Processando (atribuído)");
        assert_eq!(ticket.priority, "Muito Alta");
        assert_eq!(ticket.ticket_type, "Requisição");
        assert_eq!(ticket.urgency, "Alta");
        assert_eq!(ticket.category, "Telefonia");
        assert_eq!(ticket.requester.name, "Rita Pereira");
        assert_eq!(ticket.technician.id, "10");
        assert_eq!(ticket.technician.name, "Moraes");
        assert_eq!(ticket.group.name, "DTIC > N2");
        assert_eq!(ticket.time_tracking.total, 3600);
        assert_eq!(ticket.time_tracking.close_delay, 9000);
        assert_eq!(ticket.due_date.as_deref(), Some("2024-04-05 18:00:00"));
        assert!(ticket.close_date.is_none());
    }

    #[tokio::test]
    async fn missing_ticket_is_none() {
        let mut server = mockito::Server::new_async().await;
        mock_common(&mut server).await;
        server
            .mock("GET", "/Ticket/404")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let service = service_for(&server);
        assert!(service.ticket("404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_ticket_id_is_rejected() {
        let server = mockito::Server::new_async().await;
        let service = service_for(&server);
        assert!(matches!(
            service.ticket("abc").await,
            Err(GlpiError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.ticket("").await,
            Err(GlpiError::InvalidArgument(_))
        ));
    }
}
