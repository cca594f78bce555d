//! GLPI search-query construction and response plumbing
//!
//! GLPI's `/search/*` endpoints take their whole query as repeated
//! key/value pairs (`criteria[i][field]`, `forcedisplay[i]`, ...) and
//! advertise pagination totals in the `Content-Range` response header.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use super::error::GlpiError;
use super::http::GlpiClient;
use crate::utils::retry::retry_with_backoff;

/// GLPI search types used by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Equals,
    Contains,
    MoreThan,
    LessThan,
}

impl SearchType {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchType::Equals => "equals",
            SearchType::Contains => "contains",
            SearchType::MoreThan => "morethan",
            SearchType::LessThan => "lessthan",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    And,
    Or,
}

impl Link {
    pub fn as_str(self) -> &'static str {
        match self {
            Link::And => "AND",
            Link::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_str(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

// =============================================================================
// Query builder
// =============================================================================

/// Builder for GLPI search parameters.
///
/// Criteria indices are assigned in call order; the caller controls link
/// chaining (GLPI has no grouping, only a flat AND/OR chain).
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    params: Vec<(String, String)>,
    criteria_index: usize,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_deleted(mut self, deleted: bool) -> Self {
        self.params
            .push(("is_deleted".to_string(), if deleted { "1" } else { "0" }.to_string()));
        self
    }

    pub fn range(mut self, start: usize, end: usize) -> Self {
        self.params
            .push(("range".to_string(), format!("{}-{}", start, end)));
        self
    }

    pub fn sort(mut self, field: &str, order: Order) -> Self {
        self.params.push(("sort".to_string(), field.to_string()));
        self.params
            .push(("order".to_string(), order.as_str().to_string()));
        self
    }

    pub fn force_display(mut self, fields: &[&str]) -> Self {
        for (i, field) in fields.iter().enumerate() {
            self.params
                .push((format!("forcedisplay[{}]", i), field.to_string()));
        }
        self
    }

    /// Append one criterion. `link` is ignored for the first criterion
    /// (GLPI rejects a link on index 0).
    pub fn criterion(mut self, link: Link, field: &str, searchtype: SearchType, value: &str) -> Self {
        let k = self.criteria_index;
        if k > 0 {
            self.params
                .push((format!("criteria[{}][link]", k), link.as_str().to_string()));
        }
        self.params
            .push((format!("criteria[{}][field]", k), field.to_string()));
        self.params.push((
            format!("criteria[{}][searchtype]", k),
            searchtype.as_str().to_string(),
        ));
        self.params
            .push((format!("criteria[{}][value]", k), value.to_string()));
        self.criteria_index = k + 1;
        self
    }

    /// Append date-window criteria (see [`date_criteria`]).
    pub fn date_range(
        mut self,
        start: Option<&str>,
        end: Option<&str>,
        field_id: &str,
    ) -> Result<Self, GlpiError> {
        let pairs = date_criteria(start, end, field_id, self.criteria_index)?;
        let added = pairs
            .iter()
            .filter(|(k, _)| k.ends_with("[field]"))
            .count();
        self.params.extend(pairs);
        self.criteria_index += added;
        Ok(self)
    }

    pub fn criteria_len(&self) -> usize {
        self.criteria_index
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn into_params(self) -> Vec<(String, String)> {
        self.params
    }
}

// =============================================================================
// Date criteria
// =============================================================================

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static DATETIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").unwrap());

/// Build GLPI date-window criteria for the given field.
///
/// A bare `YYYY-MM-DD` start/end is widened to the inclusive start/end of
/// that day; a full `YYYY-MM-DD HH:MM:SS` timestamp passes through. Any
/// other shape is rejected. The criterion at index `k > 0` carries
/// `link=AND`.
pub fn date_criteria(
    start: Option<&str>,
    end: Option<&str>,
    field_id: &str,
    start_index: usize,
) -> Result<Vec<(String, String)>, GlpiError> {
    let mut pairs = Vec::new();
    let mut k = start_index;

    if let Some(start) = start {
        let value = normalize_date(start, "00:00:00")?;
        push_criterion(&mut pairs, k, field_id, SearchType::MoreThan, &value);
        k += 1;
    }
    if let Some(end) = end {
        let value = normalize_date(end, "23:59:59")?;
        push_criterion(&mut pairs, k, field_id, SearchType::LessThan, &value);
    }

    Ok(pairs)
}

fn push_criterion(
    pairs: &mut Vec<(String, String)>,
    k: usize,
    field_id: &str,
    searchtype: SearchType,
    value: &str,
) {
    if k > 0 {
        pairs.push((format!("criteria[{}][link]", k), "AND".to_string()));
    }
    pairs.push((format!("criteria[{}][field]", k), field_id.to_string()));
    pairs.push((
        format!("criteria[{}][searchtype]", k),
        searchtype.as_str().to_string(),
    ));
    pairs.push((format!("criteria[{}][value]", k), value.to_string()));
}

fn normalize_date(raw: &str, day_edge: &str) -> Result<String, GlpiError> {
    let trimmed = raw.trim();
    if DATE_RE.is_match(trimmed) {
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map_err(|_| GlpiError::InvalidArgument(format!("invalid date '{}'", raw)))?;
        return Ok(format!("{} {}", trimmed, day_edge));
    }
    if DATETIME_RE.is_match(trimmed) {
        NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
            .map_err(|_| GlpiError::InvalidArgument(format!("invalid datetime '{}'", raw)))?;
        return Ok(trimmed.to_string());
    }
    Err(GlpiError::InvalidArgument(format!(
        "invalid date '{}': expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS",
        raw
    )))
}

// =============================================================================
// Content-Range parsing
// =============================================================================

static CONTENT_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:items\s+)?\d+-\d+/(\d+)$").unwrap());

/// Parse the total from a GLPI `Content-Range` header.
///
/// Accepts both shapes GLPI emits across versions: `items a-b/total` and
/// `a-b/total`.
pub fn parse_content_range(header: &str) -> Result<u64, GlpiError> {
    let caps = CONTENT_RANGE_RE
        .captures(header.trim())
        .ok_or_else(|| GlpiError::Decode(format!("malformed Content-Range '{}'", header)))?;
    caps[1]
        .parse::<u64>()
        .map_err(|_| GlpiError::Decode(format!("malformed Content-Range '{}'", header)))
}

// =============================================================================
// Paginated and count queries
// =============================================================================

/// Fetch every page of a search, sequentially.
///
/// Pages are never fetched in parallel: GLPI's server-side ordering is not
/// stable enough to trust out-of-order results. Each page is retried up to
/// three times with backoff. Pagination stops on a short or empty page, or
/// at `safety_limit` rows.
pub async fn fetch_all_pages(
    client: &GlpiClient,
    path: &str,
    base_params: &[(String, String)],
    page_size: usize,
    safety_limit: usize,
) -> Result<Vec<serde_json::Value>, GlpiError> {
    let mut rows: Vec<serde_json::Value> = Vec::new();
    let mut offset = 0usize;

    loop {
        let mut params = base_params.to_vec();
        params.push((
            "range".to_string(),
            format!("{}-{}", offset, offset + page_size - 1),
        ));

        let page = retry_with_backoff(3, 30, || fetch_page(client, path, &params)).await?;
        let page_len = page.len();
        rows.extend(page);

        if rows.len() >= safety_limit {
            tracing::warn!(
                path,
                rows = rows.len(),
                limit = safety_limit,
                "pagination_safety_stop"
            );
            metrics::counter!("glpi_pagination_safety_stop_total").increment(1);
            break;
        }
        if page_len < page_size {
            break;
        }
        offset += page_size;
    }

    Ok(rows)
}

async fn fetch_page(
    client: &GlpiClient,
    path: &str,
    params: &[(String, String)],
) -> Result<Vec<serde_json::Value>, GlpiError> {
    let response = client.get(path, params).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(GlpiError::Http {
            status: status.as_u16(),
        });
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| GlpiError::Decode(e.to_string()))?;

    Ok(body
        .get("data")
        .and_then(|d| d.as_array())
        .cloned()
        .unwrap_or_default())
}

/// Run a `range=0-0` search and return only the total.
///
/// The total comes from `Content-Range`, with fallbacks to the JSON
/// `totalcount` field and finally `data` length.
pub async fn count_query(
    client: &GlpiClient,
    path: &str,
    params: &[(String, String)],
) -> Result<u64, GlpiError> {
    let response = client.get(path, params).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(GlpiError::Http {
            status: status.as_u16(),
        });
    }

    if let Some(header) = response.headers().get("Content-Range") {
        let raw = header
            .to_str()
            .map_err(|_| GlpiError::Decode("non-ASCII Content-Range".to_string()))?;
        return parse_content_range(raw);
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| GlpiError::Decode(e.to_string()))?;
    if let Some(total) = body.get("totalcount").and_then(|t| t.as_u64()) {
        return Ok(total);
    }
    Ok(body
        .get("data")
        .and_then(|d| d.as_array())
        .map(|d| d.len() as u64)
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_criteria_both_bounds() {
        let pairs =
            date_criteria(Some("2024-01-01"), Some("2024-01-07"), "15", 0).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("criteria[0][field]".to_string(), "15".to_string()),
                ("criteria[0][searchtype]".to_string(), "morethan".to_string()),
                ("criteria[0][value]".to_string(), "2024-01-01 00:00:00".to_string()),
                ("criteria[1][link]".to_string(), "AND".to_string()),
                ("criteria[1][field]".to_string(), "15".to_string()),
                ("criteria[1][searchtype]".to_string(), "lessthan".to_string()),
                ("criteria[1][value]".to_string(), "2024-01-07 23:59:59".to_string()),
            ]
        );
    }

    #[test]
    fn date_criteria_start_only_at_nonzero_index() {
        let pairs = date_criteria(Some("2024-03-10"), None, "19", 2).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("criteria[2][link]".to_string(), "AND".to_string()),
                ("criteria[2][field]".to_string(), "19".to_string()),
                ("criteria[2][searchtype]".to_string(), "morethan".to_string()),
                ("criteria[2][value]".to_string(), "2024-03-10 00:00:00".to_string()),
            ]
        );
    }

    #[test]
    fn date_criteria_empty_when_no_bounds() {
        assert!(date_criteria(None, None, "15", 0).unwrap().is_empty());
    }

    #[test]
    fn date_criteria_accepts_full_timestamps() {
        let pairs = date_criteria(Some("2024-01-01 08:30:00"), None, "15", 0).unwrap();
        assert_eq!(pairs[2].1, "2024-01-01 08:30:00");
    }

    #[test]
    fn date_criteria_rejects_other_formats() {
        assert!(matches!(
            date_criteria(Some("01/02/2024"), None, "15", 0),
            Err(GlpiError::InvalidArgument(_))
        ));
        assert!(matches!(
            date_criteria(None, Some("2024-13-40"), "15", 0),
            Err(GlpiError::InvalidArgument(_))
        ));
        assert!(matches!(
            date_criteria(Some("yesterday"), None, "15", 0),
            Err(GlpiError::InvalidArgument(_))
        ));
    }

    #[test]
    fn content_range_both_shapes() {
        assert_eq!(parse_content_range("items 0-0/45").unwrap(), 45);
        assert_eq!(parse_content_range("0-999/12345").unwrap(), 12345);
        assert_eq!(parse_content_range(" items 0-0/0 ").unwrap(), 0);
    }

    #[test]
    fn content_range_rejects_other_shapes() {
        assert!(matches!(
            parse_content_range("bytes 0-0/45"),
            Err(GlpiError::Decode(_))
        ));
        assert!(matches!(parse_content_range("45"), Err(GlpiError::Decode(_))));
        assert!(matches!(
            parse_content_range("items 0-0/many"),
            Err(GlpiError::Decode(_))
        ));
        assert!(matches!(parse_content_range(""), Err(GlpiError::Decode(_))));
    }

    #[test]
    fn query_builder_chains_criteria_links() {
        let q = SearchQuery::new()
            .is_deleted(false)
            .criterion(Link::And, "12", SearchType::Equals, "1")
            .criterion(Link::Or, "12", SearchType::Equals, "2")
            .range(0, 0);
        let params = q.into_params();

        assert!(params.contains(&("is_deleted".to_string(), "0".to_string())));
        assert!(params.contains(&("criteria[0][field]".to_string(), "12".to_string())));
        // No link on the first criterion
        assert!(!params.iter().any(|(k, _)| k == "criteria[0][link]"));
        assert!(params.contains(&("criteria[1][link]".to_string(), "OR".to_string())));
        assert!(params.contains(&("range".to_string(), "0-0".to_string())));
    }

    #[test]
    fn query_builder_date_range_advances_index() {
        let q = SearchQuery::new()
            .criterion(Link::And, "8", SearchType::Contains, "N1")
            .date_range(Some("2024-01-01"), Some("2024-01-07"), "19")
            .unwrap();
        assert_eq!(q.criteria_len(), 3);
        let params = q.into_params();
        assert!(params.contains(&("criteria[1][link]".to_string(), "AND".to_string())));
        assert!(params.contains(&("criteria[2][link]".to_string(), "AND".to_string())));
    }

    #[test]
    fn force_display_indexes_fields() {
        let q = SearchQuery::new().force_display(&["2", "8", "12"]);
        let params = q.into_params();
        assert_eq!(
            params,
            vec![
                ("forcedisplay[0]".to_string(), "2".to_string()),
                ("forcedisplay[1]".to_string(), "8".to_string()),
                ("forcedisplay[2]".to_string(), "12".to_string()),
            ]
        );
    }

    use crate::core::config::{GlpiConfig, TimeoutConfig};
    use crate::glpi::session::SessionManager;
    use std::sync::Arc;
    use std::time::Duration;

    fn client_for(server: &mockito::ServerGuard) -> GlpiClient {
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
        GlpiClient::new(
            http,
            server.url(),
            session,
            TimeoutConfig {
                fast: Duration::from_secs(5),
                slow: Duration::from_secs(20),
                default: Duration::from_secs(12),
            },
        )
    }

    async fn mock_auth(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/initSession")
            .with_status(200)
            .with_body(r#"{"session_token": "T"}"#)
            .create_async()
            .await
    }

    fn page_body(ids: &[u64]) -> String {
        let rows: Vec<_> = ids.iter().map(|id| serde_json::json!({"2": id})).collect();
        serde_json::json!({"data": rows}).to_string()
    }

    #[tokio::test]
    async fn pagination_walks_pages_until_short_page() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;

        let first = server
            .mock("GET", "/search/Ticket")
            .match_query(mockito::Matcher::UrlEncoded("range".into(), "0-1".into()))
            .with_status(200)
            .with_body(page_body(&[1, 2]))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/search/Ticket")
            .match_query(mockito::Matcher::UrlEncoded("range".into(), "2-3".into()))
            .with_status(200)
            .with_body(page_body(&[3]))
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let rows = fetch_all_pages(&client, "search/Ticket", &[], 2, 1000)
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn pagination_stops_at_safety_limit() {
        let mut server = mockito::Server::new_async().await;
        let _auth = mock_auth(&mut server).await;

        // Every page is full; only the safety limit can stop the walk.
        let pages = server
            .mock("GET", "/search/Ticket")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(page_body(&[1, 2]))
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        let rows = fetch_all_pages(&client, "search/Ticket", &[], 2, 4)
            .await
            .unwrap();

        assert_eq!(rows.len(), 4);
        pages.assert_async().await;
    }
}
