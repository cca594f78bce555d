// =============================================================================
// Application Identity
// =============================================================================

/// Application name (for display and logs)
pub const APP_NAME: &str = "GLPI Dash";

// =============================================================================
// Environment Variables - GLPI upstream
// =============================================================================

/// Base URL of the GLPI REST API (required)
pub const ENV_GLPI_URL: &str = "GLPI_URL";

/// GLPI application token (required)
pub const ENV_GLPI_APP_TOKEN: &str = "GLPI_APP_TOKEN";

/// GLPI user API token (required)
pub const ENV_GLPI_USER_TOKEN: &str = "GLPI_USER_TOKEN";

/// JSON map of support level to GLPI group id, e.g. `{"N1":89,"N2":90}`.
/// Partial overrides merge over the defaults.
pub const ENV_SERVICE_LEVEL_GROUPS: &str = "SERVICE_LEVEL_GROUPS";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "GLPI_DASH_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "GLPI_DASH_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "GLPI_DASH_LOG";

// =============================================================================
// Environment Variables - Timeouts
// =============================================================================

/// Timeout for cheap control-plane calls (initSession, killSession, status)
pub const ENV_FAST_TIMEOUT_SECS: &str = "GLPI_DASH_FAST_TIMEOUT_SECS";

/// Timeout for search/report/listSearchOptions calls
pub const ENV_SLOW_TIMEOUT_SECS: &str = "GLPI_DASH_SLOW_TIMEOUT_SECS";

/// Timeout for everything else
pub const ENV_DEFAULT_TIMEOUT_SECS: &str = "GLPI_DASH_DEFAULT_TIMEOUT_SECS";

// =============================================================================
// Environment Variables - Cache TTLs
// =============================================================================

pub const ENV_CACHE_MAX_ENTRIES: &str = "GLPI_DASH_CACHE_MAX_ENTRIES";
pub const ENV_TTL_DASHBOARD: &str = "GLPI_DASH_TTL_DASHBOARD";
pub const ENV_TTL_RANKING: &str = "GLPI_DASH_TTL_RANKING";
pub const ENV_TTL_TECH_METRICS: &str = "GLPI_DASH_TTL_TECH_METRICS";
pub const ENV_TTL_FIELD_IDS: &str = "GLPI_DASH_TTL_FIELD_IDS";
pub const ENV_TTL_NAMES: &str = "GLPI_DASH_TTL_NAMES";

// =============================================================================
// Environment Variables - Behaviour knobs
// =============================================================================

/// Which date field per-level metrics filter on: `date_mod` (default) or
/// `date_creation`. General totals always filter on date_creation.
pub const ENV_LEVEL_DATE_FIELD: &str = "GLPI_DASH_LEVEL_DATE_FIELD";

/// Path to a JSON file mapping technician display names to levels,
/// used when GLPI group membership yields no level.
pub const ENV_TECH_LEVEL_NAMES: &str = "GLPI_DASH_TECH_LEVEL_NAMES";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 8000;

// =============================================================================
// Upstream Defaults
// =============================================================================

/// Timeout for initSession/killSession/getGlpiConfig (seconds)
pub const DEFAULT_FAST_TIMEOUT_SECS: u64 = 5;

/// Timeout for search-class endpoints (seconds)
pub const DEFAULT_SLOW_TIMEOUT_SECS: u64 = 20;

/// Timeout for everything else (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 12;

/// Maximum retry attempts for upstream requests and authentication
pub const MAX_RETRIES: u32 = 3;

/// Backoff cap for transport retries (seconds)
pub const RETRY_BACKOFF_CAP_SECS: u64 = 30;

/// Backoff cap for auth retries after 401/403 (seconds)
pub const AUTH_BACKOFF_CAP_SECS: u64 = 10;

/// Upstream calls slower than this are logged as slow (seconds)
pub const SLOW_RESPONSE_SECS: f64 = 3.0;

/// GLPI session lifetime (seconds)
pub const SESSION_TTL_SECS: u64 = 3600;

/// Renew the session this long before it expires (seconds)
pub const SESSION_RENEW_BUFFER_SECS: u64 = 300;

/// Page size for paginated search queries
pub const SEARCH_PAGE_SIZE: usize = 1000;

/// Hard stop for paginated searches (rows)
pub const PAGINATION_SAFETY_LIMIT: usize = 100_000;

/// How far back ticket-based technician discovery looks (days)
pub const TECH_DISCOVERY_DAYS: i64 = 90;

/// Maximum technician candidates before a warning is emitted
pub const TECH_CANDIDATE_CAP: usize = 100;

/// Sub-batch size for OR-chained criteria (URL-length safety)
pub const TECH_BATCH_SIZE: usize = 25;

/// Concurrent user-name lookups during ranking fan-out
pub const NAME_FETCH_CONCURRENCY: usize = 5;

/// Concurrent per-technician metric lookups during ranking fan-out
pub const METRIC_FETCH_CONCURRENCY: usize = 3;

/// Per-worker timeout inside ranking fan-outs (seconds)
pub const FANOUT_WORKER_TIMEOUT_SECS: u64 = 15;

/// Timeout for the status probe (seconds)
pub const STATUS_PROBE_TIMEOUT_SECS: u64 = 1;

// =============================================================================
// Cache Defaults
// =============================================================================

/// Maximum entries in the in-memory cache
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 10_000;

/// Dashboard metrics TTL (seconds)
pub const DEFAULT_TTL_DASHBOARD_SECS: u64 = 180;

/// Technician ranking TTL (seconds)
pub const DEFAULT_TTL_RANKING_SECS: u64 = 300;

/// Per-technician metrics TTL (seconds)
pub const DEFAULT_TTL_TECH_METRICS_SECS: u64 = 3600;

/// Field-id registry TTL (seconds)
pub const DEFAULT_TTL_FIELD_IDS_SECS: u64 = 1800;

/// User/priority/category name TTL (seconds)
pub const DEFAULT_TTL_NAMES_SECS: u64 = 3600;
