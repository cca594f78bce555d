//! Application configuration
//!
//! Everything comes from environment variables (plus CLI overrides for
//! host/port/log). The process keeps no configuration files and no
//! persistent state.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use super::cli::Cli;
use super::constants::{
    DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_FAST_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SLOW_TIMEOUT_SECS, DEFAULT_TTL_DASHBOARD_SECS,
    DEFAULT_TTL_FIELD_IDS_SECS, DEFAULT_TTL_NAMES_SECS, DEFAULT_TTL_RANKING_SECS,
    DEFAULT_TTL_TECH_METRICS_SECS, ENV_CACHE_MAX_ENTRIES, ENV_DEFAULT_TIMEOUT_SECS,
    ENV_FAST_TIMEOUT_SECS, ENV_GLPI_APP_TOKEN, ENV_GLPI_URL, ENV_GLPI_USER_TOKEN, ENV_HOST,
    ENV_LEVEL_DATE_FIELD, ENV_PORT, ENV_SERVICE_LEVEL_GROUPS, ENV_SLOW_TIMEOUT_SECS,
    ENV_TECH_LEVEL_NAMES, ENV_TTL_DASHBOARD, ENV_TTL_FIELD_IDS, ENV_TTL_NAMES, ENV_TTL_RANKING,
    ENV_TTL_TECH_METRICS,
};

// =============================================================================
// Level Date Field Enum
// =============================================================================

/// Which GLPI date field per-level metrics filter on.
///
/// General totals always filter on the creation date (field 15); per-level
/// metrics historically filter on the modification date (field 19). The
/// split is a business rule ("opened in window" vs "active in window"), so
/// it is configurable rather than hard-wired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LevelDateField {
    #[default]
    DateMod,
    DateCreation,
}

impl fmt::Display for LevelDateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelDateField::DateMod => write!(f, "date_mod"),
            LevelDateField::DateCreation => write!(f, "date_creation"),
        }
    }
}

impl LevelDateField {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "date_mod" => Ok(LevelDateField::DateMod),
            "date_creation" => Ok(LevelDateField::DateCreation),
            other => bail!(
                "{} must be 'date_mod' or 'date_creation', got '{}'",
                ENV_LEVEL_DATE_FIELD,
                other
            ),
        }
    }
}

// =============================================================================
// Config Sections
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct GlpiConfig {
    /// Base URL of the GLPI REST API, without trailing slash
    pub base_url: String,
    pub app_token: String,
    pub user_token: String,
}

#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    /// initSession, killSession, getGlpiConfig
    pub fast: Duration,
    /// search, report, listSearchOptions
    pub slow: Duration,
    /// everything else
    pub default: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub dashboard_ttl: Duration,
    pub ranking_ttl: Duration,
    pub tech_metrics_ttl: Duration,
    pub field_ids_ttl: Duration,
    pub names_ttl: Duration,
}

/// GLPI group ids backing the four support levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LevelGroups {
    #[serde(rename = "N1")]
    pub n1: u32,
    #[serde(rename = "N2")]
    pub n2: u32,
    #[serde(rename = "N3")]
    pub n3: u32,
    #[serde(rename = "N4")]
    pub n4: u32,
}

impl Default for LevelGroups {
    fn default() -> Self {
        Self {
            n1: 89,
            n2: 90,
            n3: 91,
            n4: 92,
        }
    }
}

// =============================================================================
// AppConfig
// =============================================================================

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub glpi: GlpiConfig,
    pub timeouts: TimeoutConfig,
    pub cache: CacheConfig,
    pub level_groups: LevelGroups,
    pub level_date_field: LevelDateField,
    /// Fallback mapping of technician display name (lowercase) to level
    /// marker ("N1".."N4"), loaded once at startup.
    pub tech_level_names: HashMap<String, String>,
}

impl AppConfig {
    pub fn load(cli: &Cli) -> Result<Self> {
        let glpi = Self::load_glpi()?;

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or_else(|| env_opt(ENV_HOST))
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: match cli.port {
                Some(p) => p,
                None => env_parsed(ENV_PORT, DEFAULT_PORT)?,
            },
        };

        let timeouts = TimeoutConfig {
            fast: Duration::from_secs(env_parsed(ENV_FAST_TIMEOUT_SECS, DEFAULT_FAST_TIMEOUT_SECS)?),
            slow: Duration::from_secs(env_parsed(ENV_SLOW_TIMEOUT_SECS, DEFAULT_SLOW_TIMEOUT_SECS)?),
            default: Duration::from_secs(env_parsed(
                ENV_DEFAULT_TIMEOUT_SECS,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
        };

        let cache = CacheConfig {
            max_entries: env_parsed(ENV_CACHE_MAX_ENTRIES, DEFAULT_CACHE_MAX_ENTRIES)?,
            dashboard_ttl: Duration::from_secs(env_parsed(
                ENV_TTL_DASHBOARD,
                DEFAULT_TTL_DASHBOARD_SECS,
            )?),
            ranking_ttl: Duration::from_secs(env_parsed(ENV_TTL_RANKING, DEFAULT_TTL_RANKING_SECS)?),
            tech_metrics_ttl: Duration::from_secs(env_parsed(
                ENV_TTL_TECH_METRICS,
                DEFAULT_TTL_TECH_METRICS_SECS,
            )?),
            field_ids_ttl: Duration::from_secs(env_parsed(
                ENV_TTL_FIELD_IDS,
                DEFAULT_TTL_FIELD_IDS_SECS,
            )?),
            names_ttl: Duration::from_secs(env_parsed(ENV_TTL_NAMES, DEFAULT_TTL_NAMES_SECS)?),
        };

        let level_groups = Self::load_level_groups()?;
        let level_date_field = match env_opt(ENV_LEVEL_DATE_FIELD) {
            Some(v) => LevelDateField::parse(&v)?,
            None => LevelDateField::default(),
        };
        let tech_level_names = Self::load_tech_level_names()?;

        Ok(Self {
            server,
            glpi,
            timeouts,
            cache,
            level_groups,
            level_date_field,
            tech_level_names,
        })
    }

    fn load_glpi() -> Result<GlpiConfig> {
        let mut missing = Vec::new();
        let base_url = env_opt(ENV_GLPI_URL).unwrap_or_else(|| {
            missing.push(ENV_GLPI_URL);
            String::new()
        });
        let app_token = env_opt(ENV_GLPI_APP_TOKEN).unwrap_or_else(|| {
            missing.push(ENV_GLPI_APP_TOKEN);
            String::new()
        });
        let user_token = env_opt(ENV_GLPI_USER_TOKEN).unwrap_or_else(|| {
            missing.push(ENV_GLPI_USER_TOKEN);
            String::new()
        });

        if !missing.is_empty() {
            bail!("missing required environment variables: {}", missing.join(", "));
        }

        Ok(GlpiConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            app_token,
            user_token,
        })
    }

    /// `SERVICE_LEVEL_GROUPS` accepts a full or partial JSON map; partial
    /// overrides merge over the defaults 89/90/91/92.
    fn load_level_groups() -> Result<LevelGroups> {
        let Some(raw) = env_opt(ENV_SERVICE_LEVEL_GROUPS) else {
            return Ok(LevelGroups::default());
        };

        let overrides: HashMap<String, u32> = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a valid JSON object", ENV_SERVICE_LEVEL_GROUPS))?;

        let mut groups = LevelGroups::default();
        for (key, value) in overrides {
            match key.as_str() {
                "N1" => groups.n1 = value,
                "N2" => groups.n2 = value,
                "N3" => groups.n3 = value,
                "N4" => groups.n4 = value,
                other => bail!(
                    "{} contains unknown level '{}' (expected N1..N4)",
                    ENV_SERVICE_LEVEL_GROUPS,
                    other
                ),
            }
        }
        Ok(groups)
    }

    fn load_tech_level_names() -> Result<HashMap<String, String>> {
        let Some(path) = env_opt(ENV_TECH_LEVEL_NAMES) else {
            return Ok(HashMap::new());
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {} file '{}'", ENV_TECH_LEVEL_NAMES, path))?;
        let table: HashMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("'{}' is not a valid JSON name->level map", path))?;

        for (name, level) in &table {
            if !matches!(level.as_str(), "N1" | "N2" | "N3" | "N4") {
                bail!("'{}' maps '{}' to unknown level '{}'", path, name, level);
            }
        }

        Ok(table
            .into_iter()
            .map(|(name, level)| (name.to_lowercase(), level))
            .collect())
    }
}

// =============================================================================
// Env helpers
// =============================================================================

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_opt(name) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: '{}'", name, raw)),
        None => Ok(default),
    }
}
