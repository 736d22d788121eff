//! Configuration management for the server.

use backfeed_engine::{CategoryMap, SyncOptions};
use std::env;
use std::time::Duration;

const DEFAULT_CATEGORIES: &str = "like,comment,share,rsvp-yes,rsvp-no,rsvp-maybe,checkin";
const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";

/// Facebook Graph API source settings.
#[derive(Debug, Clone)]
pub struct FacebookConfig {
    pub graph_url: String,
    pub access_token: String,
    /// Only posts newer than this are considered
    pub lookback: Duration,
}

/// Granary-compatible ActivityStreams source settings.
#[derive(Debug, Clone)]
pub struct GranaryConfig {
    pub base_url: String,
    pub access_token: Option<String>,
}

/// Which platform responses are read from.
#[derive(Debug, Clone)]
pub enum SourceConfig {
    Facebook(FacebookConfig),
    Granary(GranaryConfig),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Upper bound on pooled ledger connections
    pub database_max_connections: u32,
    /// Startup connection attempts before giving up
    pub database_connect_attempts: u32,
    /// Bearer token required on the trigger routes, if set
    pub trigger_token: Option<String>,
    /// Micropub endpoint of the target site
    pub micropub_endpoint: String,
    /// Credential for the target site
    pub micropub_token: String,
    /// Allow-listed categories and their labels
    pub categories: CategoryMap,
    pub source: SourceConfig,
    /// Token Facebook echoes back when verifying the webhook subscription
    pub facebook_verify_token: Option<String>,
    /// Timeout for every outbound HTTP call
    pub http_timeout: Duration,
    /// How long a pass may hold a publish claim
    pub claim_lease: Duration,
    /// Internal polling interval; unset means passes are triggered externally
    pub poll_interval: Option<Duration>,
    pub self_only: bool,
    pub include_reactions: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = required("DATABASE_URL")?;
        let micropub_endpoint = required("MICROPUB_ENDPOINT")?;
        let micropub_token = required("MICROPUB_TOKEN")?;

        let categories: CategoryMap = var("SYNDICATE_CATEGORIES")
            .unwrap_or_else(|| DEFAULT_CATEGORIES.to_string())
            .parse()
            .map_err(|e: backfeed_engine::Error| ConfigError::Invalid {
                key: "SYNDICATE_CATEGORIES",
                reason: e.to_string(),
            })?;
        if categories.is_empty() {
            return Err(ConfigError::Invalid {
                key: "SYNDICATE_CATEGORIES",
                reason: "no categories allowed".to_string(),
            });
        }

        let source = match var("SOURCE").as_deref().unwrap_or("facebook") {
            "facebook" => SourceConfig::Facebook(FacebookConfig {
                graph_url: var("FACEBOOK_GRAPH_URL")
                    .unwrap_or_else(|| DEFAULT_GRAPH_URL.to_string()),
                access_token: required("FACEBOOK_ACCESS_TOKEN")?,
                lookback: Duration::from_secs(parse_u64(&var, "FACEBOOK_LOOKBACK_HOURS", 24)? * 3600),
            }),
            "granary" => SourceConfig::Granary(GranaryConfig {
                base_url: required("GRANARY_URL")?,
                access_token: var("GRANARY_TOKEN"),
            }),
            other => {
                return Err(ConfigError::Invalid {
                    key: "SOURCE",
                    reason: format!("unknown source '{other}'"),
                })
            }
        };

        let database_max_connections = parse_count(&var, "DATABASE_MAX_CONNECTIONS", 5)?;
        let database_connect_attempts = parse_count(&var, "DATABASE_CONNECT_ATTEMPTS", 5)?;

        let http_timeout = Duration::from_secs(parse_u64(&var, "HTTP_TIMEOUT_SECS", 600)?);
        let claim_lease = Duration::from_secs(parse_u64(
            &var,
            "CLAIM_LEASE_SECS",
            http_timeout.as_secs() + 60,
        )?);
        let poll_interval = match var("POLL_INTERVAL_SECS") {
            Some(_) => Some(Duration::from_secs(parse_u64(&var, "POLL_INTERVAL_SECS", 0)?))
                .filter(|d| !d.is_zero()),
            None => None,
        };

        Ok(Self {
            host,
            port,
            database_url,
            database_max_connections,
            database_connect_attempts,
            trigger_token: var("TRIGGER_TOKEN"),
            micropub_endpoint,
            micropub_token,
            categories,
            source,
            facebook_verify_token: var("FACEBOOK_VERIFY_TOKEN"),
            http_timeout,
            claim_lease,
            poll_interval,
            self_only: parse_bool(&var, "SELF_ONLY", true)?,
            include_reactions: parse_bool(&var, "INCLUDE_REACTIONS", true)?,
        })
    }

    /// Options handed to the sync driver.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            self_only: self.self_only,
            include_reactions: self.include_reactions,
            claim_lease: self.claim_lease.as_millis() as u64,
        }
    }
}

fn parse_u64(
    var: &impl Fn(&'static str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match var(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            reason: format!("'{value}' is not a non-negative integer"),
        }),
        None => Ok(default),
    }
}

/// A positive count that fits a `u32`.
fn parse_count(
    var: &impl Fn(&'static str) -> Option<String>,
    key: &'static str,
    default: u32,
) -> Result<u32, ConfigError> {
    let value = parse_u64(var, key, u64::from(default))?;
    u32::try_from(value)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ConfigError::Invalid {
            key,
            reason: format!("{value} is not a positive count"),
        })
}

fn parse_bool(
    var: &impl Fn(&'static str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match var(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::Invalid {
            key,
            reason: format!("'{v}' is not a boolean"),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
