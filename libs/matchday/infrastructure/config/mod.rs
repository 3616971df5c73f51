use crate::domain::{default_leagues, League, TtlPolicy};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const VALID_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Gateway, poller and precache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
    #[serde(default)]
    pub ttl: TtlPolicy,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub precache: PrecacheConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Offset applied to UTC when deciding what "today" is
    #[serde(default)]
    pub utc_offset_hours: i32,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub host: String,
    /// Header carrying the API key
    pub auth_header: String,
    pub timeout_secs: u64,
    /// Warn when the per-minute quota reported by upstream drops to this
    pub low_quota_threshold: i64,
    /// API key from .env (never in YAML)
    #[serde(skip)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://v3.football.api-sports.io".to_string(),
            host: "v3.football.api-sports.io".to_string(),
            auth_header: "x-apisports-key".to_string(),
            timeout_secs: 10,
            low_quota_threshold: 10,
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub default_per_minute: u32,
    pub per_host: HashMap<String, u32>,
    /// Keep the sliding window in the database so several instances share it
    pub shared: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_per_minute: 200,
            per_host: HashMap::new(),
            shared: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub enabled: bool,
    pub live_interval_secs: u64,
    pub idle_interval_secs: u64,
    pub lease_secs: i64,
    pub channel: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            live_interval_secs: 10,
            idle_interval_secs: 60,
            lease_secs: 30,
            channel: "live_matches_updates".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecacheConfig {
    pub days_ahead: u32,
    pub days_back: u32,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub max_permit_retries: u32,
    pub deadline_secs: u64,
    pub lease_secs: i64,
    /// Overrides the built-in league list when present
    pub leagues: Option<Vec<League>>,
}

impl Default for PrecacheConfig {
    fn default() -> Self {
        Self {
            days_ahead: 7,
            days_back: 1,
            batch_size: 5,
            batch_delay_ms: 1500,
            max_permit_retries: 3,
            deadline_secs: 600,
            lease_secs: 900,
            leagues: None,
        }
    }
}

impl PrecacheConfig {
    pub fn leagues(&self) -> Vec<League> {
        match &self.leagues {
            Some(leagues) => {
                let mut leagues = leagues.clone();
                crate::domain::league::sort_by_priority(&mut leagues);
                leagues
            }
            None => default_leagues(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://matchday.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            rate_limits: RateLimitConfig::default(),
            ttl: TtlPolicy::default(),
            poller: PollerConfig::default(),
            precache: PrecacheConfig::default(),
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            utc_offset_hours: 0,
            log_level: default_log_level(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from YAML file and .env
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml_str(&yaml_content)
    }

    /// Parse YAML, apply environment overrides and validate
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut config: GatewayConfig = serde_yaml::from_str(yaml)?;

        // Don't fail if .env doesn't exist
        dotenv::dotenv().ok();

        config.api.api_key = std::env::var("API_FOOTBALL_KEY")
            .map_err(|_| ConfigError::EnvVarMissing("API_FOOTBALL_KEY".to_string()))?;

        if let Ok(host) = std::env::var("API_FOOTBALL_HOST") {
            info!("Overriding API host from environment variable");
            config.api.base_url = format!("https://{}", host);
            config.api.host = host;
        }

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            info!("Overriding database URL from environment variable");
            config.database.url = db_url;
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() || self.api.host.is_empty() {
            return Err(ConfigError::ValidationError(
                "api.base_url and api.host cannot be empty".to_string(),
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "api.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.rate_limits.default_per_minute == 0
            || self.rate_limits.per_host.values().any(|limit| *limit == 0)
        {
            return Err(ConfigError::ValidationError(
                "rate limits must be greater than 0".to_string(),
            ));
        }
        self.ttl.validate().map_err(ConfigError::ValidationError)?;

        if self.poller.live_interval_secs == 0 || self.poller.idle_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poller intervals must be greater than 0".to_string(),
            ));
        }
        if self.poller.lease_secs <= 0 || self.precache.lease_secs <= 0 {
            return Err(ConfigError::ValidationError(
                "lease_secs must be greater than 0".to_string(),
            ));
        }
        if self.poller.channel.is_empty() {
            return Err(ConfigError::ValidationError(
                "poller.channel cannot be empty".to_string(),
            ));
        }
        if self.precache.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "precache.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.utc_offset_hours.abs() > 14 {
            return Err(ConfigError::ValidationError(
                "utc_offset_hours must be between -14 and 14".to_string(),
            ));
        }
        if !VALID_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                VALID_LEVELS.join(", ")
            )));
        }
        Ok(())
    }

    /// Rate limit ceiling for an upstream host
    pub fn limit_for_host(&self, host: &str) -> u32 {
        self.rate_limits
            .per_host
            .get(host)
            .copied()
            .unwrap_or(self.rate_limits.default_per_minute)
    }

    /// The configured local offset
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    /// Calendar date of `now` in the configured offset
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.local_offset()).date_naive()
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  API: {} (timeout {}s)", self.api.base_url, self.api.timeout_secs);
        info!(
            "  Rate limit: {}/min default, {} host overrides, shared={}",
            self.rate_limits.default_per_minute,
            self.rate_limits.per_host.len(),
            self.rate_limits.shared
        );
        info!(
            "  Poller: enabled={} live={}s idle={}s channel={}",
            self.poller.enabled,
            self.poller.live_interval_secs,
            self.poller.idle_interval_secs,
            self.poller.channel
        );
        info!(
            "  Precache: {} days ahead, {} back, batches of {} every {}ms",
            self.precache.days_ahead,
            self.precache.days_back,
            self.precache.batch_size,
            self.precache.batch_delay_ms
        );
        info!("  Database URL: {}", self.database.url);
        info!("  Bind: {}", self.server.bind);
        info!("  UTC offset: {}h", self.utc_offset_hours);
        info!("  Log level: {}", self.log_level);
    }
}
