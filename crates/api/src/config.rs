use domain::models::{
    ClientOptions, DEFAULT_CLIENT_REQUEST_TIMEOUT_SECS, DEFAULT_FLAG_CACHE_TTL_SECS,
    DEFAULT_FLAG_STALE_TTL_SECS,
};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    /// Options published to console clients on `GET /settings`.
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn pool_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// SHA-256 hex digest of the admin API key. Empty disables admin routes.
    #[serde(default)]
    pub admin_api_key_hash: String,

    /// Send `Strict-Transport-Security` on every response.
    #[serde(default)]
    pub hsts_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Change history older than this is pruned by the retention job.
    #[serde(default = "default_history_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_audit_retention_days")]
    pub audit_retention_days: u32,

    /// Run the retention job in the background.
    #[serde(default = "default_true")]
    pub prune_enabled: bool,

    /// Tables to put under trigger tracking at startup.
    #[serde(default = "default_tracked_tables")]
    pub tracked_tables: Vec<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_days: default_history_retention_days(),
            audit_retention_days: default_audit_retention_days(),
            prune_enabled: true,
            tracked_tables: default_tracked_tables(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_flag_cache_ttl")]
    pub feature_flag_cache_ttl_secs: u64,

    #[serde(default = "default_flag_stale_ttl")]
    pub feature_flag_stale_ttl_secs: u64,

    #[serde(default = "default_client_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_audit_capacity")]
    pub audit_log_capacity: usize,

    /// Maximum entries returned by the audit export endpoint.
    #[serde(default = "default_export_max_records")]
    pub export_max_records: i64,
}

impl ClientConfig {
    /// The subset published to console clients.
    pub fn options(&self) -> ClientOptions {
        ClientOptions {
            feature_flag_cache_ttl_secs: self.feature_flag_cache_ttl_secs,
            feature_flag_stale_ttl_secs: self.feature_flag_stale_ttl_secs,
            request_timeout_secs: self.request_timeout_secs,
            audit_log_capacity: self.audit_log_capacity,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            feature_flag_cache_ttl_secs: default_flag_cache_ttl(),
            feature_flag_stale_ttl_secs: default_flag_stale_ttl(),
            request_timeout_secs: default_client_request_timeout(),
            audit_log_capacity: default_audit_capacity(),
            export_max_records: default_export_max_records(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_body_size() -> usize {
    1_048_576
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_true() -> bool {
    true
}
fn default_history_retention_days() -> u32 {
    365
}
fn default_audit_retention_days() -> u32 {
    90
}
fn default_tracked_tables() -> Vec<String> {
    vec!["settings".to_string()]
}
fn default_flag_cache_ttl() -> u64 {
    DEFAULT_FLAG_CACHE_TTL_SECS
}
fn default_flag_stale_ttl() -> u64 {
    DEFAULT_FLAG_STALE_TTL_SECS
}
fn default_client_request_timeout() -> u64 {
    DEFAULT_CLIENT_REQUEST_TIMEOUT_SECS
}
fn default_audit_capacity() -> usize {
    domain::models::AUDIT_LOG_CAPACITY
}
fn default_export_max_records() -> i64 {
    domain::models::MAX_AUDIT_QUERY_LIMIT
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with SC__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("SC")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.cors_origins")
                    .with_list_parse_key("history.tracked_tables")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds the config from embedded defaults and the overrides only, so
    /// tests do not depend on the working directory.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30
            max_body_size = 1048576

            [database]
            url = ""
            max_connections = 20
            min_connections = 5
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []
            admin_api_key_hash = ""
            hsts_enabled = false

            [history]
            retention_days = 365
            audit_retention_days = 90
            prune_enabled = false
            tracked_tables = ["settings"]

            [client]
            feature_flag_cache_ttl_secs = 60
            feature_flag_stale_ttl_secs = 86400
            request_timeout_secs = 5
            audit_log_capacity = 1000
            export_max_records = 1000
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "SC__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        let hash = &self.security.admin_api_key_hash;
        if !hash.is_empty() && (hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit())) {
            return Err(ConfigValidationError::InvalidValue(
                "admin_api_key_hash must be a 64 character SHA-256 hex digest".to_string(),
            ));
        }

        for days in [self.history.retention_days, self.history.audit_retention_days] {
            shared::validation::validate_retention_days(days).map_err(|_| {
                ConfigValidationError::InvalidValue(format!(
                    "retention days must be between 1 and 3650, got {}",
                    days
                ))
            })?;
        }

        for table in &self.history.tracked_tables {
            shared::validation::validate_identifier(table).map_err(|e| {
                ConfigValidationError::InvalidValue(format!("tracked table {}", e))
            })?;
        }

        if self.client.feature_flag_cache_ttl_secs > self.client.feature_flag_stale_ttl_secs {
            return Err(ConfigValidationError::InvalidValue(
                "feature_flag_cache_ttl_secs cannot exceed feature_flag_stale_ttl_secs".to_string(),
            ));
        }

        if self.client.request_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "client request_timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.client.audit_log_capacity == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "audit_log_capacity must be at least 1".to_string(),
            ));
        }

        if !(1..=domain::models::MAX_AUDIT_QUERY_LIMIT).contains(&self.client.export_max_records) {
            return Err(ConfigValidationError::InvalidValue(format!(
                "export_max_records must be between 1 and {}",
                domain::models::MAX_AUDIT_QUERY_LIMIT
            )));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigValidationError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| {
                ConfigValidationError::InvalidValue(format!("Invalid socket address: {}", e))
            })
    }

    /// Whether admin routes can be reached at all.
    pub fn admin_enabled(&self) -> bool {
        !self.security.admin_api_key_hash.is_empty()
    }
}
