use chrono::NaiveDate;
use serde::Deserialize;

/// Root application configuration. Loaded from an optional `timetable`
/// config file and environment variables with the prefix `TIMETABLE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret; at least 32 characters.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_invitation_ttl_hours")]
    pub invitation_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_solver_url")]
    pub url: String,
    #[serde(default = "default_solver_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Monday of the week calendar exports are laid onto.
    #[serde(default = "default_reference_monday")]
    pub reference_monday: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    3001
}
fn default_database_url() -> String {
    "postgres://postgres@localhost:5432/timetable_generator".to_string()
}
fn default_max_connections() -> u32 {
    10
}
fn default_acquire_timeout_secs() -> u64 {
    5
}
fn default_token_ttl_secs() -> u64 {
    3600
}
fn default_invitation_ttl_hours() -> i64 {
    72
}
fn default_solver_url() -> String {
    "http://localhost:5000".to_string()
}
// The solver caps its own search at 120 s.
fn default_solver_timeout_secs() -> u64 {
    180
}
fn default_reference_monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 22).unwrap_or_default()
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: default_token_ttl_secs(),
            invitation_ttl_hours: default_invitation_ttl_hours(),
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            url: default_solver_url(),
            timeout_secs: default_solver_timeout_secs(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            reference_monday: default_reference_monday(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            solver: SolverConfig::default(),
            export: ExportConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional `timetable.{toml,yaml,json}` file
    /// and environment variables such as `TIMETABLE__AUTH__JWT_SECRET`.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("timetable").required(false))
            .add_source(
                config::Environment::with_prefix("TIMETABLE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
