use serde::{Deserialize, Serialize};

/// Main configuration structure for QuestBuddy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Webhook server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// GitHub API configuration
    #[serde(default)]
    pub github: GitHubConfig,

    /// Validation oracle configuration
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Progression rules
    #[serde(default)]
    pub progression: ProgressionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Path to a quest catalog YAML file; the built-in catalog is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<String>,
}

/// Webhook server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".questbuddy/questbuddy.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// GitHub API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitHubConfig {
    /// API token (can also be set via GITHUB_TOKEN env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Base URL for API (for GitHub Enterprise or testing)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Requests per second allowed towards the API
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Upper bound on time spent retrying a transient read failure, in milliseconds
    #[serde(default = "default_max_retry_elapsed_ms")]
    pub max_retry_elapsed_ms: u64,

    /// Name used as author and committer of README and card commits
    #[serde(default = "default_committer_name")]
    pub committer_name: String,

    /// Email used as author and committer of README and card commits
    #[serde(default = "default_committer_email")]
    pub committer_email: String,
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    10
}

const fn default_requests_per_second() -> u32 {
    5
}

const fn default_max_retry_elapsed_ms() -> u64 {
    5_000
}

fn default_committer_name() -> String {
    "QuestBuddy".to_string()
}

fn default_committer_email() -> String {
    "questbuddy@users.noreply.github.com".to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            requests_per_second: default_requests_per_second(),
            max_retry_elapsed_ms: default_max_retry_elapsed_ms(),
            committer_name: default_committer_name(),
            committer_email: default_committer_email(),
        }
    }
}

/// Validation oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OracleConfig {
    /// Time budget for a single task check, in seconds
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_oracle_timeout_secs() -> u64 {
    15
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

/// Progression rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProgressionConfig {
    /// Grant a task's reward again when an already completed task is completed
    #[serde(default)]
    pub reaward_completed_tasks: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation of log files: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
