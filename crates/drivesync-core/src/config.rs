//! Configuration module for drivesync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, environment overrides, validation, defaults, and a builder
//! pattern for programmatic use.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for drivesync.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployment environment name, e.g. `development` or `production`.
    pub environment: String,
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub drive: DriveConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

/// Message queue (SQS) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Full URL of the queue to consume.
    pub queue_url: String,
    pub region: String,
    /// Custom endpoint, e.g. a local emulator.
    pub endpoint: Option<String>,
    /// Messages requested per receive call (1-10).
    pub max_messages: u32,
    /// Long-poll wait per receive call, in seconds (0-20).
    pub wait_time_secs: u64,
    /// Pause after a failed receive call, in milliseconds.
    pub receive_retry_delay_ms: u64,
}

/// Object storage (S3) settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub region: String,
    /// Custom endpoint, e.g. MinIO or LocalStack.
    pub endpoint: Option<String>,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    pub force_path_style: bool,
    /// Static credentials. Both must be set, otherwise the default
    /// provider chain is used.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Credential store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// OAuth client settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub http_timeout_secs: u64,
    /// Reuse access tokens until shortly before they expire.
    pub cache_access_tokens: bool,
}

/// Microsoft Graph settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub base_url: String,
    pub http_timeout_secs: u64,
    /// Items of one S3 notification uploaded at the same time.
    pub batch_concurrency: usize,
}

/// Dispatch core settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of listener tasks receiving from the queue.
    pub subscriber_count: usize,
    /// Number of worker tasks draining the staging queue.
    pub worker_count: usize,
    /// Capacity of the bounded staging queue between listeners and workers.
    pub staging_capacity: usize,
    /// Handler invocations allowed in flight at once.
    pub max_concurrent_handlers: usize,
    /// Messages admitted per second.
    pub throttle_rate: f64,
    /// Time allowed for in-flight handlers after shutdown is requested.
    pub shutdown_grace_secs: u64,
    pub retry: RetryConfig,
}

/// Retry policy for failed handler invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total invocations including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/drivesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("drivesync")
            .join("config.yaml")
    }

    /// Overlay the deployment environment variables onto this configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Overlay variables returned by `lookup`. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("QUEUE_URL") {
            self.queue.queue_url = v;
        }
        if let Some(v) = var("AWS_REGION") {
            self.queue.region = v.clone();
            self.storage.region = v;
        }
        if let Some(v) = var("S3_ENDPOINT") {
            self.storage.endpoint = Some(v);
            self.storage.force_path_style = true;
        }
        if let Some(v) = var("DATABASE_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = var("ONEDRIVE_CLIENT_ID") {
            self.auth.client_id = v;
        }
        if let Some(v) = var("ONEDRIVE_CLIENT_SECRET") {
            self.auth.client_secret = v;
        }
        if let Some(v) = var("ONEDRIVE_TOKEN_URL") {
            self.auth.token_url = v;
        }
        if let Some(v) = var("ENVIRONMENT") {
            self.environment = v;
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.logging.level = v.to_lowercase();
        }
    }
}

impl QueueConfig {
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs)
    }

    pub fn receive_retry_delay(&self) -> Duration {
        Duration::from_millis(self.receive_retry_delay_ms)
    }
}

impl DispatchConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Region used when neither the file nor `AWS_REGION` names one.
pub const DEFAULT_REGION: &str = "us-west-1";

/// Microsoft identity platform token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Microsoft Graph v1.0 root.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            queue: QueueConfig::default(),
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            drive: DriveConfig::default(),
            dispatch: DispatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_url: String::new(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            max_messages: 10,
            wait_time_secs: 20,
            receive_retry_delay_ms: 1000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("drivesync")
                .join("drivesync.db"),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            http_timeout_secs: 30,
            cache_access_tokens: false,
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            http_timeout_secs: 30,
            batch_concurrency: 4,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            subscriber_count: 1,
            worker_count: 5,
            staging_capacity: 100,
            max_concurrent_handlers: 5,
            throttle_rate: 10.0,
            shutdown_grace_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// Secrets stay out of log output.

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("cache_access_tokens", &self.cache_access_tokens)
            .finish()
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("force_path_style", &self.force_path_style)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"dispatch.worker_count"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

/// Fields with no usable default; they come from the file or the environment.
pub const REQUIRED_FIELDS: &[&str] = &["queue.queue_url", "auth.client_id", "auth.client_secret"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            })
        };

        // --- required ---
        if self.queue.queue_url.trim().is_empty() {
            push("queue.queue_url", "must be set (or QUEUE_URL)".into());
        }
        if self.auth.client_id.trim().is_empty() {
            push("auth.client_id", "must be set (or ONEDRIVE_CLIENT_ID)".into());
        }
        if self.auth.client_secret.trim().is_empty() {
            push(
                "auth.client_secret",
                "must be set (or ONEDRIVE_CLIENT_SECRET)".into(),
            );
        }

        // --- queue ---
        if !(1..=10).contains(&self.queue.max_messages) {
            push("queue.max_messages", "must be between 1 and 10".into());
        }
        if self.queue.wait_time_secs > 20 {
            push("queue.wait_time_secs", "must be at most 20".into());
        }

        // --- storage ---
        if self.storage.access_key_id.is_some() != self.storage.secret_access_key.is_some() {
            push(
                "storage.access_key_id",
                "access_key_id and secret_access_key must be set together".into(),
            );
        }

        // --- database ---
        if self.database.path.as_os_str().is_empty() {
            push("database.path", "must not be empty".into());
        }

        // --- auth / drive ---
        if !is_http_url(&self.auth.token_url) {
            push(
                "auth.token_url",
                format!("must be an http(s) URL: {}", self.auth.token_url),
            );
        }
        if self.auth.http_timeout_secs == 0 {
            push("auth.http_timeout_secs", "must be greater than 0".into());
        }
        if !is_http_url(&self.drive.base_url) {
            push(
                "drive.base_url",
                format!("must be an http(s) URL: {}", self.drive.base_url),
            );
        }
        if self.drive.http_timeout_secs == 0 {
            push("drive.http_timeout_secs", "must be greater than 0".into());
        }
        if self.drive.batch_concurrency == 0 {
            push("drive.batch_concurrency", "must be greater than 0".into());
        }

        // --- dispatch ---
        let dispatch = &self.dispatch;
        for (field, value) in [
            ("dispatch.subscriber_count", dispatch.subscriber_count),
            ("dispatch.worker_count", dispatch.worker_count),
            ("dispatch.staging_capacity", dispatch.staging_capacity),
            (
                "dispatch.max_concurrent_handlers",
                dispatch.max_concurrent_handlers,
            ),
        ] {
            if value == 0 {
                push(field, "must be greater than 0".into());
            }
        }
        if !(dispatch.throttle_rate.is_finite() && dispatch.throttle_rate > 0.0) {
            push("dispatch.throttle_rate", "must be greater than 0".into());
        }
        if dispatch.retry.max_attempts == 0 {
            push("dispatch.retry.max_attempts", "must be at least 1".into());
        }
        if !(dispatch.retry.multiplier.is_finite() && dispatch.retry.multiplier >= 1.0) {
            push("dispatch.retry.multiplier", "must be at least 1.0".into());
        }
        if dispatch.retry.initial_backoff_ms > dispatch.retry.max_backoff_ms {
            push(
                "dispatch.retry.initial_backoff_ms",
                format!(
                    "must not exceed max_backoff_ms ({})",
                    dispatch.retry.max_backoff_ms
                ),
            );
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            push(
                "logging.format",
                format!(
                    "invalid format '{}', expected one of: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            );
        }

        errors
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.config.environment = environment.into();
        self
    }

    // --- queue ---

    pub fn queue_url(mut self, url: impl Into<String>) -> Self {
        self.config.queue.queue_url = url.into();
        self
    }

    pub fn queue_max_messages(mut self, n: u32) -> Self {
        self.config.queue.max_messages = n;
        self
    }

    pub fn queue_wait_time_secs(mut self, seconds: u64) -> Self {
        self.config.queue.wait_time_secs = seconds;
        self
    }

    // --- storage ---

    pub fn storage_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.storage.endpoint = Some(endpoint.into());
        self
    }

    pub fn storage_force_path_style(mut self, enabled: bool) -> Self {
        self.config.storage.force_path_style = enabled;
        self
    }

    // --- database ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database.path = path;
        self
    }

    // --- auth ---

    pub fn auth_client(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.config.auth.client_id = id.into();
        self.config.auth.client_secret = secret.into();
        self
    }

    pub fn auth_token_url(mut self, url: impl Into<String>) -> Self {
        self.config.auth.token_url = url.into();
        self
    }

    pub fn auth_cache_access_tokens(mut self, enabled: bool) -> Self {
        self.config.auth.cache_access_tokens = enabled;
        self
    }

    // --- drive ---

    pub fn drive_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.drive.base_url = url.into();
        self
    }

    pub fn drive_batch_concurrency(mut self, n: usize) -> Self {
        self.config.drive.batch_concurrency = n;
        self
    }

    // --- dispatch ---

    pub fn dispatch_subscriber_count(mut self, n: usize) -> Self {
        self.config.dispatch.subscriber_count = n;
        self
    }

    pub fn dispatch_worker_count(mut self, n: usize) -> Self {
        self.config.dispatch.worker_count = n;
        self
    }

    pub fn dispatch_staging_capacity(mut self, n: usize) -> Self {
        self.config.dispatch.staging_capacity = n;
        self
    }

    pub fn dispatch_max_concurrent_handlers(mut self, n: usize) -> Self {
        self.config.dispatch.max_concurrent_handlers = n;
        self
    }

    pub fn dispatch_throttle_rate(mut self, per_second: f64) -> Self {
        self.config.dispatch.throttle_rate = per_second;
        self
    }

    pub fn dispatch_retry_max_attempts(mut self, n: u32) -> Self {
        self.config.dispatch.retry.max_attempts = n;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
