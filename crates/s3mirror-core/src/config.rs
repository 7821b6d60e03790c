//! Configuration module for s3mirror.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! The flat JSON layout used by earlier deployments is still accepted.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::mapping::{MappingRule, MappingRules, PathMapper};
use crate::domain::notification::{EventDecoder, EventNamePolicy};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for s3mirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aws: AwsConfig,
    pub queue: QueueConfig,
    /// Remote key prefix -> local directory, in declaration order.
    pub sync: MappingRules,
    pub events: EventsConfig,
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
}

/// AWS SDK settings shared by the queue and object store clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: String,
    /// Endpoint override, e.g. a LocalStack URL.
    pub endpoint_url: Option<String>,
    /// Total attempts per SDK call, including the first.
    pub max_attempts: u32,
}

/// Notification queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue name; the URL is resolved at startup.
    pub name: String,
    /// Messages requested per receive call.
    pub batch_size: u32,
    /// Long-polling wait in seconds.
    pub wait_time_seconds: u32,
    /// Visibility timeout in seconds; the queue default when unset.
    pub visibility_timeout: Option<u32>,
}

/// Event classification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub policy: EventNamePolicy,
}

/// Message loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Messages of one batch processed at the same time.
    pub message_concurrency: usize,
    /// First delay after a failed receive, in milliseconds.
    pub receive_backoff_initial_ms: u64,
    /// Upper bound for the receive delay, in seconds.
    pub receive_backoff_max_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`.
    pub format: String,
}

/// Flat JSON layout: `{"aws-queue": .., "aws-region": .., "sync": {..}}`.
#[derive(Debug, Deserialize)]
struct LegacyConfig {
    #[serde(rename = "aws-queue")]
    queue: String,
    #[serde(rename = "aws-region")]
    region: String,
    #[serde(default)]
    sync: MappingRules,
}

impl From<LegacyConfig> for Config {
    fn from(legacy: LegacyConfig) -> Self {
        let mut config = Config::default();
        config.aws.region = legacy.region;
        config.queue.name = legacy.queue;
        config.sync = legacy.sync;
        config
    }
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from `path`.
    ///
    /// Files ending in `.json` are read in the flat legacy layout, anything
    /// else as YAML.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            let legacy: LegacyConfig = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            Config::from(legacy)
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        };

        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/s3mirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("s3mirror")
            .join("config.yaml")
    }

    /// Mapping table built from the `sync` section.
    pub fn path_mapper(&self) -> PathMapper {
        PathMapper::new(self.sync.iter().cloned())
    }

    pub fn event_decoder(&self) -> EventDecoder {
        EventDecoder::new(self.events.policy)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint_url: None,
            max_attempts: 3,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            batch_size: 10,
            wait_time_seconds: 20,
            visibility_timeout: None,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            message_concurrency: 1,
            receive_backoff_initial_ms: 500,
            receive_backoff_max_secs: 60,
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

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"queue.batch_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

/// Receive limits imposed by the queue service.
const MAX_BATCH_SIZE: u32 = 10;
const MAX_WAIT_TIME_SECONDS: u32 = 20;
const MAX_VISIBILITY_TIMEOUT: u32 = 43_200;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- aws ---
        if self.aws.region.trim().is_empty() {
            errors.push(ValidationError {
                field: "aws.region".into(),
                message: "must not be empty".into(),
            });
        }
        if self.aws.max_attempts == 0 {
            errors.push(ValidationError {
                field: "aws.max_attempts".into(),
                message: "must be greater than 0".into(),
            });
        }
        if let Some(endpoint) = &self.aws.endpoint_url {
            match url::Url::parse(endpoint) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => errors.push(ValidationError {
                    field: "aws.endpoint_url".into(),
                    message: format!("unsupported scheme '{}'; expected http or https", url.scheme()),
                }),
                Err(e) => errors.push(ValidationError {
                    field: "aws.endpoint_url".into(),
                    message: format!("invalid URL '{endpoint}': {e}"),
                }),
            }
        }

        // --- queue ---
        if self.queue.name.trim().is_empty() {
            errors.push(ValidationError {
                field: "queue.name".into(),
                message: "must not be empty".into(),
            });
        }
        if self.queue.batch_size == 0 || self.queue.batch_size > MAX_BATCH_SIZE {
            errors.push(ValidationError {
                field: "queue.batch_size".into(),
                message: format!("must be in range 1..={MAX_BATCH_SIZE}"),
            });
        }
        if self.queue.wait_time_seconds > MAX_WAIT_TIME_SECONDS {
            errors.push(ValidationError {
                field: "queue.wait_time_seconds".into(),
                message: format!("must not exceed {MAX_WAIT_TIME_SECONDS}"),
            });
        }
        if self
            .queue
            .visibility_timeout
            .is_some_and(|t| t > MAX_VISIBILITY_TIMEOUT)
        {
            errors.push(ValidationError {
                field: "queue.visibility_timeout".into(),
                message: format!("must not exceed {MAX_VISIBILITY_TIMEOUT}"),
            });
        }

        // --- sync ---
        if self.sync.is_empty() {
            errors.push(ValidationError {
                field: "sync".into(),
                message: "at least one prefix mapping is required".into(),
            });
        }
        for prefix in self.sync.duplicate_prefixes() {
            errors.push(ValidationError {
                field: format!("sync.{prefix}"),
                message: "prefix is declared more than once".into(),
            });
        }
        for rule in self.sync.iter() {
            if rule.local_root.as_os_str().is_empty() {
                errors.push(ValidationError {
                    field: format!("sync.{}", rule.prefix),
                    message: "local directory must not be empty".into(),
                });
            }
        }

        // --- worker ---
        if self.worker.message_concurrency == 0 {
            errors.push(ValidationError {
                field: "worker.message_concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.worker.receive_backoff_initial_ms == 0 {
            errors.push(ValidationError {
                field: "worker.receive_backoff_initial_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.worker.receive_backoff_max_secs == 0 {
            errors.push(ValidationError {
                field: "worker.receive_backoff_max_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.worker.receive_backoff_initial_ms
            > self.worker.receive_backoff_max_secs.saturating_mul(1000)
        {
            errors.push(ValidationError {
                field: "worker.receive_backoff_initial_ms".into(),
                message: format!(
                    "initial backoff ({} ms) must not exceed the maximum ({} s)",
                    self.worker.receive_backoff_initial_ms, self.worker.receive_backoff_max_secs
                ),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use s3mirror_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .queue_name("s3-events")
///     .sync_rule("photos/", "/srv/mirror/photos")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- aws ---

    pub fn aws_region(mut self, region: impl Into<String>) -> Self {
        self.config.aws.region = region.into();
        self
    }

    pub fn aws_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.aws.endpoint_url = Some(url.into());
        self
    }

    pub fn aws_max_attempts(mut self, attempts: u32) -> Self {
        self.config.aws.max_attempts = attempts;
        self
    }

    // --- queue ---

    pub fn queue_name(mut self, name: impl Into<String>) -> Self {
        self.config.queue.name = name.into();
        self
    }

    pub fn queue_batch_size(mut self, n: u32) -> Self {
        self.config.queue.batch_size = n;
        self
    }

    pub fn queue_wait_time_seconds(mut self, seconds: u32) -> Self {
        self.config.queue.wait_time_seconds = seconds;
        self
    }

    pub fn queue_visibility_timeout(mut self, seconds: u32) -> Self {
        self.config.queue.visibility_timeout = Some(seconds);
        self
    }

    // --- sync ---

    /// Appends a mapping; later calls come later in declaration order.
    pub fn sync_rule(mut self, prefix: impl Into<String>, local_root: impl Into<PathBuf>) -> Self {
        self.config.sync.push(MappingRule::new(prefix, local_root));
        self
    }

    // --- events ---

    pub fn events_policy(mut self, policy: EventNamePolicy) -> Self {
        self.config.events.policy = policy;
        self
    }

    // --- worker ---

    pub fn worker_message_concurrency(mut self, n: usize) -> Self {
        self.config.worker.message_concurrency = n;
        self
    }

    pub fn worker_receive_backoff(mut self, initial_ms: u64, max_secs: u64) -> Self {
        self.config.worker.receive_backoff_initial_ms = initial_ms;
        self.config.worker.receive_backoff_max_secs = max_secs;
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

    /// Consume the builder and return the [`Config`] without validation.
    pub fn build(self) -> Config {
        self.config
    }

    /// Consume the builder, validate, and return the config or errors.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let errors = self.config.validate();
        if errors.is_empty() {
            Ok(self.config)
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
