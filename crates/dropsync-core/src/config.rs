//! Configuration module for dropsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with environment overrides, validation, defaults, and a builder pattern for
//! programmatic use.
//!
//! Values are layered in this order, later layers winning:
//!
//! 1. built-in defaults
//! 2. the YAML file
//! 3. a `.env` file
//! 4. the process environment
//!
//! Empty values in layers 3 and 4 count as unset.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, KeyPrefix, SourceRoot};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for dropsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Dropbox source settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Folder to mirror, e.g. `/Apps/data`. `/` mirrors the whole drive.
    pub path: String,
    /// Team root namespace to list under, sent as `Dropbox-API-Path-Root`.
    pub root_namespace_id: Option<String>,
    /// Team member to act as, sent as `Dropbox-API-Select-User`.
    pub member_id: Option<String>,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    /// Long-lived refresh token exchanged for an access token at startup.
    pub refresh_token: Option<String>,
}

/// S3 destination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub bucket: String,
    /// Key namespace owned by dropsync. Normalized on use.
    pub prefix: String,
    /// AWS region. Falls back to the SDK's default provider chain when unset.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores.
    pub endpoint_url: Option<String>,
    /// Use path-style addressing (`endpoint/bucket/key`).
    pub force_path_style: bool,
    /// Static credentials. Both or neither; the default chain is used when unset.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Objects above this size (in MiB) are uploaded with multipart.
    pub multipart_threshold_mb: u64,
    /// Size of each multipart part (in MiB).
    pub part_size_mb: u64,
}

/// Reconciliation pass settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between passes in `watch` mode. `None` means one pass only.
    pub interval_secs: Option<u64>,
    /// Maximum number of concurrent per-key operations.
    pub max_concurrency: usize,
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
// Defaults
// ---------------------------------------------------------------------------

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: String::new(),
            region: None,
            endpoint_url: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
            multipart_threshold_mb: 100,
            part_size_mb: 16,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: None,
            max_concurrency: 4,
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
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/dropsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("dropsync")
            .join("config.yaml")
    }

    /// Load every layer against the real process environment.
    ///
    /// An explicit `path` must exist. Without one, the default path is used
    /// if present. A missing `env_file` is ignored.
    pub fn load_layered(path: Option<&Path>, env_file: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with(path, env_file, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load_layered`] with an injectable environment lookup.
    pub fn load_with<F>(
        path: Option<&Path>,
        env_file: Option<&Path>,
        process_env: F,
    ) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::load(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        let file_vars = match env_file {
            Some(env_file) if env_file.exists() => read_env_file(env_file)?,
            _ => HashMap::new(),
        };

        config.apply_env(|key| {
            non_empty(process_env(key)).or_else(|| non_empty(file_vars.get(key).cloned()))
        })?;

        Ok(config)
    }

    /// Override fields from environment-style variables.
    ///
    /// `lookup` returns `None` for unset variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key) {
                *target = value;
            }
        };
        set(&mut self.source.path, "DROPBOX_SOURCE_PATH");
        set(&mut self.destination.bucket, "S3_BUCKET_NAME");
        set(&mut self.destination.prefix, "S3_PREFIX");

        let set_opt = |target: &mut Option<String>, key: &str| {
            if let Some(value) = lookup(key) {
                *target = Some(value);
            }
        };
        set_opt(&mut self.source.refresh_token, "DROPBOX_REFRESH_TOKEN");
        set_opt(&mut self.source.app_key, "DROPBOX_APP_KEY");
        set_opt(&mut self.source.app_secret, "DROPBOX_APP_SECRET");
        set_opt(&mut self.source.root_namespace_id, "DROPBOX_SOURCE_ROOT_NS");
        set_opt(&mut self.source.member_id, "DROPBOX_MEMBER_ID");
        set_opt(&mut self.destination.access_key_id, "AWS_ACCESS_KEY_ID");
        set_opt(
            &mut self.destination.secret_access_key,
            "AWS_SECRET_ACCESS_KEY",
        );
        set_opt(&mut self.destination.region, "AWS_REGION");
        set_opt(&mut self.destination.endpoint_url, "S3_ENDPOINT_URL");

        if let Some(raw) = lookup("SYNC_INTERVAL_SECS") {
            let secs = raw
                .parse::<u64>()
                .with_context(|| format!("SYNC_INTERVAL_SECS is not a number: {raw}"))?;
            self.sync.interval_secs = Some(secs);
        }

        Ok(())
    }

    /// Validated source root.
    pub fn source_root(&self) -> Result<SourceRoot, DomainError> {
        SourceRoot::new(self.source.path.as_str())
    }

    /// Normalized destination prefix.
    pub fn key_prefix(&self) -> KeyPrefix {
        KeyPrefix::new(&self.destination.prefix)
    }

    /// Copy of this config with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        const MASK: &str = "********";
        let mask = |value: &Option<String>| value.as_ref().map(|_| MASK.to_string());

        let mut copy = self.clone();
        copy.source.app_secret = mask(&self.source.app_secret);
        copy.source.refresh_token = mask(&self.source.refresh_token);
        copy.destination.secret_access_key = mask(&self.destination.secret_access_key);
        copy
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a `.env` file without touching the process environment.
fn read_env_file(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to open env file {}", path.display()))?;

    let mut vars = HashMap::new();
    for entry in iter {
        let (key, value) =
            entry.with_context(|| format!("failed to parse env file {}", path.display()))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"destination.bucket"`.
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

/// S3 rejects multipart parts smaller than this, except the last one.
const MIN_PART_SIZE_MB: u64 = 5;

const MAX_CONCURRENCY: usize = 64;

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

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
            });
        };

        // --- source ---
        if self.source.path.trim().is_empty() {
            push("source.path", "is required (DROPBOX_SOURCE_PATH)".into());
        } else if let Err(e) = self.source_root() {
            push("source.path", e.to_string());
        }
        if is_blank(&self.source.app_key) {
            push("source.app_key", "is required (DROPBOX_APP_KEY)".into());
        }
        if is_blank(&self.source.app_secret) {
            push(
                "source.app_secret",
                "is required (DROPBOX_APP_SECRET)".into(),
            );
        }
        if is_blank(&self.source.refresh_token) {
            push(
                "source.refresh_token",
                "is required (DROPBOX_REFRESH_TOKEN)".into(),
            );
        }

        // --- destination ---
        if self.destination.bucket.trim().is_empty() {
            push("destination.bucket", "is required (S3_BUCKET_NAME)".into());
        }
        let key_set = !is_blank(&self.destination.access_key_id);
        let secret_set = !is_blank(&self.destination.secret_access_key);
        if key_set != secret_set {
            push(
                "destination.access_key_id",
                "access_key_id and secret_access_key must be set together".into(),
            );
        }
        if let Some(endpoint) = &self.destination.endpoint_url {
            if let Err(e) = url::Url::parse(endpoint) {
                push(
                    "destination.endpoint_url",
                    format!("invalid URL '{endpoint}': {e}"),
                );
            }
        }
        if self.destination.part_size_mb < MIN_PART_SIZE_MB {
            push(
                "destination.part_size_mb",
                format!("must be at least {MIN_PART_SIZE_MB}"),
            );
        }
        if self.destination.multipart_threshold_mb < self.destination.part_size_mb {
            push(
                "destination.multipart_threshold_mb",
                format!(
                    "multipart_threshold_mb ({}) must not be below part_size_mb ({})",
                    self.destination.multipart_threshold_mb, self.destination.part_size_mb
                ),
            );
        }

        // --- sync ---
        if self.sync.interval_secs == Some(0) {
            push("sync.interval_secs", "must be greater than 0".into());
        }
        if self.sync.max_concurrency == 0 || self.sync.max_concurrency > MAX_CONCURRENCY {
            push(
                "sync.max_concurrency",
                format!("must be in range 1..={MAX_CONCURRENCY}"),
            );
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            push(
                "logging.format",
                format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            );
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
/// use dropsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .source_path("/Apps/data")
///     .destination_bucket("backups")
///     .destination_prefix("bkp")
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

    // --- source ---

    pub fn source_path(mut self, path: impl Into<String>) -> Self {
        self.config.source.path = path.into();
        self
    }

    pub fn source_root_namespace_id(mut self, id: impl Into<String>) -> Self {
        self.config.source.root_namespace_id = Some(id.into());
        self
    }

    pub fn source_member_id(mut self, id: impl Into<String>) -> Self {
        self.config.source.member_id = Some(id.into());
        self
    }

    pub fn source_credentials(
        mut self,
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        self.config.source.app_key = Some(app_key.into());
        self.config.source.app_secret = Some(app_secret.into());
        self.config.source.refresh_token = Some(refresh_token.into());
        self
    }

    // --- destination ---

    pub fn destination_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.destination.bucket = bucket.into();
        self
    }

    pub fn destination_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.destination.prefix = prefix.into();
        self
    }

    pub fn destination_region(mut self, region: impl Into<String>) -> Self {
        self.config.destination.region = Some(region.into());
        self
    }

    pub fn destination_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.destination.endpoint_url = Some(url.into());
        self
    }

    pub fn destination_force_path_style(mut self, enabled: bool) -> Self {
        self.config.destination.force_path_style = enabled;
        self
    }

    pub fn destination_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.config.destination.access_key_id = Some(access_key_id.into());
        self.config.destination.secret_access_key = Some(secret_access_key.into());
        self
    }

    pub fn destination_multipart_threshold_mb(mut self, mb: u64) -> Self {
        self.config.destination.multipart_threshold_mb = mb;
        self
    }

    pub fn destination_part_size_mb(mut self, mb: u64) -> Self {
        self.config.destination.part_size_mb = mb;
        self
    }

    // --- sync ---

    pub fn sync_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.interval_secs = Some(seconds);
        self
    }

    pub fn sync_max_concurrency(mut self, n: usize) -> Self {
        self.config.sync.max_concurrency = n;
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

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
