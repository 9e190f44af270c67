//! Configuration management
//!
//! This module handles loading, saving, and migrating the qs configuration file.
//! The configuration file is stored in TOML format at ~/.config/qs/config.toml,
//! or under `$QS_CONFIG_DIR` when that variable is set.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::profile::Profile;

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "QS_CONFIG_DIR";

/// Conventional listing batch size
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Default lifetime of signed read URLs: 3 hours
pub const DEFAULT_URL_TTL_SECS: u64 = 3 * 60 * 60;

/// Default wait before the first upload retry
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

/// Default output format
const DEFAULT_OUTPUT: &str = "human";

/// Default color setting
const DEFAULT_COLOR: &str = "auto";

/// How listing and upload failures are surfaced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorMode {
    /// Return whatever succeeded; failures are logged and dropped
    #[default]
    BestEffort,
    /// Any failure turns the whole call into an error
    Strict,
}

impl ErrorMode {
    pub fn is_strict(self) -> bool {
        self == ErrorMode::Strict
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Listing and transfer tuning
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Configured profiles
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

/// Default settings for CLI behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Output format: "human" or "json"
    #[serde(default = "default_output")]
    pub output: String,

    /// Color mode: "auto", "always", or "never"
    #[serde(default = "default_color")]
    pub color: String,

    /// Show progress indicators
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Profile used when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

/// Listing and transfer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Keys requested per listing page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Maximum in-flight uploads during a tree push; 0 means unbounded
    #[serde(default)]
    pub upload_concurrency: usize,

    /// Per-file upload deadline in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_timeout_secs: Option<u64>,

    /// Extra attempts for a failed file upload
    #[serde(default)]
    pub upload_retries: u32,

    /// Wait before the first retry in milliseconds; doubles per attempt
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Prefix every uploaded key with `/`
    #[serde(default)]
    pub rooted_keys: bool,

    /// Failure policy for listing and tree uploads
    #[serde(default)]
    pub error_mode: ErrorMode,

    /// Default lifetime of signed URLs in seconds
    #[serde(default = "default_url_ttl")]
    pub url_ttl_secs: u64,
}

fn default_output() -> String {
    DEFAULT_OUTPUT.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_retry_backoff() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

fn default_url_ttl() -> u64 {
    DEFAULT_URL_TTL_SECS
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            progress: true,
            profile: None,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            upload_concurrency: 0,
            upload_timeout_secs: None,
            upload_retries: 0,
            retry_backoff_ms: default_retry_backoff(),
            rooted_keys: false,
            error_mode: ErrorMode::default(),
            url_ttl_secs: default_url_ttl(),
        }
    }
}

impl TransferConfig {
    /// Per-file upload deadline
    pub fn upload_timeout(&self) -> Option<Duration> {
        self.upload_timeout_secs.map(Duration::from_secs)
    }

    /// Wait before the first upload retry
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Default signed URL lifetime
    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            transfer: TransferConfig::default(),
            profiles: Vec::new(),
        }
    }
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    ///
    /// `$QS_CONFIG_DIR` takes precedence over the platform config directory.
    pub fn new() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .join("qs"),
        };
        Ok(Self {
            config_path: config_dir.join("config.toml"),
        })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    /// If the schema version doesn't match, attempts migration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade qs.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        if config.transfer.page_size == 0 {
            return Err(Error::Config("transfer.page_size must be at least 1".into()));
        }

        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 600 (owner read/write only).
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }

    /// Migrate configuration from older schema version
    fn migrate(&self, config: Config) -> Result<Config> {
        let mut config = config;
        tracing::debug!(
            from = config.schema_version,
            to = SCHEMA_VERSION,
            "Migrating configuration"
        );
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}
