//! Profile management
//!
//! A profile names one storage connection: endpoint, credentials and the
//! bucket every key is scoped to.

use serde::{Deserialize, Serialize};

use crate::config::ConfigManager;
use crate::error::{Error, Result};

/// Connection settings for one bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Unique name for this profile
    pub name: String,

    /// S3-compatible endpoint URL
    pub endpoint: String,

    /// Access key
    pub access_key: String,

    /// Secret key
    pub secret_key: String,

    /// Bucket all keys live in
    pub bucket: String,

    /// Region name passed to the signer
    #[serde(default = "default_region")]
    pub region: String,

    /// Use path-style addressing instead of virtual-hosted buckets
    #[serde(default = "default_true")]
    pub path_style: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_true() -> bool {
    true
}

impl Profile {
    /// Create a new profile with required fields
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            bucket: bucket.into(),
            region: default_region(),
            path_style: true,
        }
    }

    /// Check that the profile can be used to build a client
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("Profile name cannot be empty".into()));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::Config(format!(
                "Profile name '{}' may only contain letters, digits, '_' and '-'",
                self.name
            )));
        }
        if self.bucket.is_empty() {
            return Err(Error::Config("Bucket name cannot be empty".into()));
        }

        let endpoint = url::Url::parse(&self.endpoint)?;
        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(Error::Config(format!(
                "Endpoint must use http or https, got '{}'",
                endpoint.scheme()
            )));
        }
        Ok(())
    }

    /// Whether the endpoint is reached over TLS
    pub fn use_https(&self) -> bool {
        self.endpoint.starts_with("https://")
    }
}

/// Manager for profile operations
pub struct ProfileManager {
    config_manager: ConfigManager,
}

impl ProfileManager {
    /// Create a new ProfileManager with a specific ConfigManager
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Create a new ProfileManager using the default config location
    pub fn new() -> Result<Self> {
        let config_manager = ConfigManager::new()?;
        Ok(Self { config_manager })
    }

    /// Access the underlying config manager
    pub fn config_manager(&self) -> &ConfigManager {
        &self.config_manager
    }

    /// List all configured profiles
    pub fn list(&self) -> Result<Vec<Profile>> {
        let config = self.config_manager.load()?;
        Ok(config.profiles)
    }

    /// Get a profile by name
    pub fn get(&self, name: &str) -> Result<Profile> {
        let config = self.config_manager.load()?;
        config
            .profiles
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }

    /// Resolve the profile to use: the explicit name, else the configured
    /// default, else the only profile present
    pub fn resolve(&self, name: Option<&str>) -> Result<Profile> {
        if let Some(name) = name {
            return self.get(name);
        }

        let config = self.config_manager.load()?;
        if let Some(default) = &config.defaults.profile {
            return self.get(default);
        }

        let mut profiles = config.profiles;
        if profiles.len() > 1 {
            return Err(Error::Config(
                "Several profiles configured. Pass --profile or set a default".into(),
            ));
        }
        profiles.pop().ok_or_else(|| {
            Error::Config("No profile configured. Run 'qs profile set' first".into())
        })
    }

    /// Add or update a profile
    pub fn set(&self, profile: Profile) -> Result<()> {
        profile.validate()?;
        let mut config = self.config_manager.load()?;

        config.profiles.retain(|p| p.name != profile.name);
        config.profiles.push(profile);

        self.config_manager.save(&config)
    }

    /// Make `name` the default profile
    pub fn set_default(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        if !config.profiles.iter().any(|p| p.name == name) {
            return Err(Error::ProfileNotFound(name.to_string()));
        }
        config.defaults.profile = Some(name.to_string());
        self.config_manager.save(&config)
    }

    /// Remove a profile
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let original_len = config.profiles.len();

        config.profiles.retain(|p| p.name != name);

        if config.profiles.len() == original_len {
            return Err(Error::ProfileNotFound(name.to_string()));
        }
        if config.defaults.profile.as_deref() == Some(name) {
            config.defaults.profile = None;
        }

        self.config_manager.save(&config)
    }

    /// Check if a profile exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        let config = self.config_manager.load()?;
        Ok(config.profiles.iter().any(|p| p.name == name))
    }
}
