//! Desired-state file parser.
//!
//! This module handles loading the desired-state file from YAML and applying
//! environment variable overrides to its controller section.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::settings::{ControllerSettings, LogLevel};
use crate::error::{ConfigError, Result, SyncError};
use crate::planner::DeletionRequest;
use crate::resource::{DescriptorInput, ResourceKind};

/// Environment variable overriding the controller host.
pub const ENV_CONTROLLER_HOST: &str = "DPSYNC_CONTROLLER_HOST";
/// Environment variable overriding the login user.
pub const ENV_USERNAME: &str = "DPSYNC_USERNAME";
/// Environment variable overriding the login password.
pub const ENV_PASSWORD: &str = "DPSYNC_PASSWORD";
/// Environment variable overriding the log verbosity.
pub const ENV_LOG_LEVEL: &str = "DPSYNC_LOG_LEVEL";

/// Where controller sessions are cached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    /// In-process map, gone when the run ends.
    #[default]
    Memory,
    /// JSON files under the user cache directory.
    File,
}

/// Controller section of the desired-state file.
///
/// Every field is optional here; [`ControllerSection::into_settings`] turns
/// it into validated [`ControllerSettings`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerSection {
    /// Controller address or URL.
    #[serde(default)]
    pub host: Option<String>,
    /// Login user.
    #[serde(default)]
    pub username: Option<String>,
    /// Login password. Prefer the environment for this one.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Log verbosity.
    #[serde(default)]
    pub log_level: Option<LogLevel>,
    /// Verify the controller TLS certificate.
    #[serde(default)]
    pub verify_tls: Option<bool>,
    /// Per-request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Session lifetime in seconds.
    #[serde(default)]
    pub session_ttl_secs: Option<u64>,
    /// Session cache backend.
    #[serde(default)]
    pub session_store: SessionStoreKind,
}

impl ControllerSection {
    /// Builds validated controller settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or any value is invalid.
    pub fn into_settings(self) -> std::result::Result<ControllerSettings, ConfigError> {
        let host = self.host.ok_or(ConfigError::MissingEnvVar {
            name: ENV_CONTROLLER_HOST.to_string(),
        })?;
        let username = self.username.ok_or(ConfigError::MissingEnvVar {
            name: ENV_USERNAME.to_string(),
        })?;
        let password = self.password.ok_or(ConfigError::MissingEnvVar {
            name: ENV_PASSWORD.to_string(),
        })?;

        let mut settings = ControllerSettings::new(host, username, password)?
            .with_log_level(self.log_level.unwrap_or_default())
            .with_verify_tls(self.verify_tls.unwrap_or(true));
        if let Some(secs) = self.timeout_secs {
            settings = settings.with_timeout_secs(secs)?;
        }
        if let Some(secs) = self.session_ttl_secs {
            settings = settings.with_session_ttl_secs(secs)?;
        }
        Ok(settings)
    }
}

/// One deletion batch for a container type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeletionGroup {
    /// Container type the batch applies to.
    pub container_type: ResourceKind,
    /// Detach and destroy requests.
    #[serde(flatten)]
    pub request: DeletionRequest,
}

/// Desired state of one device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Device address as known to the controller.
    pub address: String,
    /// Resources to create, per type.
    #[serde(default)]
    pub create: BTreeMap<ResourceKind, Vec<DescriptorInput>>,
    /// Partial updates, per type.
    #[serde(default)]
    pub edit: BTreeMap<ResourceKind, Vec<DescriptorInput>>,
    /// Resources to delete by key, per type.
    #[serde(default)]
    pub delete: BTreeMap<ResourceKind, Vec<DescriptorInput>>,
    /// Dependency-aware deletions.
    #[serde(default)]
    pub deletions: Vec<DeletionGroup>,
}

impl DeviceSpec {
    /// Number of descriptors and deletion requests for the device.
    #[must_use]
    pub fn item_count(&self) -> usize {
        let maps = [&self.create, &self.edit, &self.delete];
        let descriptors: usize = maps.iter().flat_map(|m| m.values()).map(Vec::len).sum();
        let deletions: usize = self
            .deletions
            .iter()
            .map(|g| g.request.detach.iter().map(|d| d.members.len()).sum::<usize>() + g.request.destroy.len())
            .sum();
        descriptors + deletions
    }
}

/// Root of a desired-state file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesiredState {
    /// Controller connection.
    #[serde(default)]
    pub controller: ControllerSection,
    /// Devices to reconcile.
    #[serde(default)]
    pub devices: Vec<DeviceSpec>,
}

impl DesiredState {
    /// Finds a device by address.
    #[must_use]
    pub fn device(&self, address: &str) -> Option<&DeviceSpec> {
        self.devices.iter().find(|d| d.address == address)
    }
}

/// Loader for desired-state files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory `.env` is looked up in.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a desired-state file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DesiredState> {
        let path = path.as_ref();
        info!("Loading desired state from: {}", path.display());

        if !path.exists() {
            return Err(SyncError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a desired-state document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DesiredState> {
        debug!("Parsing desired-state YAML");

        let state: DesiredState = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            SyncError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed desired state for {} device(s)", state.devices.len());
        Ok(state)
    }

    /// Loads a desired-state file and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an
    /// override carries an invalid value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<DesiredState> {
        let mut state = self.load_file(path)?;
        Self::apply_env_overrides(&mut state.controller, |name| std::env::var(name).ok())?;
        Ok(state)
    }

    /// Applies overrides from a variable lookup to the controller section.
    fn apply_env_overrides(
        section: &mut ControllerSection,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(host) = lookup(ENV_CONTROLLER_HOST) {
            debug!("Overriding controller.host from environment");
            section.host = Some(host);
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            debug!("Overriding controller.username from environment");
            section.username = Some(username);
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            debug!("Overriding controller.password from environment");
            section.password = Some(password);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            debug!("Overriding controller.log_level from environment");
            section.log_level = Some(level.parse()?);
        }
        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                SyncError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default desired-state file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["dpsync.yaml", "dpsync.yml", "desired-state.yaml"];

/// Finds the desired-state file in a directory or its parents.
///
/// # Errors
///
/// Returns an error if no file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found desired-state file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(SyncError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
