//! Configuration management for repsol-sync
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files, with environment overrides for credentials
//! so they need not live in the file.

mod defaults;

use crate::error::{Result, SyncError};
use crate::model::Credentials;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "REPSOL_SYNC_CONFIG";
pub const USERNAME_ENV: &str = "REPSOL_USERNAME";
pub const PASSWORD_ENV: &str = "REPSOL_PASSWORD";
pub const CONTRACT_ENV: &str = "REPSOL_CONTRACT";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Account credentials and contract selection
    pub account: AccountConfig,

    /// Upstream API endpoints and limits
    pub api: ApiConfig,

    /// Refresh cadence
    pub sync: SyncConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Account configuration
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AccountConfig {
    /// Login e-mail
    pub username: String,

    /// Login password
    #[serde(skip_serializing)]
    pub password: String,

    /// Only synchronize this contract (code or CUPS)
    pub contract_id: Option<String>,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("contract_id", &self.contract_id)
            .finish()
    }
}

impl AccountConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Identity provider login endpoint
    pub login_url: String,

    /// API key sent with the login form
    pub api_key: String,

    /// Extra form fields sent with the login request
    pub login_params: BTreeMap<String, String>,

    /// Base URL of the customer-area API
    pub base_url: String,

    /// Contract listing path
    pub contracts_path: String,

    /// House details path template (`{house_id}`)
    pub house_path: String,

    /// Cost/consumption path template (`{house_id}`, `{contract_id}`)
    pub consumption_path: String,

    /// Invoice listing path template
    pub invoices_path: String,

    /// Next invoice estimate path template
    pub next_invoice_path: String,

    /// Virtual battery history path template
    pub battery_path: String,

    /// User-Agent header value
    pub user_agent: String,

    /// Bound on every upstream call in seconds
    pub request_timeout_secs: u64,

    /// How long a login is trusted before re-authenticating, in seconds
    pub session_validity_secs: u64,
}

impl ApiConfig {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn session_validity(&self) -> Duration {
        Duration::from_secs(self.session_validity_secs)
    }
}

/// Refresh cadence used by the scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between refreshes after a successful cycle
    pub update_interval_secs: u64,

    /// Seconds before the next attempt after a failed cycle
    pub retry_interval_secs: u64,
}

impl SyncConfig {
    pub const fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub const fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    pub level: String,

    /// Override level for console output
    pub console_level: Option<String>,

    /// Override level for file output
    pub file_level: Option<String>,

    /// Path to log file
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first location that exists
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Self::from_file(path);
        }

        let default_paths = [
            "repsol_sync.yaml",
            "/data/repsol_sync.yaml",
            "/etc/repsol-sync/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Self::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Apply credential overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply credential overrides from an arbitrary lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(USERNAME_ENV).filter(|v| !v.is_empty()) {
            self.account.username = v;
        }
        if let Some(v) = lookup(PASSWORD_ENV).filter(|v| !v.is_empty()) {
            self.account.password = v;
        }
        if let Some(v) = lookup(CONTRACT_ENV).filter(|v| !v.is_empty()) {
            self.account.contract_id = Some(v);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.account.username.trim().is_empty() {
            return Err(SyncError::validation(
                "account.username",
                "Username cannot be empty",
            ));
        }

        if self.account.password.is_empty() {
            return Err(SyncError::validation(
                "account.password",
                "Password cannot be empty",
            ));
        }

        for (field, url) in [
            ("api.login_url", &self.api.login_url),
            ("api.base_url", &self.api.base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SyncError::validation(
                    field,
                    "Must be an http(s) URL",
                ));
            }
        }

        if self.api.request_timeout_secs == 0 {
            return Err(SyncError::validation(
                "api.request_timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.api.session_validity_secs == 0 {
            return Err(SyncError::validation(
                "api.session_validity_secs",
                "Must be greater than 0",
            ));
        }

        if self.sync.update_interval_secs == 0 {
            return Err(SyncError::validation(
                "sync.update_interval_secs",
                "Must be greater than 0",
            ));
        }

        if self.sync.retry_interval_secs == 0 {
            return Err(SyncError::validation(
                "sync.retry_interval_secs",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}
