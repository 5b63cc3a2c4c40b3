//! Typed, read-only settings loaded from a TOML file.
//!
//! The client adapters never read this directly; callers load settings and
//! hand the values in. Missing required keys surface when the caller asks
//! for them, not here.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ClientError;

/// Top-level settings parsed from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub api: Option<ApiSettings>,
    pub log: Option<LogSettings>,
}

/// Database connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub server: String,
    pub name: String,
    pub user: String,
    pub password: String,
    pub port: Option<u16>,
}

/// Upstream API settings, unused by the client core.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub url: String,
    pub key: Option<String>,
}

/// Log lifecycle settings consumed by [`crate::logging::LogManager`].
#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub dir: Option<String>,
    pub name_pattern: Option<String>,
    pub level: Option<String>,
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    /// Returns `ClientError::ConfigFileNotFound` when the file is missing,
    /// and the same kind with a cause when it exists but cannot be parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClientError::config_file_not_found(format!(
                "file {} not found",
                path.display()
            )));
        }
        let content = fs::read_to_string(path).map_err(|e| {
            ClientError::config_file_not_found_with(
                format!("file {} could not be read", path.display()),
                e,
            )
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::config_file_not_found_with(
                format!("file {} could not be parsed", path.display()),
                e,
            )
        })
    }

    #[must_use]
    pub fn database_server(&self) -> &str {
        &self.database.server
    }

    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.database.name
    }

    #[must_use]
    pub fn database_user(&self) -> &str {
        &self.database.user
    }

    #[must_use]
    pub fn database_password(&self) -> &str {
        &self.database.password
    }

    #[must_use]
    pub fn database_port(&self) -> Option<u16> {
        self.database.port
    }

    #[must_use]
    pub fn api_url(&self) -> Option<&str> {
        self.api.as_ref().map(|a| a.url.as_str())
    }

    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api.as_ref().and_then(|a| a.key.as_deref())
    }

    #[must_use]
    pub fn log_dir(&self) -> Option<&str> {
        self.log.as_ref().and_then(|l| l.dir.as_deref())
    }

    #[must_use]
    pub fn log_name_pattern(&self) -> Option<&str> {
        self.log.as_ref().and_then(|l| l.name_pattern.as_deref())
    }

    #[must_use]
    pub fn log_level(&self) -> Option<&str> {
        self.log.as_ref().and_then(|l| l.level.as_deref())
    }
}
