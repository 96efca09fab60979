use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::db::DbSettings;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port to listen on
    pub port: u16,
    /// Path to the SQLite database backing the store
    pub database_path: PathBuf,
    /// Collections the service will read and write
    pub collections: Vec<String>,
    /// Size of the session pool
    pub max_connections: u32,
    /// Timeout for a single dial attempt
    pub dial_timeout_secs: u64,
    /// Pause between failed dial attempts
    pub retry_interval_secs: u64,
    /// Stop dialing after this many failures (retry forever when unset)
    pub max_dial_attempts: Option<u32>,
    /// Deadline for streaming the ids of a collection
    pub ids_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("native-store")
                .join("native.db"),
            collections: Vec::new(),
            max_connections: 10,
            dial_timeout_secs: 30,
            retry_interval_secs: 5,
            max_dial_attempts: None,
            ids_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Self::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        // Apply environment variable overrides
        if let Ok(port) = std::env::var("NATIVE_STORE_PORT") {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue("NATIVE_STORE_PORT", port))?;
        }
        if let Ok(db_path) = std::env::var("NATIVE_STORE_DATABASE_PATH") {
            config.database_path = PathBuf::from(db_path);
        }
        if let Ok(collections) = std::env::var("NATIVE_STORE_COLLECTIONS") {
            config.collections = collections
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Default config file path: <config_dir>/native-store/config.yaml
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("native-store")
            .join("config.yaml")
    }

    /// Collection names end up as SQL identifiers, so only a safe
    /// alphabet is accepted.
    fn validate(&self) -> Result<(), ConfigError> {
        for collection in &self.collections {
            let valid = !collection.is_empty()
                && collection
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(ConfigError::InvalidCollection(collection.clone()));
            }
        }
        Ok(())
    }

    pub fn ids_timeout(&self) -> Duration {
        Duration::from_secs(self.ids_timeout_secs)
    }

    /// Store settings derived from this configuration
    pub fn db_settings(&self) -> DbSettings {
        let mut settings = DbSettings::new(&self.database_path, self.collections.iter().cloned());
        settings.max_connections = self.max_connections;
        settings.dial_timeout = Duration::from_secs(self.dial_timeout_secs);
        settings.retry_interval = Duration::from_secs(self.retry_interval_secs);
        settings.max_dial_attempts = self.max_dial_attempts;
        settings
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidCollection(String),
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    e
                )
            }
            ConfigError::InvalidCollection(name) => {
                write!(f, "Invalid collection name '{}'", name)
            }
            ConfigError::InvalidValue(var, value) => {
                write!(f, "Invalid value '{}' for {}", value, var)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
