//! Sweep and database configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use bookstore_core::DEFAULT_UNPAID_TIMEOUT_SECS;
use serde::{Deserialize, Serialize};

use crate::pool::DbConfig;

/// Configuration of the `sweep` and `seed` binaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// SQLite database file (`BOOKSTORE_DB_PATH`)
    pub database_path: PathBuf,

    /// Pool size (`BOOKSTORE_DB_MAX_CONNECTIONS`)
    pub max_connections: u32,

    /// Per-connection busy timeout in ms (`BOOKSTORE_BUSY_TIMEOUT_MS`)
    pub busy_timeout_ms: u64,

    /// Age in seconds after which unpaid orders are cancelled
    /// (`BOOKSTORE_UNPAID_TIMEOUT_SECS`)
    pub unpaid_timeout_secs: i64,
}

impl SweepConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = SweepConfig {
            database_path: lookup("BOOKSTORE_DB_PATH")
                .unwrap_or_else(|| "./bookstore.db".to_string())
                .into(),

            max_connections: lookup("BOOKSTORE_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BOOKSTORE_DB_MAX_CONNECTIONS".to_string()))?,

            busy_timeout_ms: lookup("BOOKSTORE_BUSY_TIMEOUT_MS")
                .unwrap_or_else(|| "5000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BOOKSTORE_BUSY_TIMEOUT_MS".to_string()))?,

            unpaid_timeout_secs: lookup("BOOKSTORE_UNPAID_TIMEOUT_SECS")
                .unwrap_or_else(|| DEFAULT_UNPAID_TIMEOUT_SECS.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BOOKSTORE_UNPAID_TIMEOUT_SECS".to_string()))?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "BOOKSTORE_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        if config.unpaid_timeout_secs < 0 {
            return Err(ConfigError::InvalidValue(
                "BOOKSTORE_UNPAID_TIMEOUT_SECS".to_string(),
            ));
        }

        Ok(config)
    }

    /// Database settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
