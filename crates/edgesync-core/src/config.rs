// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use crate::engine::DeltaOptions;

/// edgesync configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL or database file path
    pub database_url: String,
    /// Maximum pooled database connections
    pub max_db_connections: u32,
    /// Include tenant categories in deltas
    pub send_categories_delta: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `EDGESYNC_DATABASE_URL`: SQLite URL (`sqlite:...`) or file path
    ///
    /// Optional (with defaults):
    /// - `EDGESYNC_MAX_DB_CONNECTIONS`: pool size (default: 5)
    /// - `EDGESYNC_SEND_CATEGORIES_DELTA`: `true`/`1` to send categories (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("EDGESYNC_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("EDGESYNC_DATABASE_URL"))?;
        if database_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "EDGESYNC_DATABASE_URL",
                "must not be empty",
            ));
        }

        let max_db_connections: u32 = std::env::var("EDGESYNC_MAX_DB_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid(
                "EDGESYNC_MAX_DB_CONNECTIONS",
                "must be a positive integer",
            ))?;

        let send_categories_delta = match std::env::var("EDGESYNC_SEND_CATEGORIES_DELTA") {
            Err(_) => false,
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" | "" => false,
                _ => {
                    return Err(ConfigError::Invalid(
                        "EDGESYNC_SEND_CATEGORIES_DELTA",
                        "must be true, false, 1 or 0",
                    ));
                }
            },
        };

        Ok(Self {
            database_url,
            max_db_connections,
            send_categories_delta,
        })
    }

    /// Engine options derived from this configuration.
    pub fn delta_options(&self) -> DeltaOptions {
        DeltaOptions {
            send_categories_delta: self.send_categories_delta,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
