// src/config/env.rs
// DOCUMENTATION: Environment variable management
// PURPOSE: Load and validate configuration from .env files

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Default database created by the bootstrap and used by the pool
pub const DEFAULT_DB_NAME: &str = "lahlah_os_db";

/// Default HTTP port for the front door
pub const DEFAULT_SERVER_PORT: u16 = 5000;

/// MySQL limits identifiers to 64 characters
const MAX_DB_NAME_LEN: usize = 64;

/// Errors raised while reading configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be true or false, got {value:?}")]
    InvalidFlag { key: &'static str, value: String },

    #[error("DB_CONNECTION_LIMIT must be at least 1")]
    ZeroConnectionLimit,

    #[error("DB_CONNECT_TIMEOUT must be at least 1 second")]
    ZeroConnectTimeout,

    #[error("DB_NAME must be between 1 and 64 characters, got {0:?}")]
    InvalidDatabaseName(String),
}

/// Application configuration loaded from environment variables
/// DOCUMENTATION: Centralizes all configuration in one struct
/// Load with Config::from_env() at application startup
#[derive(Debug, Clone)]
pub struct Config {
    /// MySQL server host
    pub db_host: String,

    /// MySQL server port (default 3306)
    pub db_port: u16,

    /// MySQL user
    pub db_user: String,

    /// MySQL password (may be empty)
    pub db_password: String,

    /// Database created by the bootstrap and selected by the pool
    pub db_name: String,

    /// Queue callers when every pooled connection is checked out
    pub db_wait_for_connections: bool,

    /// Maximum connections in the pool
    pub db_connection_limit: u32,

    /// Maximum queued callers, 0 means unbounded
    pub db_queue_limit: usize,

    /// Connect timeout in seconds for new connections
    pub db_connect_timeout: u64,

    /// Location of the DDL schema document
    pub schema_path: PathBuf,

    /// Server bind address (e.g., "127.0.0.1")
    pub server_address: String,

    /// Server listen port (default 5000)
    pub server_port: u16,

    /// Environment: development, staging, production
    pub environment: String,

    /// Log level: debug, info, warn, error
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_host: "localhost".to_string(),
            db_port: 3306,
            db_user: "root".to_string(),
            db_password: String::new(),
            db_name: DEFAULT_DB_NAME.to_string(),
            db_wait_for_connections: true,
            db_connection_limit: 10,
            db_queue_limit: 0,
            db_connect_timeout: 10,
            schema_path: default_schema_path(),
            server_address: "127.0.0.1".to_string(),
            server_port: DEFAULT_SERVER_PORT,
            environment: "development".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    /// DOCUMENTATION: Reads the process environment (call dotenv() first
    /// to pick up a local .env file). Called once at startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    /// DOCUMENTATION: Empty values count as unset so `DB_PASSWORD=` in a
    /// .env file keeps its default. Structurally invalid values fail fast.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let config = Config {
            db_host: get("DB_HOST").unwrap_or(defaults.db_host),
            db_port: parse_or("DB_PORT", get("DB_PORT"), defaults.db_port)?,
            db_user: get("DB_USER").unwrap_or(defaults.db_user),
            db_password: lookup("DB_PASSWORD").unwrap_or(defaults.db_password),
            db_name: get("DB_NAME")
                .map(|name| name.trim().to_string())
                .unwrap_or(defaults.db_name),
            db_wait_for_connections: parse_flag(
                "DB_WAIT_FOR_CONNECTIONS",
                get("DB_WAIT_FOR_CONNECTIONS"),
                defaults.db_wait_for_connections,
            )?,
            db_connection_limit: parse_or(
                "DB_CONNECTION_LIMIT",
                get("DB_CONNECTION_LIMIT"),
                defaults.db_connection_limit,
            )?,
            db_queue_limit: parse_or(
                "DB_QUEUE_LIMIT",
                get("DB_QUEUE_LIMIT"),
                defaults.db_queue_limit,
            )?,
            db_connect_timeout: parse_or(
                "DB_CONNECT_TIMEOUT",
                get("DB_CONNECT_TIMEOUT"),
                defaults.db_connect_timeout,
            )?,
            schema_path: get("SCHEMA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.schema_path),
            server_address: get("SERVER_ADDRESS").unwrap_or(defaults.server_address),
            server_port: parse_or("SERVER_PORT", get("SERVER_PORT"), defaults.server_port)?,
            environment: get("ENVIRONMENT").unwrap_or(defaults.environment),
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate critical configuration
    /// DOCUMENTATION: Ensures pool and bootstrap can start safely
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_connection_limit == 0 {
            return Err(ConfigError::ZeroConnectionLimit);
        }

        if self.db_connect_timeout == 0 {
            return Err(ConfigError::ZeroConnectTimeout);
        }

        if self.db_name.is_empty() || self.db_name.chars().count() > MAX_DB_NAME_LEN {
            return Err(ConfigError::InvalidDatabaseName(self.db_name.clone()));
        }

        if self.db_password.is_empty() {
            log::warn!("DB_PASSWORD is empty - connecting without a password");
        }

        Ok(())
    }
}

/// Schema document shipped with the crate
fn default_schema_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("database")
        .join("schema.sql")
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
    }
}

fn parse_flag(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key, value }),
        },
    }
}
