// src/config/db.rs
// DOCUMENTATION: Database connection settings
// PURPOSE: Derive pool settings and MySQL connect options from Config

use crate::config::Config;
use sqlx::mysql::MySqlConnectOptions;
use std::time::Duration;

/// Settings for the shared connection pool
/// DOCUMENTATION: Immutable once built. connection_limit >= 1 is enforced
/// by Config::validate(); queue_limit == 0 means unbounded waiters.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub wait_for_connections: bool,
    pub connection_limit: u32,
    pub queue_limit: usize,
    pub connect_timeout: Duration,
}

impl From<&Config> for PoolConfig {
    fn from(config: &Config) -> Self {
        PoolConfig {
            host: config.db_host.clone(),
            port: config.db_port,
            user: config.db_user.clone(),
            password: config.db_password.clone(),
            database: config.db_name.clone(),
            wait_for_connections: config.db_wait_for_connections,
            connection_limit: config.db_connection_limit.max(1),
            queue_limit: config.db_queue_limit,
            connect_timeout: Duration::from_secs(config.db_connect_timeout),
        }
    }
}

impl PoolConfig {
    /// Options for a connection with no database selected
    /// DOCUMENTATION: Used by the bootstrap, which has to create the
    /// database before it can select it.
    pub fn server_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .charset("utf8mb4")
    }

    /// Options for a connection with the configured database selected
    pub fn database_options(&self) -> MySqlConnectOptions {
        self.server_options().database(&self.database)
    }

    /// host:port, for log lines and hints
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
