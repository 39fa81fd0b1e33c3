// src/config/mod.rs
// DOCUMENTATION: Configuration module organization
// PURPOSE: Re-export configuration components

pub mod db;
pub mod env;

pub use db::PoolConfig;
pub use env::{Config, ConfigError, DEFAULT_DB_NAME, DEFAULT_SERVER_PORT};
