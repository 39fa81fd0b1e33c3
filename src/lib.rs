// src/lib.rs
// DOCUMENTATION: Library root shared by the server and admin binaries
// PURPOSE: Configuration, database bootstrap/pool/diagnostic, HTTP handlers

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;

use config::Config;

/// Initialize env_logger once per process
/// DOCUMENTATION: RUST_LOG wins when set; otherwise LOG_LEVEL is used for
/// this crate with quieter defaults for actix and sqlx.
pub fn init_logging(config: &Config) {
    let level = if config.log_level.is_empty() {
        "info"
    } else {
        config.log_level.as_str()
    };
    let filter = format!("{},actix_web=info,sqlx=warn", level);

    // try_init: tests and embedding binaries may already have a logger
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .try_init();
}
