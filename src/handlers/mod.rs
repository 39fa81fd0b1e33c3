// src/handlers/mod.rs
// DOCUMENTATION: Handlers module organization
// PURPOSE: Mount every route under /api

pub mod health;
pub mod init;

use crate::errors::ApiError;
use actix_web::web;

pub use health::config as health_config;
pub use init::config as init_config;

/// Register all /api routes
pub fn api_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(health_config)
            .configure(init_config),
    );
}

/// Fallback for unknown routes
pub async fn not_found() -> Result<actix_web::HttpResponse, ApiError> {
    Err(ApiError::NotFound)
}
