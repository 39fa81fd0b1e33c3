// src/handlers/init.rs
// DOCUMENTATION: Data init placeholder
// PURPOSE: Tell clients that project data lives in the hosted data service

use crate::errors::ApiError;
use actix_web::{web, HttpResponse};
use serde::Serialize;

const INIT_MESSAGE: &str =
    "Data operations are served directly by the hosted data service; this server only reports status.";

/// Body of GET /api/init
#[derive(Debug, Serialize)]
pub struct InitResponse {
    pub message: String,
    pub projects: Vec<serde_json::Value>,
    pub tasks: Vec<serde_json::Value>,
    pub documents: Vec<serde_json::Value>,
}

impl Default for InitResponse {
    fn default() -> Self {
        InitResponse {
            message: INIT_MESSAGE.to_string(),
            projects: Vec::new(),
            tasks: Vec::new(),
            documents: Vec::new(),
        }
    }
}

/// GET /api/init
pub async fn init_data() -> Result<HttpResponse, ApiError> {
    let body = serde_json::to_value(InitResponse::default())?;
    Ok(HttpResponse::Ok().json(body))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/init", web::get().to(init_data));
}
