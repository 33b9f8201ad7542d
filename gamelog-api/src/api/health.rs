//! Health and version endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::jobs::JobStatus;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// State of the startup enrichment job
    pub auto_enrich: JobStatus,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    /// Changes whenever the spreadsheet file is edited or rewritten
    pub version: String,
}

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let auto_enrich = state.auto_enrich.status();
    let status = match auto_enrich {
        JobStatus::Failed { .. } => "degraded",
        _ => "ok",
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "gamelog-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        auto_enrich,
    })
}

/// GET /api/version
pub async fn file_version(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: state.service.file_version(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/version", get(file_version))
}
