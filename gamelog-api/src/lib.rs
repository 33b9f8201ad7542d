//! gamelog-api library interface
//!
//! Spreadsheet-backed game log with metascore enrichment. Exposes the
//! pipeline and the router for integration testing.

pub mod analytics;
pub mod api;
pub mod cache;
pub mod catalog;
pub mod enrich;
pub mod error;
pub mod jobs;
pub mod models;
pub mod platforms;
pub mod schema;
pub mod service;
pub mod sheet;
pub mod writeback;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use jobs::AutoEnrichJob;
use service::GameLog;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GameLog>,
    /// Startup reconciliation job, `Disabled` when not configured
    pub auto_enrich: AutoEnrichJob,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: Arc<GameLog>, auto_enrich: AutoEnrichJob) -> Self {
        Self {
            service,
            auto_enrich,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::game_routes())
        .merge(api::meta_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
