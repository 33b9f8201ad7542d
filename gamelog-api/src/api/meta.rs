//! Metascore lookup and write-back endpoints

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::catalog::Lookup;
use crate::enrich::Enrichment;
use crate::writeback::FlushReport;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct MetaQuery {
    pub title: String,
    /// Only used when `enrich.platform_aware_keys` is on: it narrows the
    /// catalog search and fills `metascore_platform`. With title-only keys it
    /// is ignored so the answer matches what the cache holds for the title.
    #[serde(default)]
    pub platform: Option<String>,
}

/// GET /api/meta/test?title=...&platform=...
///
/// Cache-then-catalog lookup for one title. A catalog result is cached but
/// not written to the spreadsheet.
///
/// **Errors:**
/// - 400: empty title
/// - 404: no match, or the catalog could not be reached
pub async fn lookup_title(
    State(state): State<AppState>,
    Query(query): Query<MetaQuery>,
) -> ApiResult<Json<Enrichment>> {
    let title = query.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    match state.service.enrich_row(title, query.platform.as_deref()).await {
        Lookup::Found(enrichment) => Ok(Json(enrichment)),
        Lookup::NotFound => Err(ApiError::NotFound(format!("No catalog match for '{}'", title))),
    }
}

/// POST /api/meta/flush
///
/// Merge fresh cached metascores into the spreadsheet.
pub async fn flush(State(state): State<AppState>) -> ApiResult<Json<FlushReport>> {
    let report = state.service.flush_enrichment().await?;
    info!(overwritten = report.overwritten, "Flush requested via API");
    Ok(Json(report))
}

pub fn meta_routes() -> Router<AppState> {
    Router::new()
        .route("/api/meta/test", get(lookup_title))
        .route("/api/meta/flush", post(flush))
}
