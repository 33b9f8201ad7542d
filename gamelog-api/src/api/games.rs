//! Game table and analytics endpoints

use axum::{extract::State, routing::get, Json, Router};

use crate::analytics::Analytics;
use crate::models::CanonicalRow;
use crate::{ApiResult, AppState};

/// GET /api/games
///
/// The canonical table, freshly read from the spreadsheet.
///
/// **Errors:**
/// - 500: spreadsheet missing or unreadable, or no title column
pub async fn list_games(State(state): State<AppState>) -> ApiResult<Json<Vec<CanonicalRow>>> {
    let rows = state.service.read_canonical_table().await?;
    Ok(Json(rows))
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<Analytics>> {
    let rows = state.service.read_canonical_table().await?;
    Ok(Json(state.service.compute_analytics(&rows)))
}

pub fn game_routes() -> Router<AppState> {
    Router::new()
        .route("/api/games", get(list_games))
        .route("/api/stats", get(stats))
}
