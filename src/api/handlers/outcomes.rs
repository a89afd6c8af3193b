use axum::extract::{Query, State};
use axum::Json;

use super::{ApiResponse, LimitQuery};
use crate::errors::AppError;
use crate::models::Outcome;
use crate::AppState;

/// GET /api/outcomes/recent?limit=N, most recent first.
pub async fn recent(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<Outcome>>>, AppError> {
    let outcomes = state.store.latest_outcomes(q.clamped()).await?;
    Ok(Json(ApiResponse::ok(outcomes)))
}
