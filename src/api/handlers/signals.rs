use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use super::{ApiResponse, LimitQuery};
use crate::errors::AppError;
use crate::models::{Signal, SignalStats, StrategyStats};
use crate::AppState;

#[derive(Serialize)]
pub struct StatsResponse {
    pub stats: SignalStats,
    pub stats_by_strategy: Vec<StrategyStats>,
}

pub async fn recent(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<Signal>>>, AppError> {
    let signals = state.store.recent_signals(q.clamped()).await?;
    Ok(Json(ApiResponse::ok(signals)))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Signal>>, AppError> {
    match state.store.get_signal(id).await? {
        Some(signal) => Ok(Json(ApiResponse::ok(signal))),
        None => Err(AppError::NotFound(format!("signal {id}"))),
    }
}

/// GET /api/stats, aggregate and per-strategy win rates.
pub async fn stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StatsResponse>>, AppError> {
    let (stats, stats_by_strategy) = state.orchestrator.signal_manager().snapshot().await?;
    Ok(Json(ApiResponse::ok(StatsResponse {
        stats,
        stats_by_strategy,
    })))
}
