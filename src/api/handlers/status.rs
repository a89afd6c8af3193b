use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::config::RuntimeSettings;
use crate::ingestion::IngestorState;
use crate::services::RunState;
use crate::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub run_state: RunState,
    pub feed_channel: String,
    pub stream: IngestorState,
    pub degraded: bool,
    pub last_processed_id: Option<String>,
    pub total_outcomes: i64,
    pub strategies: Vec<&'static str>,
    pub ws_clients: usize,
    pub settings: RuntimeSettings,
}

/// GET /api/status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let stream = *state.ingestor_state.borrow();
    let total_outcomes = state.store.count_outcomes().await.unwrap_or(0);

    Json(StatusResponse {
        run_state: state.orchestrator.run_state(),
        feed_channel: state.config.feed_channel.clone(),
        stream,
        degraded: stream == IngestorState::Degraded,
        last_processed_id: state.orchestrator.last_processed_id().await,
        total_outcomes,
        strategies: state.orchestrator.strategy_names(),
        ws_clients: state.hub.subscriber_count(),
        settings: state.settings.current(),
    })
}
