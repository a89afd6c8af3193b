use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::ingestion::PhaseEvent;
use crate::models::{Color, Outcome, Signal, SignalStats, StrategyStats};

/// Messages broadcast to all connected WebSocket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    #[serde(rename = "connected")]
    Connected(ConnectedAck),

    #[serde(rename = "phase")]
    Phase(PhaseEvent),

    #[serde(rename = "signal")]
    Signal(SignalEvent),

    #[serde(rename = "analysis")]
    Analysis(AnalysisEvent),

    #[serde(rename = "stats_update")]
    StatsUpdate(StatsUpdate),
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectedAck {
    pub server_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalEvent {
    pub id: Uuid,
    pub predicted_color: Color,
    pub confidence: f64,
    pub strategy: String,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Signal> for SignalEvent {
    fn from(s: &Signal) -> Self {
        Self {
            id: s.id,
            predicted_color: s.predicted_color,
            confidence: s.confidence,
            strategy: s.strategy_name.clone(),
            rationale: s.rationale.clone(),
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisEvent {
    pub last_outcome: Outcome,
    pub total_count: i64,
    pub new_signals: Vec<SignalEvent>,
    pub stats: SignalStats,
    pub stats_by_strategy: Vec<StrategyStats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsUpdate {
    pub stats: SignalStats,
    pub stats_by_strategy: Vec<StrategyStats>,
}
