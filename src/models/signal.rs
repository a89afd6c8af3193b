use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::Color;

/// Output of a single strategy invocation. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub color: Color,
    /// 0-100.
    pub confidence: f64,
    pub rationale: String,
    pub strategy_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalResult {
    Pending,
    Win,
    Loss,
}

impl SignalResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalResult::Pending => "PENDING",
            SignalResult::Win => "WIN",
            SignalResult::Loss => "LOSS",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(SignalResult::Pending),
            "WIN" => Some(SignalResult::Win),
            "LOSS" => Some(SignalResult::Loss),
            _ => None,
        }
    }
}

impl fmt::Display for SignalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted prediction awaiting (or having received) verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub id: Uuid,
    pub predicted_color: Color,
    pub confidence: f64,
    pub strategy_name: String,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
    pub result: SignalResult,
    /// Set iff `result != Pending`.
    pub actual_color: Option<Color>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl Signal {
    pub fn pending(prediction: &Prediction, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            predicted_color: prediction.color,
            confidence: prediction.confidence,
            strategy_name: prediction.strategy_name.clone(),
            rationale: prediction.rationale.clone(),
            created_at,
            result: SignalResult::Pending,
            actual_color: None,
            verified_at: None,
        }
    }
}

/// Per-strategy result tallies as returned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalCounts {
    pub strategy_name: String,
    pub wins: i64,
    pub losses: i64,
    pub pending: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalStats {
    pub total: i64,
    pub wins: i64,
    pub losses: i64,
    pub pending: i64,
    /// Percentage of decided signals that won; 0 when nothing is decided.
    #[serde(rename = "winRate")]
    pub win_rate: Decimal,
}

impl SignalStats {
    pub fn from_counts(wins: i64, losses: i64, pending: i64) -> Self {
        let decided = wins + losses;
        let win_rate = if decided > 0 {
            (Decimal::from(wins) * Decimal::from(100) / Decimal::from(decided)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        Self {
            total: decided + pending,
            wins,
            losses,
            pending,
            win_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyStats {
    pub strategy: String,
    #[serde(flatten)]
    pub stats: SignalStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_rate_excludes_pending() {
        let s = SignalStats::from_counts(3, 1, 10);
        assert_eq!(s.total, 14);
        assert_eq!(s.win_rate, Decimal::from(75));
    }

    #[test]
    fn test_win_rate_zero_when_undecided() {
        let s = SignalStats::from_counts(0, 0, 7);
        assert_eq!(s.win_rate, Decimal::ZERO);
        assert_eq!(s.pending, 7);
    }

    #[test]
    fn test_win_rate_rounds_to_two_places() {
        let s = SignalStats::from_counts(1, 2, 0);
        assert_eq!(s.win_rate, Decimal::new(3333, 2));
    }

    #[test]
    fn test_result_db_round_trip_strings() {
        assert_eq!(SignalResult::from_db_str("WIN"), Some(SignalResult::Win));
        assert_eq!(SignalResult::from_db_str("win"), None);
    }
}
