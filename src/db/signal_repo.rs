use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::StoreError;
use crate::models::{Color, Signal, SignalCounts, SignalResult};

/// Database row for the signals table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SignalRow {
    pub id: Uuid,
    pub predicted_color: String,
    pub confidence: f64,
    pub strategy_name: String,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
    pub result: String,
    pub actual_color: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl TryFrom<SignalRow> for Signal {
    type Error = StoreError;

    fn try_from(row: SignalRow) -> Result<Self, Self::Error> {
        let predicted_color = Color::from_api_str(&row.predicted_color)
            .ok_or_else(|| StoreError::Corrupt(format!("signal {} color {:?}", row.id, row.predicted_color)))?;
        let result = SignalResult::from_db_str(&row.result)
            .ok_or_else(|| StoreError::Corrupt(format!("signal {} result {:?}", row.id, row.result)))?;
        let actual_color = match row.actual_color.as_deref() {
            Some(c) => Some(
                Color::from_api_str(c)
                    .ok_or_else(|| StoreError::Corrupt(format!("signal {} actual {:?}", row.id, c)))?,
            ),
            None => None,
        };

        Ok(Signal {
            id: row.id,
            predicted_color,
            confidence: row.confidence,
            strategy_name: row.strategy_name,
            rationale: row.rationale,
            created_at: row.created_at,
            result,
            actual_color,
            verified_at: row.verified_at,
        })
    }
}

fn into_signals(rows: Vec<SignalRow>) -> Result<Vec<Signal>, StoreError> {
    rows.into_iter().map(Signal::try_from).collect()
}

pub async fn insert_signal(pool: &PgPool, signal: &Signal) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO signals (id, predicted_color, confidence, strategy_name, rationale, created_at, result)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(signal.id)
    .bind(signal.predicted_color.as_str())
    .bind(signal.confidence)
    .bind(&signal.strategy_name)
    .bind(&signal.rationale)
    .bind(signal.created_at)
    .bind(signal.result.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_recent(
    pool: &PgPool,
    strategy_name: &str,
    color: Color,
    since: DateTime<Utc>,
) -> Result<Option<Signal>, StoreError> {
    let row = sqlx::query_as::<_, SignalRow>(
        r#"
        SELECT * FROM signals
        WHERE strategy_name = $1 AND predicted_color = $2 AND created_at >= $3
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(strategy_name)
    .bind(color.as_str())
    .bind(since)
    .fetch_optional(pool)
    .await?;

    row.map(Signal::try_from).transpose()
}

pub async fn get_pending_before(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<Vec<Signal>, StoreError> {
    let rows = sqlx::query_as::<_, SignalRow>(
        r#"
        SELECT * FROM signals
        WHERE result = 'PENDING' AND created_at <= $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    into_signals(rows)
}

/// Claim-and-resolve: only a row still PENDING is updated.
pub async fn resolve(
    pool: &PgPool,
    id: Uuid,
    result: SignalResult,
    actual_color: Color,
    verified_at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let done = sqlx::query(
        r#"
        UPDATE signals
        SET result = $2, actual_color = $3, verified_at = $4
        WHERE id = $1 AND result = 'PENDING'
        "#,
    )
    .bind(id)
    .bind(result.as_str())
    .bind(actual_color.as_str())
    .bind(verified_at)
    .execute(pool)
    .await?;

    Ok(done.rows_affected() == 1)
}

pub async fn get_signal(pool: &PgPool, id: Uuid) -> Result<Option<Signal>, StoreError> {
    let row = sqlx::query_as::<_, SignalRow>("SELECT * FROM signals WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(Signal::try_from).transpose()
}

pub async fn get_recent(pool: &PgPool, limit: i64) -> Result<Vec<Signal>, StoreError> {
    let rows = sqlx::query_as::<_, SignalRow>(
        "SELECT * FROM signals ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    into_signals(rows)
}

pub async fn get_counts(pool: &PgPool) -> Result<Vec<SignalCounts>, StoreError> {
    let rows: Vec<(String, i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT strategy_name,
               COUNT(*) FILTER (WHERE result = 'WIN')     AS wins,
               COUNT(*) FILTER (WHERE result = 'LOSS')    AS losses,
               COUNT(*) FILTER (WHERE result = 'PENDING') AS pending
        FROM signals
        GROUP BY strategy_name
        ORDER BY strategy_name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(strategy_name, wins, losses, pending)| SignalCounts {
            strategy_name,
            wins,
            losses,
            pending,
        })
        .collect())
}
