use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::StoreError;
use crate::models::{Color, Outcome};

/// Database row for the outcomes table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OutcomeRow {
    pub external_id: String,
    pub roll: Option<i16>,
    pub color: String,
    pub occurred_at: DateTime<Utc>,
}

impl TryFrom<OutcomeRow> for Outcome {
    type Error = StoreError;

    fn try_from(row: OutcomeRow) -> Result<Self, Self::Error> {
        let cached_color = Color::from_api_str(&row.color)
            .ok_or_else(|| StoreError::Corrupt(format!("outcome {} color {:?}", row.external_id, row.color)))?;

        Ok(Outcome {
            external_id: row.external_id,
            roll: row.roll,
            cached_color,
            occurred_at: row.occurred_at,
        })
    }
}

fn into_outcomes(rows: Vec<OutcomeRow>) -> Result<Vec<Outcome>, StoreError> {
    rows.into_iter().map(Outcome::try_from).collect()
}

/// Insert an outcome; a duplicate external id is a no-op.
pub async fn insert_outcome(pool: &PgPool, outcome: &Outcome) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        INSERT INTO outcomes (external_id, roll, color, occurred_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (external_id) DO NOTHING
        "#,
    )
    .bind(&outcome.external_id)
    .bind(outcome.roll)
    .bind(outcome.color().as_str())
    .bind(outcome.occurred_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Get the N most recent outcomes, newest first.
pub async fn get_latest(pool: &PgPool, limit: i64) -> Result<Vec<Outcome>, StoreError> {
    let rows = sqlx::query_as::<_, OutcomeRow>(
        r#"
        SELECT external_id, roll, color, occurred_at
        FROM outcomes
        ORDER BY occurred_at DESC, external_id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    into_outcomes(rows)
}

pub async fn count_outcomes(pool: &PgPool) -> Result<i64, StoreError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM outcomes")
        .fetch_one(pool)
        .await?;

    Ok(row.0)
}

/// First outcome that occurred strictly after `after`.
pub async fn get_first_after(pool: &PgPool, after: DateTime<Utc>) -> Result<Option<Outcome>, StoreError> {
    let row = sqlx::query_as::<_, OutcomeRow>(
        r#"
        SELECT external_id, roll, color, occurred_at
        FROM outcomes
        WHERE occurred_at > $1
        ORDER BY occurred_at ASC, external_id ASC
        LIMIT 1
        "#,
    )
    .bind(after)
    .fetch_optional(pool)
    .await?;

    row.map(Outcome::try_from).transpose()
}
