use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{config_repo, outcome_repo, signal_repo};
use super::{ConfigStore, OutcomeStore, SignalStore, StoreError};
use crate::models::{Color, Outcome, Signal, SignalCounts, SignalResult};

/// Postgres-backed store. Duplicate handling and the single PENDING
/// transition are enforced in SQL (`ON CONFLICT DO NOTHING`,
/// `WHERE result = 'PENDING'`), so concurrent writers need no locking here.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OutcomeStore for PgStore {
    async fn insert_outcome(&self, outcome: &Outcome) -> Result<bool, StoreError> {
        outcome_repo::insert_outcome(&self.pool, outcome).await
    }

    async fn latest_outcomes(&self, limit: usize) -> Result<Vec<Outcome>, StoreError> {
        outcome_repo::get_latest(&self.pool, limit as i64).await
    }

    async fn count_outcomes(&self) -> Result<i64, StoreError> {
        outcome_repo::count_outcomes(&self.pool).await
    }

    async fn first_outcome_after(&self, after: DateTime<Utc>) -> Result<Option<Outcome>, StoreError> {
        outcome_repo::get_first_after(&self.pool, after).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SignalStore for PgStore {
    async fn insert_signal(&self, signal: &Signal) -> Result<(), StoreError> {
        signal_repo::insert_signal(&self.pool, signal).await
    }

    async fn find_recent_signal(
        &self,
        strategy_name: &str,
        color: Color,
        since: DateTime<Utc>,
    ) -> Result<Option<Signal>, StoreError> {
        signal_repo::find_recent(&self.pool, strategy_name, color, since).await
    }

    async fn pending_signals_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Signal>, StoreError> {
        signal_repo::get_pending_before(&self.pool, cutoff).await
    }

    async fn resolve_signal(
        &self,
        id: Uuid,
        result: SignalResult,
        actual_color: Color,
        verified_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        signal_repo::resolve(&self.pool, id, result, actual_color, verified_at).await
    }

    async fn get_signal(&self, id: Uuid) -> Result<Option<Signal>, StoreError> {
        signal_repo::get_signal(&self.pool, id).await
    }

    async fn recent_signals(&self, limit: usize) -> Result<Vec<Signal>, StoreError> {
        signal_repo::get_recent(&self.pool, limit as i64).await
    }

    async fn signal_counts(&self) -> Result<Vec<SignalCounts>, StoreError> {
        signal_repo::get_counts(&self.pool).await
    }
}

#[async_trait]
impl ConfigStore for PgStore {
    async fn load_runtime_config(&self) -> Result<HashMap<String, String>, StoreError> {
        let rows = config_repo::get_all_config(&self.pool).await?;
        Ok(rows.into_iter().map(|e| (e.key, e.value)).collect())
    }

    async fn save_runtime_config(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        config_repo::upsert_config(&self.pool, entries).await
    }
}
