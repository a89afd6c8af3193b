pub mod config_repo;
pub mod memory;
pub mod outcome_repo;
pub mod postgres;
pub mod signal_repo;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Color, Outcome, Signal, SignalCounts, SignalResult};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Append-only outcome table keyed by external id.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Returns `false` when the external id already exists.
    async fn insert_outcome(&self, outcome: &Outcome) -> Result<bool, StoreError>;

    /// Most recent first, ordered by `occurred_at`.
    async fn latest_outcomes(&self, limit: usize) -> Result<Vec<Outcome>, StoreError>;

    async fn count_outcomes(&self) -> Result<i64, StoreError>;

    /// Earliest outcome strictly after `after`.
    async fn first_outcome_after(&self, after: DateTime<Utc>) -> Result<Option<Outcome>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn insert_signal(&self, signal: &Signal) -> Result<(), StoreError>;

    /// Newest signal for this strategy and colour created at or after `since`.
    async fn find_recent_signal(
        &self,
        strategy_name: &str,
        color: Color,
        since: DateTime<Utc>,
    ) -> Result<Option<Signal>, StoreError>;

    /// Pending signals created at or before `cutoff`, oldest first.
    async fn pending_signals_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Signal>, StoreError>;

    /// Atomically move a pending signal to a final result. Returns `false`
    /// if the signal was no longer pending.
    async fn resolve_signal(
        &self,
        id: Uuid,
        result: SignalResult,
        actual_color: Color,
        verified_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn get_signal(&self, id: Uuid) -> Result<Option<Signal>, StoreError>;

    async fn recent_signals(&self, limit: usize) -> Result<Vec<Signal>, StoreError>;

    /// Win/loss/pending tallies grouped by strategy.
    async fn signal_counts(&self) -> Result<Vec<SignalCounts>, StoreError>;
}

/// Persisted `runtime_config` key/value overrides.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load_runtime_config(&self) -> Result<HashMap<String, String>, StoreError>;

    async fn save_runtime_config(&self, entries: &HashMap<String, String>) -> Result<(), StoreError>;
}

pub trait Store: OutcomeStore + SignalStore + ConfigStore {}

impl<T: OutcomeStore + SignalStore + ConfigStore> Store for T {}

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Verify connectivity
    sqlx::query("SELECT 1").execute(&pool).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
