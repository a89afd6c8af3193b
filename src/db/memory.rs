use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ConfigStore, OutcomeStore, SignalStore, StoreError};
use crate::models::{Color, Outcome, Signal, SignalCounts, SignalResult};

#[derive(Default)]
struct Inner {
    outcomes: HashMap<String, Outcome>,
    signals: Vec<Signal>,
    runtime_config: HashMap<String, String>,
}

/// In-process store with the same contracts as [`super::PgStore`].
/// Every operation takes the lock once, so check-and-write is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(a: &Outcome, b: &Outcome) -> std::cmp::Ordering {
    b.occurred_at
        .cmp(&a.occurred_at)
        .then_with(|| b.external_id.cmp(&a.external_id))
}

#[async_trait]
impl OutcomeStore for MemoryStore {
    async fn insert_outcome(&self, outcome: &Outcome) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.outcomes.contains_key(&outcome.external_id) {
            return Ok(false);
        }
        let mut stored = outcome.clone();
        stored.cached_color = outcome.color();
        inner.outcomes.insert(stored.external_id.clone(), stored);
        Ok(true)
    }

    async fn latest_outcomes(&self, limit: usize) -> Result<Vec<Outcome>, StoreError> {
        let inner = self.inner.read().await;
        let mut all: Vec<Outcome> = inner.outcomes.values().cloned().collect();
        all.sort_by(newest_first);
        all.truncate(limit);
        Ok(all)
    }

    async fn count_outcomes(&self) -> Result<i64, StoreError> {
        Ok(self.inner.read().await.outcomes.len() as i64)
    }

    async fn first_outcome_after(&self, after: DateTime<Utc>) -> Result<Option<Outcome>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .outcomes
            .values()
            .filter(|o| o.occurred_at > after)
            .min_by(|a, b| newest_first(b, a))
            .cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn insert_signal(&self, signal: &Signal) -> Result<(), StoreError> {
        self.inner.write().await.signals.push(signal.clone());
        Ok(())
    }

    async fn find_recent_signal(
        &self,
        strategy_name: &str,
        color: Color,
        since: DateTime<Utc>,
    ) -> Result<Option<Signal>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .signals
            .iter()
            .filter(|s| {
                s.strategy_name == strategy_name && s.predicted_color == color && s.created_at >= since
            })
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn pending_signals_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Signal>, StoreError> {
        let inner = self.inner.read().await;
        let mut pending: Vec<Signal> = inner
            .signals
            .iter()
            .filter(|s| s.result == SignalResult::Pending && s.created_at <= cutoff)
            .cloned()
            .collect();
        pending.sort_by_key(|s| s.created_at);
        Ok(pending)
    }

    async fn resolve_signal(
        &self,
        id: Uuid,
        result: SignalResult,
        actual_color: Color,
        verified_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner
            .signals
            .iter_mut()
            .find(|s| s.id == id && s.result == SignalResult::Pending)
        {
            Some(signal) => {
                signal.result = result;
                signal.actual_color = Some(actual_color);
                signal.verified_at = Some(verified_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_signal(&self, id: Uuid) -> Result<Option<Signal>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.signals.iter().find(|s| s.id == id).cloned())
    }

    async fn recent_signals(&self, limit: usize) -> Result<Vec<Signal>, StoreError> {
        let inner = self.inner.read().await;
        let mut all = inner.signals.clone();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn signal_counts(&self) -> Result<Vec<SignalCounts>, StoreError> {
        let inner = self.inner.read().await;
        let mut by_strategy: BTreeMap<&str, SignalCounts> = BTreeMap::new();

        for s in &inner.signals {
            let entry = by_strategy
                .entry(s.strategy_name.as_str())
                .or_insert_with(|| SignalCounts {
                    strategy_name: s.strategy_name.clone(),
                    ..SignalCounts::default()
                });
            match s.result {
                SignalResult::Win => entry.wins += 1,
                SignalResult::Loss => entry.losses += 1,
                SignalResult::Pending => entry.pending += 1,
            }
        }

        Ok(by_strategy.into_values().collect())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load_runtime_config(&self) -> Result<HashMap<String, String>, StoreError> {
        Ok(self.inner.read().await.runtime_config.clone())
    }

    async fn save_runtime_config(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for (k, v) in entries {
            inner.runtime_config.insert(k.clone(), v.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_duplicate_insert_is_noop() {
        let store = MemoryStore::new();
        let o = Outcome::from_roll("g1", 5, Utc::now()).unwrap();

        assert!(store.insert_outcome(&o).await.unwrap());
        assert!(!store.insert_outcome(&o).await.unwrap());
        assert_eq!(store.count_outcomes().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_same_id_store_one_row() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let o = Outcome::from_roll("race", 9, now).unwrap();
                store.insert_outcome(&o).await.unwrap()
            }));
        }

        let mut inserted = 0;
        for h in handles {
            if h.await.unwrap() {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(store.count_outcomes().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_latest_is_sorted_by_occurred_at_not_insert_order() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        for (id, offset) in [("b", 20), ("a", 10), ("c", 30)] {
            let o = Outcome::from_roll(id, 1, t0 + Duration::seconds(offset)).unwrap();
            store.insert_outcome(&o).await.unwrap();
        }

        let latest = store.latest_outcomes(2).await.unwrap();
        let ids: Vec<&str> = latest.iter().map(|o| o.external_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);

        let next = store.first_outcome_after(t0 + Duration::seconds(10)).await.unwrap();
        assert_eq!(next.unwrap().external_id, "b");
    }
}
