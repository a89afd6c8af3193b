use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::config::RuntimeSettings;
use crate::db::{Store, StoreError};
use crate::models::{Prediction, Signal, SignalResult, SignalStats, StrategyStats};

/// Turns predictions into persisted signals and settles them against later
/// outcomes.
#[derive(Clone)]
pub struct SignalManager {
    store: Arc<dyn Store>,
}

impl SignalManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Persist every prediction at or above the confidence floor, unless the
    /// same strategy already signalled the same colour within the dedupe
    /// window. Store errors skip the offending prediction.
    pub async fn generate_signals(
        &self,
        predictions: &[Prediction],
        settings: &RuntimeSettings,
        now: DateTime<Utc>,
    ) -> Vec<Signal> {
        let since = now - settings.dedupe_window();
        let mut created = Vec::new();

        for prediction in predictions {
            if prediction.confidence < settings.min_confidence {
                tracing::debug!(
                    strategy = %prediction.strategy_name,
                    color = %prediction.color,
                    confidence = prediction.confidence,
                    "Prediction below confidence floor"
                );
                continue;
            }

            match self
                .store
                .find_recent_signal(&prediction.strategy_name, prediction.color, since)
                .await
            {
                Ok(Some(existing)) => {
                    tracing::debug!(
                        strategy = %prediction.strategy_name,
                        color = %prediction.color,
                        existing = %existing.id,
                        "Duplicate signal within dedupe window, skipping"
                    );
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, strategy = %prediction.strategy_name, "Dedupe lookup failed");
                    continue;
                }
            }

            let signal = Signal::pending(prediction, now);
            if let Err(e) = self.store.insert_signal(&signal).await {
                tracing::error!(error = %e, strategy = %prediction.strategy_name, "Failed to persist signal");
                continue;
            }

            counter!("signals_created_total", "strategy" => signal.strategy_name.clone()).increment(1);
            tracing::info!(
                id = %signal.id,
                strategy = %signal.strategy_name,
                color = %signal.predicted_color,
                confidence = signal.confidence,
                "Signal created"
            );
            created.push(signal);
        }

        created
    }

    /// Settle pending signals older than the settle delay against the first
    /// outcome after their creation. Signals with no later outcome stay
    /// pending. Returns how many were resolved by this call.
    pub async fn verify_pending(
        &self,
        settings: &RuntimeSettings,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let cutoff = now - settings.settle_delay();
        let pending = self.store.pending_signals_before(cutoff).await?;
        let mut verified = 0;

        for signal in pending {
            let next = match self.store.first_outcome_after(signal.created_at).await {
                Ok(Some(o)) => o,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, id = %signal.id, "Failed to look up settling outcome");
                    continue;
                }
            };

            let actual = next.color();
            let result = if actual == signal.predicted_color {
                SignalResult::Win
            } else {
                SignalResult::Loss
            };

            match self.store.resolve_signal(signal.id, result, actual, now).await {
                Ok(true) => {
                    verified += 1;
                    counter!("signals_verified_total", "result" => result.as_str()).increment(1);
                    tracing::info!(
                        id = %signal.id,
                        strategy = %signal.strategy_name,
                        predicted = %signal.predicted_color,
                        actual = %actual,
                        outcome = %next.external_id,
                        result = %result,
                        "Signal verified"
                    );
                }
                Ok(false) => {
                    tracing::debug!(id = %signal.id, "Signal already settled elsewhere");
                }
                Err(e) => {
                    tracing::error!(error = %e, id = %signal.id, "Failed to resolve signal");
                }
            }
        }

        Ok(verified)
    }

    pub async fn stats(&self) -> Result<SignalStats, StoreError> {
        Ok(self.snapshot().await?.0)
    }

    pub async fn stats_by_strategy(&self) -> Result<Vec<StrategyStats>, StoreError> {
        Ok(self.snapshot().await?.1)
    }

    /// Aggregate and per-strategy stats from a single read.
    pub async fn snapshot(&self) -> Result<(SignalStats, Vec<StrategyStats>), StoreError> {
        let counts = self.store.signal_counts().await?;

        let (wins, losses, pending) = counts.iter().fold((0, 0, 0), |acc, c| {
            (acc.0 + c.wins, acc.1 + c.losses, acc.2 + c.pending)
        });

        let by_strategy = counts
            .into_iter()
            .map(|c| StrategyStats {
                strategy: c.strategy_name,
                stats: SignalStats::from_counts(c.wins, c.losses, c.pending),
            })
            .collect();

        Ok((SignalStats::from_counts(wins, losses, pending), by_strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, OutcomeStore, SignalStore};
    use crate::models::{Color, Outcome};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap()
    }

    fn prediction(strategy: &str, color: Color, confidence: f64) -> Prediction {
        Prediction {
            color,
            confidence,
            rationale: "test".into(),
            strategy_name: strategy.into(),
        }
    }

    fn manager() -> (Arc<MemoryStore>, SignalManager) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), SignalManager::new(store))
    }

    #[tokio::test]
    async fn test_confidence_floor() {
        let (_, mgr) = manager();
        let settings = RuntimeSettings::default();
        let created = mgr
            .generate_signals(
                &[
                    prediction("a", Color::Red, 64.9),
                    prediction("b", Color::Red, 65.0),
                ],
                &settings,
                t0(),
            )
            .await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].strategy_name, "b");
        assert_eq!(created[0].result, SignalResult::Pending);
        assert!(created[0].actual_color.is_none());
    }

    #[tokio::test]
    async fn test_dedupe_within_window() {
        let (store, mgr) = manager();
        let settings = RuntimeSettings::default();
        let p = prediction("transition_matrix", Color::Black, 80.0);

        assert_eq!(mgr.generate_signals(&[p.clone()], &settings, t0()).await.len(), 1);
        let again = mgr
            .generate_signals(&[p.clone()], &settings, t0() + Duration::seconds(20))
            .await;
        assert!(again.is_empty());

        // Other colour from the same strategy is not a duplicate.
        let other = mgr
            .generate_signals(
                &[prediction("transition_matrix", Color::Red, 80.0)],
                &settings,
                t0() + Duration::seconds(20),
            )
            .await;
        assert_eq!(other.len(), 1);

        // Past the window it fires again.
        let later = mgr
            .generate_signals(&[p], &settings, t0() + Duration::seconds(31))
            .await;
        assert_eq!(later.len(), 1);
        assert_eq!(store.recent_signals(10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_same_batch_duplicates_collapse() {
        let (_, mgr) = manager();
        let p = prediction("momentum", Color::Red, 70.0);
        let created = mgr
            .generate_signals(&[p.clone(), p], &RuntimeSettings::default(), t0())
            .await;
        assert_eq!(created.len(), 1);
    }

    #[tokio::test]
    async fn test_verify_win_after_settle_delay() {
        let (store, mgr) = manager();
        let settings = RuntimeSettings::default();
        let signal = mgr
            .generate_signals(&[prediction("x", Color::Red, 90.0)], &settings, t0())
            .await
            .remove(0);

        let outcome = Outcome::from_roll("g1", 4, t0() + Duration::seconds(65)).unwrap();
        store.insert_outcome(&outcome).await.unwrap();

        // Too early: settle delay not reached.
        assert_eq!(mgr.verify_pending(&settings, t0() + Duration::seconds(30)).await.unwrap(), 0);

        let now = t0() + Duration::seconds(65);
        assert_eq!(mgr.verify_pending(&settings, now).await.unwrap(), 1);

        let settled = store.get_signal(signal.id).await.unwrap().unwrap();
        assert_eq!(settled.result, SignalResult::Win);
        assert_eq!(settled.actual_color, Some(Color::Red));

        // A second pass never touches it again.
        assert_eq!(mgr.verify_pending(&settings, now + Duration::seconds(60)).await.unwrap(), 0);
        let again = store.get_signal(signal.id).await.unwrap().unwrap();
        assert_eq!(again, settled);
    }

    #[tokio::test]
    async fn test_verify_loss_uses_first_later_outcome() {
        let (store, mgr) = manager();
        let settings = RuntimeSettings::default();
        let signal = mgr
            .generate_signals(&[prediction("x", Color::Red, 90.0)], &settings, t0())
            .await
            .remove(0);

        // Before the signal: ignored. First after: black. Second after: red.
        for (id, roll, offset) in [("before", 2, -10), ("next", 11, 20), ("later", 2, 50)] {
            let o = Outcome::from_roll(id, roll, t0() + Duration::seconds(offset)).unwrap();
            store.insert_outcome(&o).await.unwrap();
        }

        mgr.verify_pending(&settings, t0() + Duration::seconds(120)).await.unwrap();
        let settled = store.get_signal(signal.id).await.unwrap().unwrap();
        assert_eq!(settled.result, SignalResult::Loss);
        assert_eq!(settled.actual_color, Some(Color::Black));
    }

    #[tokio::test]
    async fn test_pending_without_later_outcome_stays_pending() {
        let (store, mgr) = manager();
        let settings = RuntimeSettings::default();
        let signal = mgr
            .generate_signals(&[prediction("x", Color::Black, 90.0)], &settings, t0())
            .await
            .remove(0);

        let n = mgr
            .verify_pending(&settings, t0() + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(n, 0);
        let s = store.get_signal(signal.id).await.unwrap().unwrap();
        assert_eq!(s.result, SignalResult::Pending);
        assert!(s.actual_color.is_none());
    }

    #[tokio::test]
    async fn test_stats_by_strategy() {
        let (store, mgr) = manager();
        let settings = RuntimeSettings::default();
        mgr.generate_signals(
            &[
                prediction("a", Color::Red, 90.0),
                prediction("a", Color::Black, 90.0),
                prediction("b", Color::Red, 90.0),
            ],
            &settings,
            t0(),
        )
        .await;
        store
            .insert_outcome(&Outcome::from_roll("g", 1, t0() + Duration::seconds(5)).unwrap())
            .await
            .unwrap();
        mgr.verify_pending(&settings, t0() + Duration::seconds(61)).await.unwrap();

        let stats = mgr.stats().await.unwrap();
        assert_eq!((stats.total, stats.wins, stats.losses, stats.pending), (3, 2, 1, 0));
        assert_eq!(stats.win_rate, rust_decimal::Decimal::new(6667, 2));

        let by = mgr.stats_by_strategy().await.unwrap();
        assert_eq!(by.len(), 2);
        assert_eq!(by[0].strategy, "a");
        assert_eq!((by[0].stats.wins, by[0].stats.losses), (1, 1));
        assert_eq!(by[1].stats.win_rate, rust_decimal::Decimal::from(100));
    }
}
