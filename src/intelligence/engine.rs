use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};

use super::{AbsenceRecovery, Momentum, PatternMining, Strategy, TransitionMatrix};
use crate::models::{Outcome, Prediction};

/// Runs every registered strategy over the same windows. A strategy that
/// errors, panics or emits out-of-range output is logged and skipped for
/// that cycle; the rest still contribute.
pub struct StrategyEngine {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl Default for StrategyEngine {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(TransitionMatrix),
            Arc::new(Momentum),
            Arc::new(AbsenceRecovery),
            Arc::new(PatternMining),
        ])
    }
}

impl StrategyEngine {
    pub fn new(strategies: Vec<Arc<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Synchronous fan-out. `recent` and `history` are most-recent-first.
    pub fn run(&self, recent: &[Outcome], history: &[Outcome], min_recent: usize) -> Vec<Prediction> {
        if recent.len() < min_recent {
            tracing::debug!(
                recent = recent.len(),
                min_recent,
                "Not enough recent outcomes to analyze"
            );
            return Vec::new();
        }

        let mut predictions = Vec::new();

        for strategy in &self.strategies {
            let name = strategy.name();
            let start = Instant::now();

            let outcome = catch_unwind(AssertUnwindSafe(|| strategy.analyze(recent, history)));

            histogram!("strategy_latency_seconds", "strategy" => name)
                .record(start.elapsed().as_secs_f64());

            match outcome {
                Ok(Ok(preds)) => {
                    for mut p in preds {
                        if !p.confidence.is_finite() || !(0.0..=100.0).contains(&p.confidence) {
                            tracing::warn!(
                                strategy = name,
                                confidence = p.confidence,
                                "Dropping prediction with out-of-range confidence"
                            );
                            continue;
                        }
                        p.strategy_name = name.to_string();
                        predictions.push(p);
                    }
                }
                Ok(Err(e)) => {
                    counter!("strategy_failures_total", "strategy" => name).increment(1);
                    tracing::error!(strategy = name, error = %e, "Strategy failed");
                }
                Err(_) => {
                    counter!("strategy_failures_total", "strategy" => name).increment(1);
                    tracing::error!(strategy = name, "Strategy panicked");
                }
            }
        }

        predictions
    }

    /// Run on the blocking pool so a 10k-row history never stalls the
    /// async workers.
    pub async fn run_blocking(
        self: &Arc<Self>,
        recent: Vec<Outcome>,
        history: Vec<Outcome>,
        min_recent: usize,
    ) -> Vec<Prediction> {
        let engine = Arc::clone(self);
        match tokio::task::spawn_blocking(move || engine.run(&recent, &history, min_recent)).await {
            Ok(preds) => preds,
            Err(e) => {
                tracing::error!(error = %e, "Strategy engine task failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intelligence::testutil::{alternating, history_from_colors};
    use crate::models::Color;

    struct Failing;

    impl Strategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn analyze(&self, _: &[Outcome], _: &[Outcome]) -> anyhow::Result<Vec<Prediction>> {
            anyhow::bail!("boom")
        }
    }

    struct Panicking;

    impl Strategy for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn analyze(&self, _: &[Outcome], _: &[Outcome]) -> anyhow::Result<Vec<Prediction>> {
            panic!("strategy bug")
        }
    }

    struct OutOfRange;

    impl Strategy for OutOfRange {
        fn name(&self) -> &'static str {
            "out_of_range"
        }

        fn analyze(&self, _: &[Outcome], _: &[Outcome]) -> anyhow::Result<Vec<Prediction>> {
            Ok(vec![Prediction {
                color: Color::Red,
                confidence: 250.0,
                rationale: String::new(),
                strategy_name: String::new(),
            }])
        }
    }

    #[test]
    fn test_failures_are_isolated() {
        let engine = StrategyEngine::new(vec![
            Arc::new(Failing),
            Arc::new(Panicking),
            Arc::new(OutOfRange),
            Arc::new(TransitionMatrix),
        ]);
        let history = history_from_colors(&alternating(20));

        let preds = engine.run(&history, &history, 20);
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].strategy_name, "transition_matrix");
    }

    #[test]
    fn test_declines_below_recent_floor() {
        let engine = StrategyEngine::default();
        let history = history_from_colors(&alternating(19));
        assert!(engine.run(&history, &history, 20).is_empty());
    }

    #[test]
    fn test_default_registers_four_strategies() {
        let names = StrategyEngine::default().strategy_names();
        assert_eq!(
            names,
            vec!["transition_matrix", "momentum", "absence_recovery", "pattern_mining"]
        );
    }

    #[tokio::test]
    async fn test_run_blocking_matches_sync_run() {
        let engine = Arc::new(StrategyEngine::default());
        let history = history_from_colors(&alternating(60));
        let recent = history[..50].to_vec();

        let sync = engine.run(&recent, &history, 20);
        let offloaded = engine.run_blocking(recent, history, 20).await;
        assert_eq!(sync, offloaded);
    }
}
