use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::api::ws_types::{AnalysisEvent, SignalEvent, StatsUpdate, WsMessage};
use crate::config::RuntimeSettings;
use crate::db::Store;
use crate::ingestion::FeedEvent;
use crate::intelligence::StrategyEngine;
use crate::models::{Outcome, Signal};
use crate::services::broadcast::BroadcastHub;
use crate::services::config_reloader::SettingsHandle;
use crate::services::signal_manager::SignalManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
}

/// What one pipeline cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outcome_id: String,
    pub total_count: i64,
    pub verified: usize,
    pub predictions: usize,
    pub new_signals: Vec<Signal>,
}

#[derive(Default)]
struct PipelineState {
    last_processed_id: Option<String>,
}

/// Drives insert → verify → analyze → generate → broadcast for every newly
/// detected outcome, plus the periodic verification backstop.
///
/// Cycles are serialised through `pipeline`, so the stream and the poller
/// can both call in without racing on `last_processed_id`.
pub struct Orchestrator {
    store: Arc<dyn Store>,
    engine: Arc<StrategyEngine>,
    signals: SignalManager,
    hub: BroadcastHub,
    settings: Arc<SettingsHandle>,
    pipeline: Mutex<PipelineState>,
    running: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        engine: Arc<StrategyEngine>,
        hub: BroadcastHub,
        settings: Arc<SettingsHandle>,
    ) -> Self {
        Self {
            signals: SignalManager::new(store.clone()),
            store,
            engine,
            hub,
            settings,
            pipeline: Mutex::new(PipelineState::default()),
            running: AtomicBool::new(false),
        }
    }

    pub fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            tracing::info!(strategies = ?self.engine.strategy_names(), "Orchestrator running");
        }
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!("Orchestrator idle");
        }
    }

    pub fn run_state(&self) -> RunState {
        if self.running.load(Ordering::SeqCst) {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    /// Fresh snapshot of the runtime settings.
    pub fn settings(&self) -> RuntimeSettings {
        self.settings.current()
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.engine.strategy_names()
    }

    pub fn signal_manager(&self) -> &SignalManager {
        &self.signals
    }

    pub async fn last_processed_id(&self) -> Option<String> {
        self.pipeline.lock().await.last_processed_id.clone()
    }

    /// Run the full pipeline for one detected outcome. Returns `None` when
    /// idle, when the outcome is the one processed last, when it was already
    /// stored, or when storage fails.
    pub async fn on_new_outcome(&self, outcome: Outcome) -> Option<CycleReport> {
        if self.run_state() != RunState::Running {
            tracing::debug!(id = %outcome.external_id, "Orchestrator idle, ignoring outcome");
            return None;
        }

        let mut pipeline = self.pipeline.lock().await;
        if pipeline.last_processed_id.as_deref() == Some(outcome.external_id.as_str()) {
            counter!("outcomes_duplicate_total").increment(1);
            tracing::debug!(id = %outcome.external_id, "Outcome already processed, skipping");
            return None;
        }

        let start = Instant::now();
        let settings = self.settings.current();

        let inserted = match self.store.insert_outcome(&outcome).await {
            Ok(inserted) => inserted,
            Err(e) => {
                tracing::error!(error = %e, id = %outcome.external_id, "Failed to insert outcome");
                return None;
            }
        };
        pipeline.last_processed_id = Some(outcome.external_id.clone());

        if !inserted {
            counter!("outcomes_duplicate_total").increment(1);
            tracing::debug!(id = %outcome.external_id, "Outcome already stored, skipping cycle");
            return None;
        }
        counter!("outcomes_ingested_total").increment(1);

        let now = Utc::now();
        let verified = match self.signals.verify_pending(&settings, now).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "Verification failed");
                0
            }
        };

        let history = match self.store.latest_outcomes(settings.history_limit).await {
            Ok(h) => h,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load outcome history");
                return None;
            }
        };
        let recent: Vec<Outcome> = history
            .iter()
            .take(settings.analysis_window)
            .cloned()
            .collect();

        let predictions = self
            .engine
            .run_blocking(recent, history, settings.min_recent_sample)
            .await;

        let new_signals = self
            .signals
            .generate_signals(&predictions, &settings, now)
            .await;

        let total_count = self.store.count_outcomes().await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to count outcomes");
            0
        });

        match self.signals.snapshot().await {
            Ok((stats, stats_by_strategy)) => {
                self.hub.broadcast(&WsMessage::Analysis(AnalysisEvent {
                    last_outcome: outcome.clone(),
                    total_count,
                    new_signals: new_signals.iter().map(SignalEvent::from).collect(),
                    stats,
                    stats_by_strategy,
                }));
            }
            Err(e) => tracing::error!(error = %e, "Failed to compute signal stats"),
        }
        for signal in &new_signals {
            self.hub.broadcast(&WsMessage::Signal(SignalEvent::from(signal)));
        }

        histogram!("pipeline_latency_seconds").record(start.elapsed().as_secs_f64());
        tracing::info!(
            id = %outcome.external_id,
            color = %outcome.color(),
            total_count,
            verified,
            predictions = predictions.len(),
            signals = new_signals.len(),
            "Pipeline cycle complete"
        );

        Some(CycleReport {
            outcome_id: outcome.external_id,
            total_count,
            verified,
            predictions: predictions.len(),
            new_signals,
        })
    }

    /// Handle a polled snapshot. The newest outcome (by `occurred_at`) is
    /// compared against the last processed id; anything older is only
    /// backfilled into the store.
    pub async fn ingest_snapshot(&self, mut fetched: Vec<Outcome>) -> Option<CycleReport> {
        if self.run_state() == RunState::Idle {
            return None;
        }

        fetched.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
        let newest = fetched.pop()?;

        if self.last_processed_id().await.as_deref() == Some(newest.external_id.as_str()) {
            return None;
        }

        let mut backfilled: u64 = 0;
        for outcome in &fetched {
            match self.store.insert_outcome(outcome).await {
                Ok(true) => backfilled += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, id = %outcome.external_id, "Failed to backfill outcome");
                }
            }
        }
        if backfilled > 0 {
            counter!("outcomes_ingested_total").increment(backfilled);
            tracing::info!(count = backfilled, "Backfilled missed outcomes from poll snapshot");
        }

        self.on_new_outcome(newest).await
    }

    /// Verification sweep plus a stats broadcast, independent of new
    /// outcomes arriving.
    pub async fn backstop_tick(&self) -> usize {
        let settings = self.settings.current();

        let verified = match self.signals.verify_pending(&settings, Utc::now()).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "Backstop verification failed");
                return 0;
            }
        };

        match self.signals.snapshot().await {
            Ok((stats, stats_by_strategy)) => {
                self.hub.broadcast(&WsMessage::StatsUpdate(StatsUpdate {
                    stats,
                    stats_by_strategy,
                }));
            }
            Err(e) => tracing::error!(error = %e, "Backstop failed to compute stats"),
        }

        if verified > 0 {
            tracing::info!(verified, "Backstop verified pending signals");
        }
        verified
    }

    /// Main event loop: stream events in, backstop on a timer, until
    /// shutdown. Keeps running the backstop if the stream side closes.
    pub async fn run(
        self: Arc<Self>,
        mut feed_rx: mpsc::Receiver<FeedEvent>,
        backstop_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        self.start();

        let mut backstop = interval(backstop_interval);
        backstop.set_missed_tick_behavior(MissedTickBehavior::Delay);
        backstop.tick().await;

        let mut feed_open = true;

        loop {
            tokio::select! {
                event = feed_rx.recv(), if feed_open => {
                    match event {
                        Some(FeedEvent::Completed(outcome)) => {
                            if let Some(report) = self.on_new_outcome(outcome).await {
                                tracing::debug!(
                                    id = %report.outcome_id,
                                    signals = report.new_signals.len(),
                                    "New outcome processed from stream"
                                );
                            }
                        }
                        Some(FeedEvent::Phase(phase)) => {
                            self.hub.broadcast(&WsMessage::Phase(phase));
                        }
                        None => {
                            tracing::warn!("Feed event channel closed, continuing with backstop only");
                            feed_open = false;
                        }
                    }
                }
                _ = backstop.tick() => {
                    self.backstop_tick().await;
                }
                _ = shutdown.changed() => break,
            }
        }

        self.stop();
    }
}
