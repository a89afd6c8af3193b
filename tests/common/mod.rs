use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::watch;

use rollsignal::api::router::create_router;
use rollsignal::config::{AppConfig, RuntimeSettings};
use rollsignal::db::MemoryStore;
use rollsignal::ingestion::IngestorState;
use rollsignal::intelligence::StrategyEngine;
use rollsignal::models::{Color, Outcome};
use rollsignal::services::{BroadcastHub, Orchestrator, SettingsHandle};
use rollsignal::AppState;

/// Everything an API or pipeline test needs, backed by the in-memory store.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub store: Arc<MemoryStore>,
    pub hub: BroadcastHub,
    pub settings: Arc<SettingsHandle>,
    pub orchestrator: Arc<Orchestrator>,
    pub ingestor_state: watch::Sender<IngestorState>,
}

#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        host: "127.0.0.1".into(),
        port: 0,
        feed_base_url: "http://127.0.0.1:1".into(),
        feed_stream_url: "ws://127.0.0.1:1".into(),
        feed_channel: "double".into(),
        stream_enabled: false,
        stream_max_reconnect_attempts: 4,
        backstop_interval_secs: 10,
        config_reload_interval_secs: 30,
        json_logs: false,
    }
}

#[allow(dead_code)]
pub fn build_test_app(settings: RuntimeSettings, engine: StrategyEngine) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let hub = BroadcastHub::new(256);
    let settings = Arc::new(SettingsHandle::new(settings));
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        Arc::new(engine),
        hub.clone(),
        settings.clone(),
    ));
    orchestrator.start();

    let (ingestor_state, ingestor_rx) = watch::channel(IngestorState::Subscribed);
    // A local recorder; only one global recorder may exist per process.
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

    let state = AppState {
        store: store.clone(),
        config: test_config(),
        hub: hub.clone(),
        settings: settings.clone(),
        orchestrator: orchestrator.clone(),
        ingestor_state: ingestor_rx,
        metrics_handle,
    };

    TestApp {
        router: create_router(state),
        store,
        hub,
        settings,
        orchestrator,
        ingestor_state,
    }
}

#[allow(dead_code)]
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn roll_for(color: Color) -> i16 {
    match color {
        Color::White => 0,
        Color::Red => 4,
        Color::Black => 12,
    }
}

/// `n` alternating rounds starting with red, oldest → newest, 30s apart.
#[allow(dead_code)]
pub fn alternating_outcomes(n: usize) -> Vec<Outcome> {
    (0..n)
        .map(|i| {
            let color = if i % 2 == 0 { Color::Red } else { Color::Black };
            Outcome::from_roll(
                format!("r{i}"),
                roll_for(color),
                base_time() + Duration::seconds(30 * i as i64),
            )
            .unwrap()
        })
        .collect()
}

/// Connect to the test database and run all migrations. Returns `None` when
/// `TEST_DATABASE_URL` is not set so Postgres-backed tests can skip.
#[allow(dead_code)]
pub async fn setup_test_db() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // No cleanup: tests run in parallel and use unique ids instead.
    Some(pool)
}
