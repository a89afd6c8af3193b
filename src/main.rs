use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use rollsignal::api::router::create_router;
use rollsignal::config::{AppConfig, RuntimeSettings};
use rollsignal::db::{self, PgStore, Store};
use rollsignal::ingestion::{
    run_poller, FeedClient, FeedEvent, IngestorState, StreamConfig, StreamIngestor,
};
use rollsignal::intelligence::StrategyEngine;
use rollsignal::services::{run_config_reloader, BroadcastHub, Orchestrator, SettingsHandle};
use rollsignal::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.json_logs);

    // tokio-tungstenite and reqwest both pull rustls; pick one provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let metrics_handle = rollsignal::metrics::init_metrics()?;
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Connecting to database...");
    let pool = match db::init_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Database unavailable, cannot start");
            return Err(e);
        }
    };
    tracing::info!("Database connected");
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

    // --- Runtime settings: env defaults + persisted overrides ---
    let settings = Arc::new(SettingsHandle::new(RuntimeSettings::from_env()));
    if let Err(e) = settings.reload_from(store.as_ref()).await {
        tracing::warn!(error = %e, "Failed to load runtime_config, using defaults");
    }
    tracing::info!(settings = ?settings.current(), "Runtime settings loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // --- Core pipeline ---
    let hub = BroadcastHub::default();
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        Arc::new(StrategyEngine::default()),
        hub.clone(),
        settings.clone(),
    ));
    orchestrator.start();

    let (feed_tx, feed_rx) = mpsc::channel::<FeedEvent>(1000);

    let ingestor_state = if config.stream_enabled {
        let ingestor = StreamIngestor::new(StreamConfig::new(
            config.feed_stream_url.clone(),
            config.feed_channel.clone(),
            config.stream_max_reconnect_attempts,
        ));
        let state = ingestor.state();
        tokio::spawn(ingestor.run(feed_tx, shutdown_rx.clone()));
        tracing::info!(url = %config.feed_stream_url, channel = %config.feed_channel, "Stream ingestor spawned");
        state
    } else {
        tracing::warn!("STREAM_ENABLED=false, polling is the only ingestion path");
        drop(feed_tx);
        watch::channel(IngestorState::Degraded).1
    };

    let feed_client = FeedClient::new(config.feed_base_url.clone())?;
    tokio::spawn(run_poller(orchestrator.clone(), feed_client, shutdown_rx.clone()));

    tokio::spawn(orchestrator.clone().run(
        feed_rx,
        Duration::from_secs(config.backstop_interval_secs.max(1)),
        shutdown_rx.clone(),
    ));

    tokio::spawn(run_config_reloader(
        settings.clone(),
        store.clone(),
        config.config_reload_interval_secs,
        shutdown_rx.clone(),
    ));

    // --- HTTP / live clients ---
    let state = AppState {
        store,
        config,
        hub,
        settings,
        orchestrator,
        ingestor_state,
        metrics_handle,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on ctrl-c after telling every background loop to stop.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(true);
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
