pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod ingestion;
pub mod intelligence;
pub mod services;

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::AppConfig;
use crate::db::Store;
use crate::ingestion::IngestorState;
use crate::services::{BroadcastHub, Orchestrator, SettingsHandle};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: AppConfig,
    pub hub: BroadcastHub,
    pub settings: Arc<SettingsHandle>,
    pub orchestrator: Arc<Orchestrator>,
    pub ingestor_state: watch::Receiver<IngestorState>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
