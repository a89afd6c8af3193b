pub mod broadcast;
pub mod config_reloader;
pub mod orchestrator;
pub mod signal_manager;

pub use broadcast::BroadcastHub;
pub use config_reloader::{run_config_reloader, SettingsError, SettingsHandle};
pub use orchestrator::{CycleReport, Orchestrator, RunState};
pub use signal_manager::SignalManager;
