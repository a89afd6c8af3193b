use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::runtime::ALLOWED_KEYS;
use crate::config::RuntimeSettings;
use crate::db::{ConfigStore, Store, StoreError};

/// Owns the effective runtime settings and hands out snapshots.
///
/// Effective settings are always `base` (defaults plus env) with the
/// persisted `runtime_config` rows applied on top.
pub struct SettingsHandle {
    base: RuntimeSettings,
    tx: watch::Sender<RuntimeSettings>,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("unknown or invalid keys: {0:?}")]
    Rejected(Vec<String>),

    #[error("no config keys provided")]
    Empty,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SettingsHandle {
    pub fn new(base: RuntimeSettings) -> Self {
        let (tx, _) = watch::channel(base.clone());
        Self { base, tx }
    }

    pub fn current(&self) -> RuntimeSettings {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RuntimeSettings> {
        self.tx.subscribe()
    }

    /// Re-read persisted overrides. Returns `true` when the effective
    /// settings changed.
    pub async fn reload_from<S>(&self, store: &S) -> Result<bool, StoreError>
    where
        S: ConfigStore + ?Sized,
    {
        let entries = store.load_runtime_config().await?;

        let mut next = self.base.clone();
        let rejected = next.apply_overrides(&entries);
        if !rejected.is_empty() {
            tracing::warn!(keys = ?rejected, "Persisted runtime config has invalid entries");
        }

        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if changed {
            tracing::info!(settings = ?self.current(), "Runtime settings updated");
        }
        Ok(changed)
    }

    /// Validate, persist and apply a batch of overrides. Nothing is written
    /// unless every key is allowed and every value parses.
    pub async fn update<S>(
        &self,
        store: &S,
        entries: HashMap<String, String>,
    ) -> Result<RuntimeSettings, SettingsError>
    where
        S: ConfigStore + ?Sized,
    {
        if entries.is_empty() {
            return Err(SettingsError::Empty);
        }

        let mut unknown: Vec<String> = entries
            .keys()
            .filter(|k| !ALLOWED_KEYS.contains(&k.as_str()))
            .cloned()
            .collect();

        let mut probe = self.current();
        unknown.extend(probe.apply_overrides(&entries));
        if !unknown.is_empty() {
            unknown.sort();
            unknown.dedup();
            return Err(SettingsError::Rejected(unknown));
        }

        store.save_runtime_config(&entries).await?;
        self.reload_from(store).await?;
        Ok(self.current())
    }
}

/// Periodically re-read `runtime_config` so edits made directly in the
/// database take effect without a restart.
pub async fn run_config_reloader(
    settings: Arc<SettingsHandle>,
    store: Arc<dyn Store>,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        if let Err(e) = settings.reload_from(store.as_ref()).await {
            tracing::error!(error = %e, "Config reloader: failed to read runtime_config");
        }
    }

    tracing::info!("Config reloader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn entries(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_update_persists_and_applies() {
        let store = MemoryStore::new();
        let handle = SettingsHandle::new(RuntimeSettings::default());
        let mut rx = handle.subscribe();

        let applied = handle
            .update(&store, entries(&[("min_confidence", "72.5")]))
            .await
            .unwrap();
        assert_eq!(applied.min_confidence, 72.5);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().min_confidence, 72.5);

        let persisted = store.load_runtime_config().await.unwrap();
        assert_eq!(persisted.get("min_confidence").map(String::as_str), Some("72.5"));
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_and_invalid_without_writing() {
        let store = MemoryStore::new();
        let handle = SettingsHandle::new(RuntimeSettings::default());

        let err = handle
            .update(
                &store,
                entries(&[("min_confidence", "70"), ("bankroll", "5"), ("analysis_window", "abc")]),
            )
            .await
            .unwrap_err();
        match err {
            SettingsError::Rejected(keys) => {
                assert_eq!(keys, vec!["analysis_window".to_string(), "bankroll".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(store.load_runtime_config().await.unwrap().is_empty());
        assert_eq!(handle.current(), RuntimeSettings::default());
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_edits() {
        let store = MemoryStore::new();
        let handle = SettingsHandle::new(RuntimeSettings::default());

        assert!(!handle.reload_from(&store).await.unwrap());

        store
            .save_runtime_config(&entries(&[("settle_delay_secs", "5"), ("poll_interval_secs", "7")]))
            .await
            .unwrap();
        assert!(handle.reload_from(&store).await.unwrap());

        let s = handle.current();
        assert_eq!(s.poll_interval_secs, 7);
        // Clamped to the minimum.
        assert_eq!(s.settle_delay_secs, 60);
    }
}
