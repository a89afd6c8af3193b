use std::collections::{BTreeMap, HashMap};
use std::env;
use std::time::Duration;

use serde::Serialize;

/// Verification never runs on signals younger than this.
pub const MIN_SETTLE_DELAY_SECS: u64 = 60;

/// Keys that may be changed at runtime through `runtime_config`.
pub const ALLOWED_KEYS: &[&str] = &[
    "min_confidence",
    "poll_interval_secs",
    "analysis_window",
    "history_limit",
    "dedupe_window_secs",
    "settle_delay_secs",
    "min_recent_sample",
];

/// Tunables read fresh at the start of every pipeline cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeSettings {
    pub min_confidence: f64,
    pub poll_interval_secs: u64,
    pub analysis_window: usize,
    pub history_limit: usize,
    pub dedupe_window_secs: u64,
    pub settle_delay_secs: u64,
    pub min_recent_sample: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            min_confidence: 65.0,
            poll_interval_secs: 3,
            analysis_window: 50,
            history_limit: 10_000,
            dedupe_window_secs: 30,
            settle_delay_secs: MIN_SETTLE_DELAY_SECS,
            min_recent_sample: 20,
        }
    }
}

impl RuntimeSettings {
    /// Defaults overridden by upper-cased env vars of the same names
    /// (e.g. `MIN_CONFIDENCE`).
    pub fn from_env() -> Self {
        let entries: HashMap<String, String> = ALLOWED_KEYS
            .iter()
            .filter_map(|key| {
                env::var(key.to_uppercase())
                    .ok()
                    .map(|value| (key.to_string(), value))
            })
            .collect();

        let mut settings = Self::default();
        settings.apply_overrides(&entries);
        settings
    }

    /// Apply key/value overrides. Unknown keys and unparseable or
    /// out-of-range values are skipped and returned.
    pub fn apply_overrides(&mut self, entries: &HashMap<String, String>) -> Vec<String> {
        let mut rejected = Vec::new();

        for (key, raw) in entries {
            let value = raw.trim();
            let applied = match key.as_str() {
                "min_confidence" => match value.parse::<f64>() {
                    Ok(v) if (0.0..=100.0).contains(&v) => {
                        self.min_confidence = v;
                        true
                    }
                    _ => false,
                },
                "poll_interval_secs" => set_positive(value, &mut self.poll_interval_secs),
                "analysis_window" => set_positive(value, &mut self.analysis_window),
                "history_limit" => set_positive(value, &mut self.history_limit),
                "dedupe_window_secs" => match value.parse::<u64>() {
                    Ok(v) => {
                        self.dedupe_window_secs = v;
                        true
                    }
                    Err(_) => false,
                },
                "settle_delay_secs" => match value.parse::<u64>() {
                    Ok(v) => {
                        self.settle_delay_secs = v.max(MIN_SETTLE_DELAY_SECS);
                        true
                    }
                    Err(_) => false,
                },
                "min_recent_sample" => set_positive(value, &mut self.min_recent_sample),
                _ => false,
            };

            if !applied {
                tracing::warn!(key = %key, value = %raw, "Ignoring invalid runtime setting");
                rejected.push(key.clone());
            }
        }

        if self.history_limit < self.analysis_window {
            self.history_limit = self.analysis_window;
        }

        rejected
    }

    pub fn to_entries(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("min_confidence".into(), self.min_confidence.to_string());
        m.insert("poll_interval_secs".into(), self.poll_interval_secs.to_string());
        m.insert("analysis_window".into(), self.analysis_window.to_string());
        m.insert("history_limit".into(), self.history_limit.to_string());
        m.insert("dedupe_window_secs".into(), self.dedupe_window_secs.to_string());
        m.insert("settle_delay_secs".into(), self.settle_delay_secs.to_string());
        m.insert("min_recent_sample".into(), self.min_recent_sample.to_string());
        m
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn dedupe_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedupe_window_secs as i64)
    }

    pub fn settle_delay(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.settle_delay_secs.max(MIN_SETTLE_DELAY_SECS) as i64)
    }
}

fn set_positive<T>(value: &str, slot: &mut T) -> bool
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.parse::<T>() {
        Ok(v) if v > T::default() => {
            *slot = v;
            true
        }
        _ => false,
    }
}
