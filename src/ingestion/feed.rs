use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Color, Outcome};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RECENT_PATH: &str = "/roulette_games/recent";

/// Statuses that mark a round still in progress.
const PHASE_STATUSES: &[&str] = &["waiting", "rolling", "spinning", "starting", "graphing"];

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Cosmetic round-timing event. Never gates any pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseEvent {
    pub game_id: Option<String>,
    pub status: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Phase(PhaseEvent),
    Completed(Outcome),
}

// ---------------------------------------------------------------------------
// Frame / payload normalisation
// ---------------------------------------------------------------------------

/// Parse one text frame from the stream. Accepts plain JSON objects,
/// JSON arrays of objects, and Socket.IO event frames (`42["event", {...}]`).
/// Anything unrecognised yields no events.
pub fn parse_frame(text: &str) -> Vec<FeedEvent> {
    let body = strip_socketio_prefix(text);
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        tracing::trace!(raw = %text, "Non-JSON frame received");
        return Vec::new();
    };

    match value {
        // Socket.IO event: ["name", payload, ...]
        Value::Array(items) if matches!(items.first(), Some(Value::String(_))) => {
            items.iter().skip(1).filter_map(normalize).collect()
        }
        Value::Array(items) => items.iter().filter_map(normalize).collect(),
        other => normalize(&other).into_iter().collect(),
    }
}

fn strip_socketio_prefix(text: &str) -> &str {
    let trimmed = text.trim_start();
    let digits = trimmed.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 && trimmed[digits..].starts_with('[') {
        &trimmed[digits..]
    } else {
        trimmed
    }
}

/// Normalise a single game payload. Tolerates the flat shape as well as
/// `{"payload": {...}}` and `{"data": {...}}` wrappers. Completion
/// payloads missing an id, or missing both roll and colour, are dropped.
pub fn normalize(value: &Value) -> Option<FeedEvent> {
    let game = unwrap_payload(value)?;

    let id = game.get("id").and_then(value_to_string);
    let status = game
        .get("status")
        .and_then(Value::as_str)
        .map(|s| s.to_lowercase());
    let occurred_at = ["created_at", "occurred_at", "timestamp", "updated_at"]
        .iter()
        .find_map(|k| parse_timestamp(game.get(*k)))
        .unwrap_or_else(Utc::now);

    if let Some(status) = status.as_deref() {
        if PHASE_STATUSES.contains(&status) {
            return Some(FeedEvent::Phase(PhaseEvent {
                game_id: id,
                status: status.to_string(),
                at: occurred_at,
            }));
        }
    }

    let id = id?;
    let roll = game.get("roll").and_then(value_to_i64);
    let reported = game.get("color").and_then(value_to_color);

    let outcome = match roll.and_then(|r| i16::try_from(r).ok()) {
        Some(r) if Color::from_roll(r).is_some() => {
            let outcome = Outcome::from_roll(id, r, occurred_at)?;
            if let Some(c) = reported {
                if c != outcome.color() {
                    tracing::debug!(
                        id = %outcome.external_id,
                        roll = r,
                        reported = %c,
                        "Reported colour disagrees with roll; using roll"
                    );
                }
            }
            outcome
        }
        _ => Outcome {
            external_id: id,
            roll: None,
            cached_color: reported?,
            occurred_at,
        },
    };

    Some(FeedEvent::Completed(outcome))
}

fn unwrap_payload(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    let obj = value.as_object()?;
    for key in ["payload", "data"] {
        if let Some(inner) = obj.get(key).and_then(Value::as_object) {
            return Some(inner);
        }
    }
    Some(obj)
}

fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_color(v: &Value) -> Option<Color> {
    match v {
        Value::Number(n) => Color::from_api_str(&n.to_string()),
        Value::String(s) => Color::from_api_str(s),
        _ => None,
    }
}

/// Epoch seconds, epoch milliseconds (>1e12), numeric strings or RFC 3339.
fn parse_timestamp(ts: Option<&Value>) -> Option<DateTime<Utc>> {
    ts.and_then(|t| match t {
        Value::Number(n) => from_epoch(n.as_i64()?),
        Value::String(s) => {
            if let Ok(secs) = s.parse::<i64>() {
                return from_epoch(secs);
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    })
}

fn from_epoch(v: i64) -> Option<DateTime<Utc>> {
    if v > 1_000_000_000_000 {
        DateTime::from_timestamp(v / 1000, ((v % 1000) * 1_000_000) as u32)
    } else {
        DateTime::from_timestamp(v, 0)
    }
}

// ---------------------------------------------------------------------------
// REST snapshot client
// ---------------------------------------------------------------------------

/// Client for the feed's REST snapshot endpoint, used by the polling fallback.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: Client,
    base_url: String,
}

impl FeedClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FeedError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the latest completed rounds. Network and decode failures are
    /// logged and produce an empty list.
    pub async fn fetch_recent(&self) -> Vec<Outcome> {
        match self.try_fetch_recent().await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::warn!(error = %e, "Feed poll failed");
                Vec::new()
            }
        }
    }

    async fn try_fetch_recent(&self) -> Result<Vec<Outcome>, FeedError> {
        let url = format!("{}{}", self.base_url, RECENT_PATH);
        let body: Value = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let items = match &body {
            Value::Array(items) => items.as_slice(),
            Value::Object(obj) => match obj.get("data").or_else(|| obj.get("records")) {
                Some(Value::Array(items)) => items.as_slice(),
                _ => return Err(FeedError::Unexpected("expected an array of games".into())),
            },
            _ => return Err(FeedError::Unexpected("expected an array of games".into())),
        };

        Ok(items
            .iter()
            .filter_map(|item| match normalize(item) {
                Some(FeedEvent::Completed(o)) => Some(o),
                _ => None,
            })
            .collect())
    }
}
