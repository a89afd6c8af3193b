use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::feed::{parse_frame, FeedEvent};

const PING_INTERVAL: Duration = Duration::from_secs(25);
const BASE_RECONNECT_DELAY: Duration = Duration::from_secs(2);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);
const DEGRADED_AFTER_FAILURES: u32 = 3;
const SEEN_ID_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestorState {
    Disconnected,
    Connecting,
    Subscribed,
    Degraded,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub channel: String,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failures before the stream gives up for good.
    pub max_attempts: u32,
    pub degraded_after: u32,
}

impl StreamConfig {
    pub fn new(url: impl Into<String>, channel: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            url: url.into(),
            channel: channel.into(),
            base_delay: BASE_RECONNECT_DELAY,
            max_delay: MAX_RECONNECT_DELAY,
            max_attempts: max_attempts.max(1),
            degraded_after: DEGRADED_AFTER_FAILURES,
        }
    }

    fn subscribe_message(&self) -> String {
        serde_json::json!({ "type": "subscribe", "channel": self.channel }).to_string()
    }

    fn backoff(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(16);
        (self.base_delay * 2u32.saturating_pow(exp)).min(self.max_delay)
    }
}

/// Remembers recently emitted ids so a reconnect replay is not re-emitted.
/// Permanent de-duplication is the store's job.
#[derive(Debug, Default)]
struct SeenIds {
    order: VecDeque<String>,
    set: HashSet<String>,
}

impl SeenIds {
    /// Returns `true` the first time an id is seen.
    fn insert(&mut self, id: &str) -> bool {
        if self.set.contains(id) {
            return false;
        }
        if self.order.len() >= SEEN_ID_CAPACITY {
            if let Some(old) = self.order.pop_front() {
                self.set.remove(&old);
            }
        }
        self.order.push_back(id.to_string());
        self.set.insert(id.to_string());
        true
    }
}

/// Why a connected session ended.
enum SessionEnd {
    Dropped,
    Shutdown,
    ReceiverGone,
}

/// Real-time feed subscriber.
///
/// State machine: `Disconnected → Connecting → Subscribed → (Degraded |
/// Disconnected)`. After `degraded_after` consecutive failures the state is
/// `Degraded` and the polling path carries ingestion; after `max_attempts`
/// the loop stops retrying and the state stays `Degraded`.
pub struct StreamIngestor {
    config: StreamConfig,
    state_tx: watch::Sender<IngestorState>,
    seen: SeenIds,
}

impl StreamIngestor {
    pub fn new(config: StreamConfig) -> Self {
        let (state_tx, _) = watch::channel(IngestorState::Disconnected);
        Self {
            config,
            state_tx,
            seen: SeenIds::default(),
        }
    }

    pub fn state(&self) -> watch::Receiver<IngestorState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: IngestorState) {
        self.state_tx.send_replace(state);
        gauge!("feed_degraded").set(if state == IngestorState::Degraded { 1.0 } else { 0.0 });
    }

    /// Run until shutdown, until `tx` is dropped, or until retries are
    /// exhausted.
    pub async fn run(mut self, tx: mpsc::Sender<FeedEvent>, mut shutdown: watch::Receiver<bool>) {
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.current_state() != IngestorState::Degraded {
                self.set_state(IngestorState::Connecting);
            }
            tracing::info!(url = %self.config.url, channel = %self.config.channel, "Connecting to feed stream...");

            let connected = tokio::select! {
                r = connect_async(self.config.url.as_str()) => r,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok((ws_stream, _response)) => {
                    match self.session(ws_stream, &tx, &mut shutdown).await {
                        Ok(SessionEnd::Shutdown) => break,
                        Ok(SessionEnd::ReceiverGone) => {
                            tracing::warn!("Feed event receiver dropped, stopping stream");
                            break;
                        }
                        Ok(SessionEnd::Dropped) => {
                            // A session that subscribed resets the failure count.
                            failures = 0;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to subscribe to feed channel");
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Feed stream connection failed");
                }
            }

            failures = failures.saturating_add(1);
            counter!("feed_reconnects_total").increment(1);

            let giving_up = failures >= self.config.max_attempts;
            if failures >= self.config.degraded_after || giving_up {
                if self.current_state() != IngestorState::Degraded {
                    tracing::warn!(
                        failures,
                        "Feed stream degraded, polling fallback is now the primary source"
                    );
                }
                self.set_state(IngestorState::Degraded);
            } else {
                self.set_state(IngestorState::Disconnected);
            }

            if giving_up {
                tracing::error!(
                    failures,
                    "Feed stream retries exhausted, relying on polling only"
                );
                return;
            }

            let delay = self.config.backoff(failures);
            tracing::info!(delay_ms = delay.as_millis() as u64, attempt = failures, "Reconnecting...");
            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.set_state(IngestorState::Disconnected);
        tracing::info!("Feed stream stopped");
    }

    fn current_state(&self) -> IngestorState {
        *self.state_tx.borrow()
    }

    async fn session<S>(
        &mut self,
        ws_stream: S,
        tx: &mpsc::Sender<FeedEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, tokio_tungstenite::tungstenite::Error>
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
            + Unpin,
    {
        let (mut write, mut read) = ws_stream.split();

        write
            .send(Message::Text(self.config.subscribe_message().into()))
            .await?;

        self.set_state(IngestorState::Subscribed);
        tracing::info!(channel = %self.config.channel, "Subscribed to feed channel");

        let mut ping_timer = interval(PING_INTERVAL);
        ping_timer.tick().await; // consume the first immediate tick

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let text: &str = text.as_ref();
                            // Engine.IO ping
                            if text == "2" {
                                if let Err(e) = write.send(Message::Text("3".to_string().into())).await {
                                    tracing::warn!(error = %e, "Failed to answer feed ping");
                                    return Ok(SessionEnd::Dropped);
                                }
                                continue;
                            }
                            if !self.forward_frame(text, tx).await {
                                return Ok(SessionEnd::ReceiverGone);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                tracing::warn!(error = %e, "Failed to send pong");
                                return Ok(SessionEnd::Dropped);
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::warn!("Feed server sent close frame");
                            return Ok(SessionEnd::Dropped);
                        }
                        Some(Ok(_)) => {} // Binary, Pong, Frame: ignore
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "Feed stream read error");
                            return Ok(SessionEnd::Dropped);
                        }
                        None => {
                            tracing::warn!("Feed stream ended");
                            return Ok(SessionEnd::Dropped);
                        }
                    }
                }
                _ = ping_timer.tick() => {
                    if let Err(e) = write.send(Message::Ping(vec![].into())).await {
                        tracing::warn!(error = %e, "Failed to send ping");
                        return Ok(SessionEnd::Dropped);
                    }
                }
                _ = shutdown.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
            }
        }
    }

    /// Forward parsed events. Returns `false` once the receiver is gone.
    async fn forward_frame(&mut self, text: &str, tx: &mpsc::Sender<FeedEvent>) -> bool {
        for event in parse_frame(text) {
            match event {
                FeedEvent::Completed(outcome) => {
                    if !self.seen.insert(&outcome.external_id) {
                        tracing::debug!(id = %outcome.external_id, "Duplicate completion from stream, skipping");
                        continue;
                    }
                    tracing::info!(
                        id = %outcome.external_id,
                        roll = ?outcome.roll,
                        color = %outcome.color(),
                        "Round completed (stream)"
                    );
                    if tx.send(FeedEvent::Completed(outcome)).await.is_err() {
                        return false;
                    }
                }
                phase @ FeedEvent::Phase(_) => {
                    // Cosmetic; drop rather than wait if the consumer is busy.
                    if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(phase) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seen_ids_dedupes_and_evicts() {
        let mut seen = SeenIds::default();
        assert!(seen.insert("a"));
        assert!(!seen.insert("a"));

        for i in 0..SEEN_ID_CAPACITY {
            seen.insert(&format!("id{i}"));
        }
        // "a" has been evicted
        assert!(seen.insert("a"));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let cfg = StreamConfig::new("ws://localhost", "double", 10);
        assert_eq!(cfg.backoff(1), Duration::from_secs(2));
        assert_eq!(cfg.backoff(2), Duration::from_secs(4));
        assert_eq!(cfg.backoff(3), Duration::from_secs(8));
        assert_eq!(cfg.backoff(12), MAX_RECONNECT_DELAY);
    }

    #[tokio::test]
    async fn test_gives_up_degraded_before_threshold() {
        // Fewer attempts than the degraded threshold.
        let mut cfg = StreamConfig::new("ws://127.0.0.1:1/stream", "double", 1);
        cfg.base_delay = Duration::from_millis(5);
        cfg.max_delay = Duration::from_millis(5);
        let ingestor = StreamIngestor::new(cfg);
        let state = ingestor.state();

        let (tx, _rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::time::timeout(Duration::from_secs(10), ingestor.run(tx, shutdown_rx))
            .await
            .unwrap();

        assert_eq!(*state.borrow(), IngestorState::Degraded);
    }

    #[test]
    fn test_subscribe_message_names_channel() {
        let cfg = StreamConfig::new("ws://localhost", "double_room_1", 1);
        let v: serde_json::Value = serde_json::from_str(&cfg.subscribe_message()).unwrap();
        assert_eq!(v["type"], "subscribe");
        assert_eq!(v["channel"], "double_room_1");
    }
}
