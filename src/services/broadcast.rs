use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::api::ws_types::{ConnectedAck, WsMessage};

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of pre-serialised events to every live subscriber.
///
/// Each event is serialised once. Sending never waits on a subscriber: a
/// slow one lags and loses messages, a closed one is simply gone. There is
/// no replay, so a subscriber only sees events sent after it subscribed.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<Arc<str>>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns the number of subscribers the event was handed to.
    pub fn broadcast(&self, msg: &WsMessage) -> usize {
        let json: Arc<str> = match serde_json::to_string(msg) {
            Ok(s) => s.into(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize WsMessage");
                return 0;
            }
        };

        // Err only means nobody is listening.
        self.tx.send(json).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// The acknowledgement sent to a client right after it connects.
    pub fn connected_ack(&self) -> Option<String> {
        serde_json::to_string(&WsMessage::Connected(ConnectedAck {
            server_time: Utc::now(),
        }))
        .ok()
    }
}
