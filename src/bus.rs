//! In-process pub/sub bus: a registry of named broadcast channels.
//!
//! Generalizes the daemon's old single-channel `EventBroadcaster` to the
//! multiple named channels this system needs (`mc:events:{org}`,
//! `ws:route:user:{id}`, `board_sync:{board}`, ...). Channels are created
//! lazily on first publish or subscribe and never removed — churn is bounded
//! by the number of live orgs/boards/users, not by connection count.
//!
//! This is a single-instance implementation of the cross-instance contract
//! in SPEC_FULL.md §4.5: delivery across process boundaries (scenario S6)
//! requires a networked backend behind the same `publish`/`subscribe`
//! shape. No such backend is wired up here — none of the reference repos
//! this project is grounded on pull in a networked pub/sub crate, so one
//! isn't fabricated; a real multi-instance deployment swaps the `Bus`
//! for one that forwards over a shared transport.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 1024;

pub struct Bus {
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<String> {
        let mut channels = self.channels.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(tx) = channels.get(channel) {
            return tx.clone();
        }
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        channels.insert(channel.to_string(), tx.clone());
        tx
    }

    /// Publish a pre-serialized JSON payload to `channel`. Never fails the
    /// caller — a channel with no subscribers simply drops the message.
    pub fn publish(&self, channel: &str, payload: &str) {
        let tx = self.sender_for(channel);
        if tx.send(payload.to_string()).is_err() {
            debug!(channel, "bus publish: no subscribers");
        }
    }

    pub fn publish_json(&self, channel: &str, value: &serde_json::Value) {
        match serde_json::to_string(value) {
            Ok(s) => self.publish(channel, &s),
            Err(e) => tracing::warn!(channel, error = %e, "bus publish: serialize failed"),
        }
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.sender_for(channel).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = Bus::new();
        let mut rx = bus.subscribe("mc:events:org1");
        bus.publish("mc:events:org1", "hello");
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = Bus::new();
        bus.publish("ws:route:user:u1", "unheard");
    }

    #[tokio::test]
    async fn distinct_channels_are_isolated() {
        let bus = Bus::new();
        let mut a = bus.subscribe("board_sync:b1");
        let mut b = bus.subscribe("board_sync:b2");
        bus.publish("board_sync:b1", "for-b1");
        assert_eq!(a.recv().await.unwrap(), "for-b1");
        assert!(b.try_recv().is_err());
    }
}
