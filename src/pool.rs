//! Generic single-instance connection pool, per SPEC_FULL.md §4.1.
//!
//! Used for the user pool (keyed by end-user id), the gateway pool (keyed
//! by gateway id), and the operator board-subscriber bookkeeping (keyed by
//! a synthetic per-connection id). One socket per key; registering a new
//! socket for a key that is already occupied closes the old one first with
//! the `replaced` close code (1012), mirroring the old `GatewayWSManager`'s
//! register-replace behavior.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const CLOSE_REPLACED: u16 = 1012;
pub const CLOSE_NORMAL: u16 = 1000;

type Sink = SplitSink<WebSocket, Message>;

struct Slot {
    sink: Arc<Mutex<Sink>>,
}

pub struct ConnectionPool<Id> {
    slots: Mutex<HashMap<Id, Slot>>,
}

impl<Id> Default for ConnectionPool<Id>
where
    Id: Eq + Hash + Clone + std::fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Id> ConnectionPool<Id>
where
    Id: Eq + Hash + Clone + std::fmt::Display,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically replace any existing connection for `id`; the previous
    /// socket, if any, is closed with `1012 replaced` before the new one is
    /// inserted.
    pub async fn register(&self, id: Id, sink: Sink) {
        let slot = Slot {
            sink: Arc::new(Mutex::new(sink)),
        };
        let old = {
            let mut slots = self.slots.lock().await;
            slots.insert(id.clone(), slot)
        };
        if let Some(old) = old {
            warn!(id = %id, "connection pool: replacing existing connection");
            let mut sink = old.sink.lock().await;
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_REPLACED,
                    reason: "replaced".into(),
                })))
                .await;
        }
        let count = self.slots.lock().await.len();
        info!(id = %id, active = count, "connection pool: registered");
    }

    /// Remove the mapping if present. Idempotent.
    pub async fn unregister(&self, id: &Id) {
        let mut slots = self.slots.lock().await;
        slots.remove(id);
    }

    pub async fn connected(&self, id: &Id) -> bool {
        self.slots.lock().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Serialize `message` to JSON and write it to the socket for `id`.
    /// Returns `true` on success; on any send error the connection is
    /// unregistered and `false` is returned. Never raises to the caller.
    pub async fn send<T: Serialize>(&self, id: &Id, message: &T) -> bool {
        let sink = {
            let slots = self.slots.lock().await;
            match slots.get(id) {
                Some(slot) => slot.sink.clone(),
                None => return false,
            }
        };
        let text = match serde_json::to_string(message) {
            Ok(t) => t,
            Err(e) => {
                warn!(id = %id, error = %e, "connection pool: serialize failed");
                return false;
            }
        };
        let sent = {
            let mut sink = sink.lock().await;
            sink.send(Message::Text(text)).await.is_ok()
        };
        if !sent {
            warn!(id = %id, "connection pool: send failed, unregistering");
            self.unregister(id).await;
        }
        sent
    }

    /// Close every registered socket with `1000 normal shutdown` and empty
    /// the pool. Used during graceful teardown.
    pub async fn close_all(&self) {
        let mut slots = self.slots.lock().await;
        for (_id, slot) in slots.drain() {
            let mut sink = slot.sink.lock().await;
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_NORMAL,
                    reason: "shutdown".into(),
                })))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_pool_reports_not_connected() {
        let pool: ConnectionPool<String> = ConnectionPool::new();
        assert!(!pool.connected(&"u1".to_string()).await);
        assert_eq!(pool.len().await, 0);
    }

    #[tokio::test]
    async fn unregister_missing_id_is_idempotent() {
        let pool: ConnectionPool<String> = ConnectionPool::new();
        pool.unregister(&"missing".to_string()).await;
        pool.unregister(&"missing".to_string()).await;
    }
}
