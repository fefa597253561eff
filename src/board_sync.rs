//! Board Real-Time Sync (SPEC_FULL.md §4.4): builds the snapshot sent on
//! connect and the incremental frames published to `board_sync:{board_id}`
//! for every subsequent task/suggestion change. Every board-connected
//! socket (operator or otherwise) subscribes to the same channel, so a
//! change made by one viewer fans out to all the others.

use anyhow::Result;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::bus::Bus;
use crate::protocol::{Envelope, MSG_BOARD_STATE, MSG_SUGGESTION_NEW, MSG_TASK_CREATED, MSG_TASK_DELETED, MSG_TASK_UPDATED};
use crate::storage::models::{Suggestion, Task};
use crate::storage::tasks;
use serde_json::Value;

pub fn channel(board_id: Uuid) -> String {
    format!("board_sync:{board_id}")
}

/// Build the full-board snapshot sent immediately after a successful board
/// WS handshake (§4.4 step 1, B-style "snapshot then stream").
pub async fn snapshot(pool: &PgPool, board_id: Uuid) -> Result<Envelope> {
    let board_tasks = tasks::list_by_board(pool, board_id).await?;
    Ok(Envelope::new(MSG_BOARD_STATE).with_payload(json!({
        "board_id": board_id,
        "tasks": board_tasks,
    })))
}

pub fn broadcast_task_created(bus: &Bus, board_id: Uuid, task: &Task) {
    let env = Envelope::new(MSG_TASK_CREATED).with_payload(json!(task));
    bus.publish(&channel(board_id), &env.to_json());
}

/// Broadcast a task mutation's diff, not the whole row — `changes` and
/// `actor` are carried so an operator UI can show who changed what
/// (`task_broadcast.py`'s `updated_by` field).
pub fn broadcast_task_updated(bus: &Bus, board_id: Uuid, task_id: Uuid, changes: &Value, actor: &Value) {
    let env = Envelope::new(MSG_TASK_UPDATED).with_payload(json!({
        "task_id": task_id,
        "changes": changes,
        "updated_by": actor,
    }));
    bus.publish(&channel(board_id), &env.to_json());
}

pub fn broadcast_task_deleted(bus: &Bus, board_id: Uuid, task_id: Uuid) {
    let env = Envelope::new(MSG_TASK_DELETED).with_payload(json!({ "task_id": task_id }));
    bus.publish(&channel(board_id), &env.to_json());
}

/// Fan out a freshly-created Suggestion to every connected board viewer, in
/// addition to the org-wide SSE stream (§4.6 step 6).
pub fn broadcast_suggestion(bus: &Bus, board_id: Uuid, suggestion: &Suggestion) {
    let env = Envelope::new(MSG_SUGGESTION_NEW).with_payload(json!(suggestion));
    bus.publish(&channel(board_id), &env.to_json());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_name_matches_the_wire_format() {
        let board = Uuid::nil();
        assert_eq!(channel(board), format!("board_sync:{board}"));
    }

    #[tokio::test]
    async fn broadcast_reaches_board_subscribers() {
        let bus = Bus::new();
        let board = Uuid::new_v4();
        let mut rx = bus.subscribe(&channel(board));
        broadcast_task_deleted(&bus, board, Uuid::new_v4());
        let raw = rx.recv().await.unwrap();
        assert!(raw.contains(MSG_TASK_DELETED));
    }
}
