//! The Event Publisher (SPEC_FULL.md §4.5): every SystemEvent is written
//! inside the caller's transaction, then — only after that transaction
//! commits — published to the org-wide and (if board-scoped) board-scoped
//! channels. Publishing after commit means a subscriber can never observe
//! an event that a concurrent reader of the row would not also see.

use anyhow::Result;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::bus::Bus;
use crate::storage::models::SystemEvent;
use crate::storage::system_events;

pub fn org_channel(organization_id: Uuid) -> String {
    format!("mc:events:{organization_id}")
}

pub fn board_channel(organization_id: Uuid, board_id: Uuid) -> String {
    format!("mc:events:{organization_id}:{board_id}")
}

/// Insert a SystemEvent row within `tx` without publishing yet. Call
/// [`publish_committed`] with the same values once `tx` has committed.
pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    organization_id: Uuid,
    board_id: Option<Uuid>,
    agent_id: Option<Uuid>,
    task_id: Option<Uuid>,
    event_type: &str,
    payload: Value,
) -> Result<SystemEvent> {
    system_events::insert(tx, organization_id, board_id, agent_id, task_id, event_type, payload).await
}

/// Publish an already-committed SystemEvent to the org channel, and the
/// board channel too when the event is board-scoped.
pub fn publish_committed(bus: &Bus, event: &SystemEvent) {
    let value = serde_json::to_value(event).unwrap_or(Value::Null);
    bus.publish_json(&org_channel(event.organization_id), &value);
    if let Some(board_id) = event.board_id {
        bus.publish_json(&board_channel(event.organization_id, board_id), &value);
    }
}

/// Convenience wrapper: open a transaction, insert the event, commit, then
/// publish. Use when the event is not part of a larger unit of work.
pub async fn emit(
    pool: &PgPool,
    bus: &Bus,
    organization_id: Uuid,
    board_id: Option<Uuid>,
    agent_id: Option<Uuid>,
    task_id: Option<Uuid>,
    event_type: &str,
    payload: Value,
) -> Result<SystemEvent> {
    let mut tx = system_events::begin(pool).await?;
    let event = insert(&mut tx, organization_id, board_id, agent_id, task_id, event_type, payload).await?;
    tx.commit().await?;
    publish_committed(bus, &event);
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_match_the_wire_format() {
        let org = Uuid::nil();
        let board = Uuid::nil();
        assert_eq!(org_channel(org), format!("mc:events:{org}"));
        assert_eq!(board_channel(org, board), format!("mc:events:{org}:{board}"));
    }
}
