use anyhow::Result;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::models::SystemEvent;
use super::with_timeout;

/// Insert an immutable SystemEvent row within the caller's transaction —
/// §4.5 step 1. The caller publishes to the pub/sub bus only after this
/// transaction commits.
pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    organization_id: Uuid,
    board_id: Option<Uuid>,
    agent_id: Option<Uuid>,
    task_id: Option<Uuid>,
    event_type: &str,
    payload: Value,
) -> Result<SystemEvent> {
    let id = Uuid::new_v4();
    let row = sqlx::query_as::<_, SystemEvent>(
        "INSERT INTO system_events
            (id, organization_id, board_id, agent_id, task_id, event_type, payload, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, now())
         RETURNING *",
    )
    .bind(id)
    .bind(organization_id)
    .bind(board_id)
    .bind(agent_id)
    .bind(task_id)
    .bind(event_type)
    .bind(&payload)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

pub async fn begin(pool: &PgPool) -> Result<Transaction<'_, Postgres>> {
    with_timeout(async { Ok(pool.begin().await?) }).await
}
