use anyhow::Result;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::models::Suggestion;
use super::with_timeout;

/// Insert a Suggestion produced by a fired rule, in the same transaction as
/// the rule's `last_fired_at` stamp — §4.6 step 5.
#[allow(clippy::too_many_arguments)]
pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    organization_id: Uuid,
    board_id: Option<Uuid>,
    agent_id: Option<Uuid>,
    source_event_id: Option<Uuid>,
    suggestion_type: &str,
    title: &str,
    description: Option<&str>,
    confidence: Option<f32>,
    priority: Option<&str>,
) -> Result<Suggestion> {
    let id = Uuid::new_v4();
    let row = sqlx::query_as::<_, Suggestion>(
        "INSERT INTO suggestions
            (id, organization_id, board_id, agent_id, source_event_id, suggestion_type,
             title, description, confidence, priority, status, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', now())
         RETURNING *",
    )
    .bind(id)
    .bind(organization_id)
    .bind(board_id)
    .bind(agent_id)
    .bind(source_event_id)
    .bind(suggestion_type)
    .bind(title)
    .bind(description)
    .bind(confidence)
    .bind(priority)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

pub async fn list_pending_for_org(pool: &PgPool, organization_id: Uuid) -> Result<Vec<Suggestion>> {
    with_timeout(async {
        Ok(sqlx::query_as::<_, Suggestion>(
            "SELECT * FROM suggestions
             WHERE organization_id = $1 AND status = 'pending'
             ORDER BY created_at ASC",
        )
        .bind(organization_id)
        .fetch_all(pool)
        .await?)
    })
    .await
}

/// Accept or dismiss a pending suggestion. Returns false if it was already
/// resolved or does not belong to the org.
pub async fn set_status(
    pool: &PgPool,
    organization_id: Uuid,
    suggestion_id: Uuid,
    status: &str,
) -> Result<bool> {
    with_timeout(async {
        let result = sqlx::query(
            "UPDATE suggestions SET status = $3, resolved_at = now()
             WHERE id = $1 AND organization_id = $2 AND status = 'pending'",
        )
        .bind(suggestion_id)
        .bind(organization_id)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    })
    .await
}
