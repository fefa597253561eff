use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::EndUserAssignment;
use super::with_timeout;

/// Look up the active (user, agent) assignment — §4.3 step 1 (Authorize).
pub async fn find_active_assignment(
    pool: &PgPool,
    end_user_id: Uuid,
    agent_id: Uuid,
) -> Result<Option<EndUserAssignment>> {
    with_timeout(async {
        Ok(sqlx::query_as::<_, EndUserAssignment>(
            "SELECT * FROM end_user_assignments
             WHERE end_user_id = $1 AND agent_id = $2 AND status = 'active'",
        )
        .bind(end_user_id)
        .bind(agent_id)
        .fetch_optional(pool)
        .await?)
    })
    .await
}
