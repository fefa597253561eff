use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{session_key, ChatSession};
use super::with_timeout;

/// Find the active ChatSession for (user, agent), or create one resolving
/// `gateway_id` from the agent's immutable field — §4.3 step 2.
pub async fn find_or_create_active(
    pool: &PgPool,
    organization_id: Uuid,
    user_id: Uuid,
    agent_id: Uuid,
    gateway_id: Uuid,
) -> Result<ChatSession> {
    with_timeout(async {
        let key = session_key(user_id, agent_id);
        if let Some(existing) = sqlx::query_as::<_, ChatSession>(
            "SELECT * FROM chat_sessions WHERE session_key = $1 AND status = 'active'",
        )
        .bind(&key)
        .fetch_optional(pool)
        .await?
        {
            return Ok(existing);
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        // ON CONFLICT guards the race between the existence check above and
        // this insert under the session_key unique index (DESIGN.md Open
        // Question decision #2).
        let row = sqlx::query_as::<_, ChatSession>(
            "INSERT INTO chat_sessions
                (id, organization_id, user_id, agent_id, gateway_id, session_key, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'active', $7, $7)
             ON CONFLICT (session_key) DO UPDATE SET session_key = EXCLUDED.session_key
             RETURNING *",
        )
        .bind(id)
        .bind(organization_id)
        .bind(user_id)
        .bind(agent_id)
        .bind(gateway_id)
        .bind(&key)
        .bind(now)
        .fetch_one(pool)
        .await?;
        Ok(row)
    })
    .await
}

pub async fn find_active_by_session_key(
    pool: &PgPool,
    session_key: &str,
) -> Result<Option<ChatSession>> {
    with_timeout(async {
        Ok(sqlx::query_as::<_, ChatSession>(
            "SELECT * FROM chat_sessions WHERE session_key = $1 AND status = 'active'",
        )
        .bind(session_key)
        .fetch_optional(pool)
        .await?)
    })
    .await
}

pub async fn touch_last_message(pool: &PgPool, session_id: Uuid) -> Result<()> {
    with_timeout(async {
        let now = Utc::now();
        sqlx::query(
            "UPDATE chat_sessions SET last_message_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(session_id)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}
