use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::models::Agent;
use super::with_timeout;

pub async fn get_by_id(pool: &PgPool, agent_id: Uuid) -> Result<Option<Agent>> {
    with_timeout(async {
        Ok(
            sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = $1")
                .bind(agent_id)
                .fetch_optional(pool)
                .await?,
        )
    })
    .await
}

/// Every agent with the governor enabled — the snapshot read in §4.7 step 2.
pub async fn list_auto_heartbeat_enabled(pool: &PgPool) -> Result<Vec<Agent>> {
    with_timeout(async {
        Ok(sqlx::query_as::<_, Agent>(
            "SELECT * FROM agents WHERE auto_heartbeat_enabled = true",
        )
        .fetch_all(pool)
        .await?)
    })
    .await
}

/// Agent ids with at least one `in_progress`/`review` task assigned —
/// the `has_work` signal in §4.7 step 2.
pub async fn has_work_by_agent(pool: &PgPool) -> Result<HashMap<Uuid, bool>> {
    with_timeout(async {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT assigned_agent_id, COUNT(*) FROM tasks
             WHERE assigned_agent_id IS NOT NULL AND status IN ('in_progress', 'review')
             GROUP BY assigned_agent_id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id, count)| (id, count > 0)).collect())
    })
    .await
}

pub struct GovernorUpdate {
    pub agent_id: Uuid,
    pub step: i32,
    pub off: bool,
    pub heartbeat_config: Option<Value>,
    pub last_active_at: Option<DateTime<Utc>>,
}

/// Persist the governor's per-agent decisions in one transaction (§4.7 step 6).
pub async fn apply_governor_updates(pool: &PgPool, updates: &[GovernorUpdate]) -> Result<()> {
    if updates.is_empty() {
        return Ok(());
    }
    with_timeout(async {
        let mut tx = pool.begin().await?;
        let now = Utc::now();
        for u in updates {
            sqlx::query(
                "UPDATE agents SET
                    auto_heartbeat_step = $2,
                    auto_heartbeat_off = $3,
                    heartbeat_config = COALESCE($4, heartbeat_config),
                    auto_heartbeat_last_active_at = COALESCE($5, auto_heartbeat_last_active_at),
                    updated_at = $6
                 WHERE id = $1",
            )
            .bind(u.agent_id)
            .bind(u.step)
            .bind(u.off)
            .bind(&u.heartbeat_config)
            .bind(u.last_active_at)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    })
    .await
}
