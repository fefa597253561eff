use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::models::ProactiveRule;
use super::with_timeout;

/// Enabled rules for an org matching a trigger event — §4.6 step 1.
pub async fn list_candidates(
    pool: &PgPool,
    organization_id: Uuid,
    trigger_event: &str,
) -> Result<Vec<ProactiveRule>> {
    with_timeout(async {
        Ok(sqlx::query_as::<_, ProactiveRule>(
            "SELECT * FROM proactive_rules
             WHERE organization_id = $1 AND trigger_event = $2 AND is_enabled = true",
        )
        .bind(organization_id)
        .bind(trigger_event)
        .fetch_all(pool)
        .await?)
    })
    .await
}

/// Stamp `last_fired_at = now` in the same transaction as the Suggestion
/// insert — §4.6 step 5.
pub async fn mark_fired(tx: &mut Transaction<'_, Postgres>, rule_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE proactive_rules SET last_fired_at = $2, updated_at = $2 WHERE id = $1")
        .bind(rule_id)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// ── Admin CRUD surface (§4.6 supplement) ──────────────────────────────────

pub async fn list_for_org(pool: &PgPool, organization_id: Uuid) -> Result<Vec<ProactiveRule>> {
    with_timeout(async {
        Ok(sqlx::query_as::<_, ProactiveRule>(
            "SELECT * FROM proactive_rules WHERE organization_id = $1 ORDER BY created_at ASC",
        )
        .bind(organization_id)
        .fetch_all(pool)
        .await?)
    })
    .await
}

pub async fn get_for_org(
    pool: &PgPool,
    organization_id: Uuid,
    rule_id: Uuid,
) -> Result<Option<ProactiveRule>> {
    with_timeout(async {
        Ok(sqlx::query_as::<_, ProactiveRule>(
            "SELECT * FROM proactive_rules WHERE id = $1 AND organization_id = $2",
        )
        .bind(rule_id)
        .bind(organization_id)
        .fetch_optional(pool)
        .await?)
    })
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &PgPool,
    organization_id: Uuid,
    board_id: Option<Uuid>,
    name: &str,
    description: Option<&str>,
    trigger_event: &str,
    conditions: Value,
    action_type: &str,
    action_config: Value,
    cooldown_seconds: i32,
) -> Result<ProactiveRule> {
    with_timeout(async {
        let id = Uuid::new_v4();
        Ok(sqlx::query_as::<_, ProactiveRule>(
            "INSERT INTO proactive_rules
                (id, organization_id, board_id, name, description, trigger_event, conditions,
                 action_type, action_config, is_enabled, is_builtin, cooldown_seconds)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, true, false, $10)
             RETURNING *",
        )
        .bind(id)
        .bind(organization_id)
        .bind(board_id)
        .bind(name)
        .bind(description)
        .bind(trigger_event)
        .bind(conditions)
        .bind(action_type)
        .bind(action_config)
        .bind(cooldown_seconds)
        .fetch_one(pool)
        .await?)
    })
    .await
}

pub async fn set_enabled(pool: &PgPool, rule_id: Uuid, enabled: bool) -> Result<()> {
    with_timeout(async {
        sqlx::query("UPDATE proactive_rules SET is_enabled = $2, updated_at = now() WHERE id = $1")
            .bind(rule_id)
            .bind(enabled)
            .execute(pool)
            .await?;
        Ok(())
    })
    .await
}

/// Builtin rules cannot be deleted — only disabled via `set_enabled`.
pub async fn delete_non_builtin(pool: &PgPool, organization_id: Uuid, rule_id: Uuid) -> Result<bool> {
    with_timeout(async {
        let result = sqlx::query(
            "DELETE FROM proactive_rules
             WHERE id = $1 AND organization_id = $2 AND is_builtin = false",
        )
        .bind(rule_id)
        .bind(organization_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    })
    .await
}
