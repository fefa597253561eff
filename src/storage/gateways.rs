use anyhow::Result;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::Gateway;
use super::with_timeout;

pub async fn get_by_id(pool: &PgPool, gateway_id: Uuid) -> Result<Option<Gateway>> {
    with_timeout(async {
        Ok(
            sqlx::query_as::<_, Gateway>("SELECT * FROM gateways WHERE id = $1")
                .bind(gateway_id)
                .fetch_optional(pool)
                .await?,
        )
    })
    .await
}

pub async fn get_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Gateway>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    with_timeout(async {
        Ok(
            sqlx::query_as::<_, Gateway>("SELECT * FROM gateways WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(pool)
                .await?,
        )
    })
    .await
}

/// Mark a gateway online after a successful relay-token handshake (§4.2).
pub async fn mark_online(pool: &PgPool, gateway_id: Uuid) -> Result<()> {
    with_timeout(async {
        sqlx::query(
            "UPDATE gateways SET status = 'online', last_heartbeat_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(gateway_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

/// Mark a gateway offline exactly once on disconnect cleanup (B2): a no-op
/// if the row is already offline, mirroring the enhanced handler's
/// `if gw.status == "online"` guard.
pub async fn mark_offline_if_online(pool: &PgPool, gateway_id: Uuid) -> Result<()> {
    with_timeout(async {
        sqlx::query(
            "UPDATE gateways SET status = 'offline', updated_at = $2
             WHERE id = $1 AND status = 'online'",
        )
        .bind(gateway_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

/// Hash a presented (raw) relay token and compare it, in constant time,
/// against the gateway's stored `token_hash`.
pub async fn validate_relay_token(
    pool: &PgPool,
    gateway_id: Uuid,
    presented_token: &str,
) -> Result<bool> {
    let gateway = get_by_id(pool, gateway_id).await?;
    let presented_hash = hex::encode(Sha256::digest(presented_token.as_bytes()));
    Ok(matches!(gateway, Some(g) if crate::tokens_equal(&g.token_hash, &presented_hash)))
}
