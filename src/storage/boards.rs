use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::Board;
use super::with_timeout;

pub async fn get_by_id(pool: &PgPool, board_id: Uuid) -> Result<Option<Board>> {
    with_timeout(async {
        Ok(sqlx::query_as::<_, Board>("SELECT * FROM boards WHERE id = $1")
            .bind(board_id)
            .fetch_optional(pool)
            .await?)
    })
    .await
}

/// All boards referenced by the given agent ids, for the governor snapshot.
pub async fn get_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Board>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    with_timeout(async {
        Ok(
            sqlx::query_as::<_, Board>("SELECT * FROM boards WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(pool)
                .await?,
        )
    })
    .await
}

/// Latest `board_memory` chat timestamp per board, per §4.7 step 2.
pub async fn latest_chat_by_board(
    pool: &PgPool,
) -> Result<std::collections::HashMap<Uuid, chrono::DateTime<chrono::Utc>>> {
    with_timeout(async {
        let rows: Vec<(Uuid, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            "SELECT board_id, MAX(created_at) AS last_chat_at
             FROM board_memory
             WHERE is_chat = true
             GROUP BY board_id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().collect())
    })
    .await
}
