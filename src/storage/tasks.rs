use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::Task;
use super::with_timeout;

/// Tasks for a board, newest first — used to build the Board Sync snapshot
/// (§4.4 step 1) and as the seed for `has_work_by_agent`.
pub async fn list_by_board(pool: &PgPool, board_id: Uuid) -> Result<Vec<Task>> {
    with_timeout(async {
        Ok(
            sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE board_id = $1 ORDER BY created_at DESC")
                .bind(board_id)
                .fetch_all(pool)
                .await?,
        )
    })
    .await
}

pub async fn get_by_id(pool: &PgPool, task_id: Uuid) -> Result<Option<Task>> {
    with_timeout(async {
        Ok(
            sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
                .bind(task_id)
                .fetch_optional(pool)
                .await?,
        )
    })
    .await
}

pub async fn create(
    pool: &PgPool,
    board_id: Uuid,
    title: &str,
    status: &str,
    priority: Option<&str>,
    assigned_agent_id: Option<Uuid>,
) -> Result<Task> {
    with_timeout(async {
        let id = Uuid::new_v4();
        Ok(sqlx::query_as::<_, Task>(
            "INSERT INTO tasks
                (id, board_id, title, status, priority, assigned_agent_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, now(), now())
             RETURNING *",
        )
        .bind(id)
        .bind(board_id)
        .bind(title)
        .bind(status)
        .bind(priority)
        .bind(assigned_agent_id)
        .fetch_one(pool)
        .await?)
    })
    .await
}

/// Move a task to a new status/position — the `task.move` message handler
/// (§4.4, ws_board.py `task.move`).
pub async fn update_status(pool: &PgPool, task_id: Uuid, status: &str) -> Result<Option<Task>> {
    with_timeout(async {
        Ok(sqlx::query_as::<_, Task>(
            "UPDATE tasks SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(task_id)
        .bind(status)
        .fetch_optional(pool)
        .await?)
    })
    .await
}
