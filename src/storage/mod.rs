pub mod agents;
pub mod boards;
pub mod chat_sessions;
pub mod end_users;
pub mod gateways;
pub mod models;
pub mod proactive_rules;
pub mod suggestions;
pub mod system_events;
pub mod tasks;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::future::Future;

/// Default timeout for individual queries. Prevents a wedged connection
/// from blocking a WS read loop or governor tick indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Execute a future with the standard query timeout.
pub async fn with_timeout<T>(fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: PgPool,
}

impl Storage {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;
        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        // Embedded at compile time, same `include_str!`-per-file convention
        // as the daemon's existing SQLite migration list; each file is one
        // forward-only, idempotent (`IF NOT EXISTS`) migration.
        const MIGRATIONS: &[&str] = &[include_str!("migrations/0001_core.sql")];

        for sql in MIGRATIONS {
            for stmt in sql.split(';') {
                let stmt = stmt.trim();
                if stmt.is_empty() {
                    continue;
                }
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }
        Ok(())
    }
}
