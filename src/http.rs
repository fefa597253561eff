//! Ambient `/health` and `/metrics` endpoints (SPEC_FULL.md §10), grounded
//! on the daemon's REST health/metrics handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::AppContext;

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let uptime = ctx.started_at.elapsed().as_secs();
    let db_ok = sqlx::query("SELECT 1").execute(ctx.storage.pool()).await.is_ok();
    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "uptime_secs": uptime,
        "version": env!("CARGO_PKG_VERSION"),
        "database": if db_ok { "ok" } else { "unreachable" },
    }))
}

pub async fn metrics(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    Json(json!({
        "connected_users": ctx.user_pool.len().await,
        "connected_gateways": ctx.gateway_pool.len().await,
        "uptime_secs": ctx.started_at.elapsed().as_secs(),
    }))
}
