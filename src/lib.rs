pub mod board_sync;
pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway_registry;
pub mod governor;
pub mod http;
pub mod pool;
pub mod protocol;
pub mod router;
pub mod rules;
pub mod storage;
pub mod suggestions;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use uuid::Uuid;

use bus::Bus;
use config::Config;
use governor::HeartbeatGovernor;
use pool::ConnectionPool;
use rules::RuleEngine;
use storage::Storage;

/// Constant-time byte comparison for gateway relay tokens and operator
/// board-sync shared secrets, grounded on the prior JSON-RPC server's
/// XOR-accumulate compare.
pub fn tokens_equal(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Shared application state passed to every WS/HTTP handler and background
/// task (the Heartbeat Governor, the rule engine dispatcher).
pub struct AppContext {
    pub config: Arc<Config>,
    pub storage: Arc<Storage>,
    pub bus: Arc<Bus>,
    pub user_pool: Arc<ConnectionPool<Uuid>>,
    pub gateway_pool: Arc<ConnectionPool<Uuid>>,
    pub rule_engine: Arc<RuleEngine>,
    pub governor: Arc<HeartbeatGovernor>,
    pub started_at: std::time::Instant,
}

impl AppContext {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let config = Arc::new(config);
        let storage = Arc::new(Storage::connect(&config.database_url).await?);
        let bus = Arc::new(Bus::new());
        let user_pool = Arc::new(ConnectionPool::new());
        let gateway_pool = Arc::new(ConnectionPool::new());
        let rule_engine = RuleEngine::new(storage.pool().clone(), Arc::clone(&bus));
        let governor = HeartbeatGovernor::new(
            storage.pool().clone(),
            governor::GovernorConfig { interval_secs: config.governor_interval_seconds },
        );

        Ok(Arc::new(Self {
            config,
            storage,
            bus,
            user_pool,
            gateway_pool,
            rule_engine,
            governor,
            started_at: std::time::Instant::now(),
        }))
    }
}

/// Build the single HTTP + WS + SSE router every endpoint in SPEC_FULL.md
/// §6 hangs off of. Shared between `main.rs` and the integration tests so
/// the two never drift apart.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(http::health))
        .route("/metrics", get(http::metrics))
        .route("/gateways/register", post(gateway_registry::register_gateway))
        .route("/gateways/heartbeat", post(gateway_registry::gateway_heartbeat))
        .route(
            "/organizations/{org_id}/proactive-rules",
            get(rules::admin::list_rules).post(rules::admin::create_rule),
        )
        .route(
            "/organizations/{org_id}/proactive-rules/{rule_id}",
            axum::routing::delete(rules::admin::delete_rule),
        )
        .route(
            "/organizations/{org_id}/proactive-rules/{rule_id}/toggle",
            post(rules::admin::toggle_rule),
        )
        .route(
            "/organizations/{org_id}/suggestions/stream",
            get(suggestions::stream_suggestions),
        )
        .merge(ws::router())
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_equal_requires_matching_length_and_bytes() {
        assert!(tokens_equal("abc", "abc"));
        assert!(!tokens_equal("abc", "abd"));
        assert!(!tokens_equal("abc", "ab"));
    }
}
