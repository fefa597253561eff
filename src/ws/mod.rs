//! The three relay WebSocket endpoints and their shared handshake helpers
//! (SPEC_FULL.md §4.1, §4.2, §4.4, §6).

pub mod board;
pub mod gateway;
pub mod handshake;
pub mod user;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::AppContext;

pub fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/ws/user/chat", get(user::user_chat_ws))
        .route("/ws/gateway/{gateway_id}/relay", get(gateway::gateway_relay_ws))
        .route("/ws/board/{board_id}/sync", get(board::board_sync_ws))
}
