//! Gateway relay WebSocket endpoint — `/ws/gateway/{gateway_id}/relay` (§4.2,
//! the "enhanced" handler per DESIGN.md Open Question decision #1). Auth is
//! an opaque relay token compared against the gateway's stored hash; on
//! success the gateway is marked online and registered in the gateway pool.
//!
//! Auth handshake: the server awaits exactly one message; it must be
//! `{"type": "auth", "payload": {"relay_token": "<opaque token>"}}` or the
//! connection is closed with `4001` before anything is registered.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::protocol::{Envelope, CLOSE_UNAUTHENTICATED, MSG_AUTH, MSG_CHAT_REPLY, MSG_HEARTBEAT};
use crate::router;
use crate::storage::gateways;
use crate::ws::handshake::{auth_error_envelope, auth_ok_envelope};
use crate::AppContext;

pub async fn gateway_relay_ws(
    ws: WebSocketUpgrade,
    State(ctx): State<Arc<AppContext>>,
    Path(gateway_id): Path<Uuid>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle(socket, ctx, gateway_id))
}

async fn handle(socket: WebSocket, ctx: Arc<AppContext>, gateway_id: Uuid) {
    let (mut sink, mut stream) = socket.split();

    // §4.2: await exactly one message, require it to be an `auth` frame.
    let relay_token = match stream.next().await {
        Some(Ok(Message::Text(raw))) => match Envelope::parse(&raw) {
            Ok(envelope) if envelope.kind == MSG_AUTH => envelope
                .payload
                .as_ref()
                .and_then(|p| p.get("relay_token"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        },
        _ => None,
    };

    let authorized = match relay_token.as_deref() {
        Some(t) if !t.is_empty() => gateways::validate_relay_token(ctx.storage.pool(), gateway_id, t)
            .await
            .unwrap_or(false),
        _ => false,
    };

    if !authorized {
        let _ = sink
            .send(Message::Text(auth_error_envelope("invalid relay token").to_json()))
            .await;
        let _ = sink
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_UNAUTHENTICATED,
                reason: "unauthenticated".into(),
            })))
            .await;
        return;
    }

    if let Err(e) = gateways::mark_online(ctx.storage.pool(), gateway_id).await {
        warn!(%gateway_id, error = %e, "gateway relay ws: failed marking online");
    }

    let _ = sink
        .send(Message::Text(
            auth_ok_envelope(serde_json::json!({ "gateway_id": gateway_id })).to_json(),
        ))
        .await;

    ctx.gateway_pool.register(gateway_id, sink).await;
    info!(%gateway_id, "gateway relay ws: connected");

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(raw) = msg else { continue };
        let Ok(envelope) = Envelope::parse(&raw) else {
            continue;
        };
        match envelope.kind.as_str() {
            MSG_HEARTBEAT => {
                ctx.gateway_pool.send(&gateway_id, &Envelope::heartbeat_ack(envelope.id)).await;
            }
            MSG_CHAT_REPLY => {
                let (session_key, content, extra) = match &envelope.payload {
                    Some(p) => (
                        p.get("session_key").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        p.get("content").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        p.get("extra").cloned(),
                    ),
                    None => (String::new(), String::new(), None),
                };
                if session_key.is_empty() {
                    continue;
                }
                if let Err(e) = router::route_gateway_to_user(
                    ctx.storage.pool(),
                    &ctx.bus,
                    &ctx.user_pool,
                    &session_key,
                    &content,
                    extra,
                )
                .await
                {
                    warn!(%gateway_id, error = %e, "gateway relay ws: routing reply failed");
                }
            }
            other => {
                warn!(%gateway_id, kind = other, "gateway relay ws: unrecognized message type");
            }
        }
    }

    ctx.gateway_pool.unregister(&gateway_id).await;
    if let Err(e) = gateways::mark_offline_if_online(ctx.storage.pool(), gateway_id).await {
        warn!(%gateway_id, error = %e, "gateway relay ws: failed marking offline");
    }
    info!(%gateway_id, "gateway relay ws: disconnected");
}
