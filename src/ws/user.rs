//! End-user chat WebSocket endpoint — a single `/ws/user/chat` connection
//! per user (§4.2, §4.3, §6): one user may be assigned to many agents
//! (N:M per §3/§9), so the agent is named per-message, not by the route.
//!
//! Auth handshake: the server awaits exactly one message; it must be
//! `{"type": "auth", "payload": {"token": "<end-user JWT>"}}` or the
//! connection is closed with `4001` before anything is registered.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::protocol::{Envelope, CLOSE_UNAUTHENTICATED, MSG_AUTH, MSG_CHAT, MSG_ERROR, MSG_HEARTBEAT};
use crate::router;
use crate::ws::handshake::{auth_error_envelope, auth_ok_envelope, decode_end_user_token};
use crate::AppContext;

pub async fn user_chat_ws(ws: WebSocketUpgrade, State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle(socket, ctx))
}

async fn handle(socket: WebSocket, ctx: Arc<AppContext>) {
    let (mut sink, mut stream) = socket.split();

    // §4.2: await exactly one message, require it to be an `auth` frame.
    let token = match stream.next().await {
        Some(Ok(Message::Text(raw))) => match Envelope::parse(&raw) {
            Ok(envelope) if envelope.kind == MSG_AUTH => envelope
                .payload
                .as_ref()
                .and_then(|p| p.get("token"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        },
        _ => None,
    };

    let claims = match token.as_deref() {
        Some(t) if !t.is_empty() => decode_end_user_token(&ctx.config.end_user_jwt_secret, t),
        _ => Err(crate::error::CoreError::unauthorized("expected auth message with a token")),
    };

    let claims = match claims {
        Ok(c) => c,
        Err(e) => {
            let _ = sink.send(Message::Text(auth_error_envelope(e.message()).to_json())).await;
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_UNAUTHENTICATED,
                    reason: "unauthenticated".into(),
                })))
                .await;
            return;
        }
    };

    let user_id = claims.sub;
    let _ = sink
        .send(Message::Text(
            auth_ok_envelope(serde_json::json!({ "user_id": user_id, "organization_id": claims.org })).to_json(),
        ))
        .await;

    ctx.user_pool.register(user_id, sink).await;
    info!(%user_id, "user chat ws: connected");

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(raw) = msg else { continue };
        let Ok(envelope) = Envelope::parse(&raw) else {
            continue;
        };
        match envelope.kind.as_str() {
            MSG_HEARTBEAT => {
                ctx.user_pool.send(&user_id, &Envelope::heartbeat_ack(envelope.id)).await;
            }
            MSG_CHAT => {
                let (agent_id, content) = match &envelope.payload {
                    Some(p) => (
                        p.get("agent_id").and_then(|v| v.as_str()).and_then(|s| s.parse::<Uuid>().ok()),
                        p.get("content").and_then(|v| v.as_str()).unwrap_or_default(),
                    ),
                    None => (None, ""),
                };
                let Some(agent_id) = agent_id else {
                    ctx.user_pool
                        .send(&user_id, &Envelope::new(MSG_ERROR).with_payload(serde_json::json!({ "reason": "missing agent_id" })))
                        .await;
                    continue;
                };
                if let Err(e) = router::route_user_to_agent(
                    ctx.storage.pool(),
                    &ctx.bus,
                    &ctx.rule_engine,
                    &ctx.user_pool,
                    &ctx.gateway_pool,
                    user_id,
                    agent_id,
                    content,
                    envelope.id.clone(),
                )
                .await
                {
                    warn!(%user_id, %agent_id, error = %e, "user chat ws: routing failed");
                    ctx.user_pool
                        .send(&user_id, &Envelope::new(MSG_ERROR).with_payload(serde_json::json!({ "reason": e.message() })))
                        .await;
                }
            }
            other => {
                warn!(%user_id, kind = other, "user chat ws: unrecognized message type");
            }
        }
    }

    ctx.user_pool.unregister(&user_id).await;
    info!(%user_id, "user chat ws: disconnected");
}
