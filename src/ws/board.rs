//! Operator board-sync WebSocket endpoint — `/ws/board/{board_id}/sync`
//! (§4.4, §6). Snapshot-then-stream: one `board.state` frame, then every
//! `board_sync:{board_id}` bus message is forwarded verbatim for the life
//! of the connection. `task.move`/`task.create` are each handled on their
//! own spawned task so one slow task body can't block the heartbeat ack of
//! another.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::board_sync;
use crate::events;
use crate::protocol::{
    Envelope, CLOSE_ENTITY_ABSENT, CLOSE_UNAUTHENTICATED, MSG_HEARTBEAT, MSG_TASK_CREATE, MSG_TASK_MOVE,
};
use crate::rules::TriggerEvent;
use crate::storage::{boards, tasks};
use crate::ws::handshake::{auth_error_envelope, auth_ok_envelope, validate_board_token};
use crate::AppContext;

#[derive(Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

pub async fn board_sync_ws(
    ws: WebSocketUpgrade,
    State(ctx): State<Arc<AppContext>>,
    Path(board_id): Path<Uuid>,
    Query(query): Query<AuthQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle(socket, ctx, board_id, query.token))
}

async fn handle(socket: WebSocket, ctx: Arc<AppContext>, board_id: Uuid, token: Option<String>) {
    let (mut sink, mut stream) = socket.split();

    let authorized = token
        .as_deref()
        .map(|t| validate_board_token(&ctx.config.operator_shared_secret, t))
        .unwrap_or(false);
    if !authorized {
        let _ = sink.send(Message::Text(auth_error_envelope("invalid token").to_json())).await;
        let _ = sink
            .send(Message::Close(Some(CloseFrame { code: CLOSE_UNAUTHENTICATED, reason: "unauthenticated".into() })))
            .await;
        return;
    }

    let board = match boards::get_by_id(ctx.storage.pool(), board_id).await {
        Ok(Some(b)) => b,
        Ok(None) => {
            let _ = sink
                .send(Message::Close(Some(CloseFrame { code: CLOSE_ENTITY_ABSENT, reason: "board not found".into() })))
                .await;
            return;
        }
        Err(e) => {
            warn!(%board_id, error = %e, "board sync ws: failed loading board");
            return;
        }
    };
    let _ = board;

    let snapshot = match board_sync::snapshot(ctx.storage.pool(), board_id).await {
        Ok(s) => s,
        Err(e) => {
            warn!(%board_id, error = %e, "board sync ws: failed building snapshot");
            return;
        }
    };
    let _ = sink.send(Message::Text(auth_ok_envelope(serde_json::json!({ "board_id": board_id })).to_json())).await;
    if sink.send(Message::Text(snapshot.to_json())).await.is_err() {
        return;
    }

    let sink = Arc::new(Mutex::new(sink));
    let forward_sink = Arc::clone(&sink);
    let mut rx = ctx.bus.subscribe(&board_sync::channel(board_id));
    let forward_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(raw) => {
                    let mut sink = forward_sink.lock().await;
                    if sink.send(Message::Text(raw)).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    info!(%board_id, "board sync ws: connected");

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(raw) = msg else { continue };
        let Ok(envelope) = Envelope::parse(&raw) else { continue };
        match envelope.kind.as_str() {
            MSG_HEARTBEAT => {
                let mut sink = sink.lock().await;
                let _ = sink.send(Message::Text(Envelope::heartbeat_ack(envelope.id).to_json())).await;
            }
            MSG_TASK_MOVE => {
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move { handle_task_move(ctx, board_id, envelope).await });
            }
            MSG_TASK_CREATE => {
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move { handle_task_create(ctx, board_id, envelope).await });
            }
            other => {
                warn!(%board_id, kind = other, "board sync ws: unrecognized message type");
            }
        }
    }

    forward_task.abort();
    info!(%board_id, "board sync ws: disconnected");
}

async fn handle_task_move(ctx: Arc<AppContext>, board_id: Uuid, envelope: Envelope) {
    let Some(payload) = envelope.payload else { return };
    let Some(task_id) = payload.get("task_id").and_then(|v| v.as_str()).and_then(|s| s.parse::<Uuid>().ok()) else {
        return;
    };
    let Some(new_status) = payload.get("status").and_then(|v| v.as_str()) else { return };

    let previous_status = match tasks::get_by_id(ctx.storage.pool(), task_id).await {
        Ok(Some(task)) => task.status,
        Ok(None) => return,
        Err(e) => {
            warn!(%task_id, error = %e, "board sync ws: task.move failed to load prior state");
            return;
        }
    };

    match tasks::update_status(ctx.storage.pool(), task_id, new_status).await {
        Ok(Some(_)) => {
            let changes = serde_json::json!({ "status": new_status, "previous_status": previous_status });
            let actor = serde_json::json!({ "type": "user", "id": "ws-client" });
            board_sync::broadcast_task_updated(&ctx.bus, board_id, task_id, &changes, &actor);
            emit_task_status_changed(&ctx, board_id, task_id, new_status, &previous_status).await;
        }
        Ok(None) => warn!(%task_id, "board sync ws: task.move referenced unknown task"),
        Err(e) => warn!(%task_id, error = %e, "board sync ws: task.move failed"),
    }
}

/// §4.5/§4.6: persist a `task.status_changed` SystemEvent, then hand the
/// rule engine a matching trigger so proactive rules on this org can react
/// (S2's `trigger_event="task.status_changed"` scenario).
async fn emit_task_status_changed(
    ctx: &Arc<AppContext>,
    board_id: Uuid,
    task_id: Uuid,
    new_status: &str,
    previous_status: &str,
) {
    let board = match boards::get_by_id(ctx.storage.pool(), board_id).await {
        Ok(Some(board)) => board,
        Ok(None) => return,
        Err(e) => {
            warn!(%board_id, error = %e, "board sync ws: failed loading board for event publish");
            return;
        }
    };
    let payload = serde_json::json!({ "new_status": new_status, "previous_status": previous_status });
    match events::emit(
        ctx.storage.pool(),
        &ctx.bus,
        board.organization_id,
        Some(board_id),
        None,
        Some(task_id),
        "task.status_changed",
        payload.clone(),
    )
    .await
    {
        Ok(_) => ctx.rule_engine.fire(TriggerEvent {
            organization_id: board.organization_id,
            board_id: Some(board_id),
            agent_id: None,
            event_type: "task.status_changed".to_string(),
            context: payload,
        }),
        Err(e) => warn!(%task_id, error = %e, "board sync ws: failed publishing task.status_changed event"),
    }
}

async fn handle_task_create(ctx: Arc<AppContext>, board_id: Uuid, envelope: Envelope) {
    let Some(payload) = envelope.payload else { return };
    let Some(title) = payload.get("title").and_then(|v| v.as_str()) else { return };
    let status = payload.get("status").and_then(|v| v.as_str()).unwrap_or("inbox");
    let priority = payload.get("priority").and_then(|v| v.as_str());
    let assigned_agent_id = payload
        .get("assigned_agent_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<Uuid>().ok());

    match tasks::create(ctx.storage.pool(), board_id, title, status, priority, assigned_agent_id).await {
        Ok(task) => {
            board_sync::broadcast_task_created(&ctx.bus, board_id, &task);
            emit_task_created(&ctx, board_id, &task).await;
        }
        Err(e) => warn!(%board_id, error = %e, "board sync ws: task.create failed"),
    }
}

async fn emit_task_created(ctx: &Arc<AppContext>, board_id: Uuid, task: &crate::storage::models::Task) {
    let board = match boards::get_by_id(ctx.storage.pool(), board_id).await {
        Ok(Some(board)) => board,
        Ok(None) => return,
        Err(e) => {
            warn!(%board_id, error = %e, "board sync ws: failed loading board for event publish");
            return;
        }
    };
    let payload = serde_json::json!({ "task_id": task.id, "status": task.status });
    match events::emit(
        ctx.storage.pool(),
        &ctx.bus,
        board.organization_id,
        Some(board_id),
        None,
        Some(task.id),
        "task.created",
        payload.clone(),
    )
    .await
    {
        Ok(_) => ctx.rule_engine.fire(TriggerEvent {
            organization_id: board.organization_id,
            board_id: Some(board_id),
            agent_id: None,
            event_type: "task.created".to_string(),
            context: payload,
        }),
        Err(e) => warn!(board_id = %board_id, error = %e, "board sync ws: failed publishing task.created event"),
    }
}
