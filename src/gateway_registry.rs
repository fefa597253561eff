//! Gateway registration/heartbeat HTTP surface (SPEC_FULL.md §6). Named
//! out-of-scope-in-depth by the purpose section — this crate implements
//! only the interface shape the relay needs to hand a gateway a token and
//! keep its liveness row current, not the full fleet-management admin UI.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::events;
use crate::rules::TriggerEvent;
use crate::storage::gateways;
use crate::AppContext;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub organization_id: Uuid,
    #[allow(dead_code)]
    pub registration_token: String,
    pub name: String,
    pub url: Option<String>,
    pub workspace_root: Option<String>,
}

/// A fresh relay token is minted and returned on every registration call;
/// only its SHA-256 hash is persisted (§3 Gateway.token_hash).
pub async fn register_gateway(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let relay_token = Uuid::new_v4().simple().to_string();
    let token_hash = hex::encode(Sha256::digest(relay_token.as_bytes()));

    let id = Uuid::new_v4();
    let result = sqlx::query(
        "INSERT INTO gateways (id, organization_id, name, url, workspace_root, token_hash, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, 'pending', now(), now())",
    )
    .bind(id)
    .bind(req.organization_id)
    .bind(&req.name)
    .bind(&req.url)
    .bind(&req.workspace_root)
    .bind(&token_hash)
    .execute(ctx.storage.pool())
    .await;

    match result {
        Ok(_) => {
            let event_payload = json!({ "gateway_id": id, "name": req.name });
            match events::emit(
                ctx.storage.pool(),
                &ctx.bus,
                req.organization_id,
                None,
                None,
                None,
                "gateway.registered",
                event_payload.clone(),
            )
            .await
            {
                Ok(_) => ctx.rule_engine.fire(TriggerEvent {
                    organization_id: req.organization_id,
                    board_id: None,
                    agent_id: None,
                    event_type: "gateway.registered".to_string(),
                    context: event_payload,
                }),
                Err(e) => {
                    tracing::warn!(gateway_id = %id, error = %e, "gateway registration: failed publishing gateway.registered event")
                }
            }

            (
                StatusCode::CREATED,
                Json(json!({
                    "gateway_id": id,
                    "relay_token": relay_token,
                    "status": "pending",
                    "heartbeat_interval_seconds": ctx.config.gateway_heartbeat_interval_seconds,
                })),
            )
                .into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
pub struct HeartbeatRequest {
    pub gateway_id: Uuid,
    pub relay_token: String,
    #[allow(dead_code)]
    pub metrics: Option<serde_json::Value>,
}

pub async fn gateway_heartbeat(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<HeartbeatRequest>,
) -> impl IntoResponse {
    match gateways::validate_relay_token(ctx.storage.pool(), req.gateway_id, &req.relay_token).await {
        Ok(true) => {}
        Ok(false) => return (StatusCode::UNAUTHORIZED, "invalid relay token").into_response(),
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
    match gateways::mark_online(ctx.storage.pool(), req.gateway_id).await {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
