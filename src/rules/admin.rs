//! Proactive rule administration surface (SPEC_FULL.md §11 supplement),
//! grounded on the original `proactive_rules.py` admin router: list/create/
//! patch/toggle/delete, all scoped to the caller's organization. Builtin
//! rules reject deletion with 409, matching the source's guard.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::storage::proactive_rules;
use crate::AppContext;

#[derive(Deserialize)]
pub struct CreateRuleRequest {
    pub board_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub trigger_event: String,
    #[serde(default)]
    pub conditions: Value,
    pub action_type: String,
    #[serde(default)]
    pub action_config: Value,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: i32,
}

fn default_cooldown() -> i32 {
    3600
}

#[derive(Deserialize)]
pub struct ToggleRequest {
    pub is_enabled: bool,
}

pub async fn list_rules(
    State(ctx): State<Arc<AppContext>>,
    Path(org_id): Path<Uuid>,
) -> impl IntoResponse {
    match proactive_rules::list_for_org(ctx.storage.pool(), org_id).await {
        Ok(rules) => (StatusCode::OK, Json(json!({ "rules": rules }))).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

pub async fn create_rule(
    State(ctx): State<Arc<AppContext>>,
    Path(org_id): Path<Uuid>,
    Json(req): Json<CreateRuleRequest>,
) -> impl IntoResponse {
    let result = proactive_rules::create(
        ctx.storage.pool(),
        org_id,
        req.board_id,
        &req.name,
        req.description.as_deref(),
        &req.trigger_event,
        req.conditions,
        &req.action_type,
        req.action_config,
        req.cooldown_seconds,
    )
    .await;
    match result {
        Ok(rule) => (StatusCode::CREATED, Json(rule)).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

pub async fn toggle_rule(
    State(ctx): State<Arc<AppContext>>,
    Path((org_id, rule_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ToggleRequest>,
) -> impl IntoResponse {
    match proactive_rules::get_for_org(ctx.storage.pool(), org_id, rule_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return (StatusCode::NOT_FOUND, "rule not found").into_response(),
        Err(e) => return internal_error(e).into_response(),
    }
    match proactive_rules::set_enabled(ctx.storage.pool(), rule_id, req.is_enabled).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

pub async fn delete_rule(
    State(ctx): State<Arc<AppContext>>,
    Path((org_id, rule_id)): Path<(Uuid, Uuid)>,
) -> impl IntoResponse {
    let rule = match proactive_rules::get_for_org(ctx.storage.pool(), org_id, rule_id).await {
        Ok(Some(rule)) => rule,
        Ok(None) => return (StatusCode::NOT_FOUND, "rule not found").into_response(),
        Err(e) => return internal_error(e).into_response(),
    };
    if rule.is_builtin {
        return (StatusCode::CONFLICT, "builtin rules cannot be deleted").into_response();
    }
    match proactive_rules::delete_non_builtin(ctx.storage.pool(), org_id, rule_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "rule not found").into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

fn internal_error(e: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
