//! The Message Router (SPEC_FULL.md §4.3): authorizes a chat message against
//! the (user, agent) assignment, resolves or creates the ChatSession, and
//! delivers to whichever side is live. A locally-registered socket is
//! written to directly; otherwise the envelope is published to that
//! connection's route channel so another instance holding the socket can
//! pick it up (single-instance bus: see `bus.rs` for the caveat).

use anyhow::Result;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::bus::Bus;
use crate::error::CoreError;
use crate::events;
use crate::pool::ConnectionPool;
use crate::protocol::{Envelope, MSG_CHAT_REPLY, MSG_CHAT_SEND};
use crate::rules::{RuleEngine, TriggerEvent};
use crate::storage::{agents, chat_sessions, end_users, gateways};

pub fn user_route_channel(user_id: Uuid) -> String {
    format!("ws:route:user:{user_id}")
}

pub fn gateway_route_channel(gateway_id: Uuid) -> String {
    format!("ws:route:gateway:{gateway_id}")
}

/// §4.3 step 1–4: authorize, resolve session, forward to the gateway. Also
/// publishes a `chat.message` SystemEvent and hands it to the rule engine,
/// so proactive rules triggered on chat activity see real traffic.
#[allow(clippy::too_many_arguments)]
pub async fn route_user_to_agent(
    pool: &PgPool,
    bus: &Bus,
    rule_engine: &RuleEngine,
    user_pool: &ConnectionPool<Uuid>,
    gateway_pool: &ConnectionPool<Uuid>,
    user_id: Uuid,
    agent_id: Uuid,
    content: &str,
    message_id: Option<String>,
) -> Result<(), CoreError> {
    let assignment = end_users::find_active_assignment(pool, user_id, agent_id)
        .await
        .map_err(|e| CoreError::transient(e.to_string()))?
        .ok_or_else(|| CoreError::unauthorized("no active assignment for this agent"))?;

    let agent = agents::get_by_id(pool, agent_id)
        .await
        .map_err(|e| CoreError::transient(e.to_string()))?
        .ok_or_else(|| CoreError::client_input("agent not found"))?;

    let session = chat_sessions::find_or_create_active(
        pool,
        assignment.organization_id,
        user_id,
        agent_id,
        agent.gateway_id,
    )
    .await
    .map_err(|e| CoreError::transient(e.to_string()))?;

    chat_sessions::touch_last_message(pool, session.id)
        .await
        .map_err(|e| CoreError::transient(e.to_string()))?;

    let envelope = Envelope::new(MSG_CHAT_SEND).with_payload(json!({
        "session_key": session.session_key,
        "h5_user_id": user_id,
        "agent_id": agent_id,
        "content": content,
        "role": "user",
    }));
    let envelope = match message_id {
        Some(id) => envelope.with_id(id),
        None => envelope,
    };

    deliver_to_gateway(bus, gateway_pool, agent.gateway_id, &envelope).await;

    let event_payload = json!({ "agent_id": agent_id, "h5_user_id": user_id, "content": content });
    match events::emit(
        pool,
        bus,
        assignment.organization_id,
        None,
        Some(agent_id),
        None,
        "chat.message",
        event_payload.clone(),
    )
    .await
    {
        Ok(_) => rule_engine.fire(TriggerEvent {
            organization_id: assignment.organization_id,
            board_id: None,
            agent_id: Some(agent_id),
            event_type: "chat.message".to_string(),
            context: event_payload,
        }),
        Err(e) => tracing::warn!(%user_id, %agent_id, error = %e, "message router: failed publishing chat.message event"),
    }

    Ok(())
}

/// §4.3 step 5–7: a gateway's reply is looked up by session key and
/// delivered back to the originating user, with any `extra` fields from the
/// gateway's payload spread into the outgoing envelope.
pub async fn route_gateway_to_user(
    pool: &PgPool,
    bus: &Bus,
    user_pool: &ConnectionPool<Uuid>,
    session_key: &str,
    content: &str,
    extra: Option<Value>,
) -> Result<(), CoreError> {
    let session = chat_sessions::find_active_by_session_key(pool, session_key)
        .await
        .map_err(|e| CoreError::transient(e.to_string()))?
        .ok_or_else(|| CoreError::client_input("unknown or inactive session"))?;

    let mut fields = json!({
        "session_key": session.session_key,
        "agent_id": session.agent_id,
        "content": content,
        "role": "assistant",
    });
    if let Some(Value::Object(extra)) = extra {
        if let Value::Object(map) = &mut fields {
            map.extend(extra);
        }
    }

    let envelope = Envelope::new(MSG_CHAT_REPLY).with_payload(fields);

    deliver_to_user(bus, user_pool, session.user_id, &envelope).await;
    Ok(())
}

pub async fn validate_gateway_token(pool: &PgPool, gateway_id: Uuid, token: &str) -> Result<bool> {
    gateways::validate_relay_token(pool, gateway_id, token)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}

async fn deliver_to_user(bus: &Bus, user_pool: &ConnectionPool<Uuid>, user_id: Uuid, envelope: &Envelope) {
    if user_pool.connected(&user_id).await {
        user_pool.send(&user_id, envelope).await;
    } else {
        bus.publish_json(&user_route_channel(user_id), &serde_json::to_value(envelope).unwrap_or_default());
    }
}

async fn deliver_to_gateway(
    bus: &Bus,
    gateway_pool: &ConnectionPool<Uuid>,
    gateway_id: Uuid,
    envelope: &Envelope,
) {
    if gateway_pool.connected(&gateway_id).await {
        gateway_pool.send(&gateway_id, envelope).await;
    } else {
        bus.publish_json(
            &gateway_route_channel(gateway_id),
            &serde_json::to_value(envelope).unwrap_or_default(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_channel_names_match_the_wire_format() {
        let id = Uuid::nil();
        assert_eq!(user_route_channel(id), format!("ws:route:user:{id}"));
        assert_eq!(gateway_route_channel(id), format!("ws:route:gateway:{id}"));
    }
}
