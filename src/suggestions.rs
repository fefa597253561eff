//! Suggestion delivery (SPEC_FULL.md §4.6 step 6): a fresh Suggestion is
//! published on the org's event channel so the `/organizations/{id}/suggestions/stream`
//! SSE endpoint — grounded on the daemon's session-events SSE bridge — can
//! forward it to every connected operator without polling.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures_util::stream;
use serde_json::json;
use uuid::Uuid;

use crate::bus::Bus;
use crate::events::org_channel;
use crate::storage::models::Suggestion;
use crate::AppContext;

const MSG_TYPE: &str = "suggestion.new";

pub fn publish(bus: &Bus, suggestion: &Suggestion) {
    let value = json!({ "type": MSG_TYPE, "payload": suggestion });
    bus.publish_json(&org_channel(suggestion.organization_id), &value);
}

/// `GET /organizations/{org_id}/suggestions/stream` — org-scoped SSE feed.
pub async fn stream_suggestions(
    State(ctx): State<Arc<AppContext>>,
    Path(org_id): Path<Uuid>,
) -> impl IntoResponse {
    let mut rx = ctx.bus.subscribe(&org_channel(org_id));

    let body = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(raw) => {
                    let value: serde_json::Value = match serde_json::from_str(&raw) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };
                    if value.get("type").and_then(|v| v.as_str()) != Some(MSG_TYPE) {
                        continue;
                    }
                    let event = Event::default().data(raw).event(MSG_TYPE);
                    return Some((Ok::<Event, std::convert::Infallible>(event), rx));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(body).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}
