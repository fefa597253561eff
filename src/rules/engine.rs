//! The rule engine's event intake and dispatcher. SystemEvents are turned
//! into [`TriggerEvent`]s by the event publisher's callers and fed through
//! `fire()`; a single background dispatcher consumes them and evaluates
//! every enabled, non-cooled-down rule in that org for that trigger type.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::board_sync;
use crate::bus::Bus;
use crate::rules::conditions;
use crate::storage::models::ProactiveRule;
use crate::storage::{proactive_rules, suggestions};
use crate::suggestions as suggestion_stream;

const TRIGGER_CHANNEL_CAPACITY: usize = 256;

/// A SystemEvent reduced to the fields the rule engine needs to evaluate
/// and fire rules — §4.6 step 1–2.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub organization_id: Uuid,
    pub board_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub event_type: String,
    pub context: Value,
}

pub struct RuleEngine {
    pool: PgPool,
    bus: Arc<Bus>,
    tx: broadcast::Sender<TriggerEvent>,
}

impl RuleEngine {
    pub fn new(pool: PgPool, bus: Arc<Bus>) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(TRIGGER_CHANNEL_CAPACITY);
        Arc::new(Self { pool, bus, tx })
    }

    /// Hand a trigger event to the dispatcher. Non-blocking; a lagging or
    /// absent dispatcher never backs up the caller (the event publisher).
    pub fn fire(&self, event: TriggerEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("rule engine: no dispatcher listening for trigger event");
        }
    }

    /// Spawn the background consumer. Call once at startup.
    pub fn start(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        let mut rx = engine.tx.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let engine = Arc::clone(&engine);
                        tokio::spawn(async move {
                            if let Err(e) = engine.handle(event).await {
                                warn!(error = %e, "rule engine: failed handling trigger event");
                            }
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(dropped = n, "rule engine: dispatcher lagged, dropped events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    async fn handle(&self, event: TriggerEvent) -> anyhow::Result<()> {
        let candidates =
            proactive_rules::list_candidates(&self.pool, event.organization_id, &event.event_type).await?;
        for rule in candidates {
            if self.is_cooling_down(&rule) {
                continue;
            }
            if !conditions::evaluate(&rule.conditions, &event.context) {
                continue;
            }
            self.fire_rule(&rule, &event).await?;
        }
        Ok(())
    }

    fn is_cooling_down(&self, rule: &ProactiveRule) -> bool {
        rule_is_cooling_down(rule.last_fired_at, rule.cooldown_seconds)
    }

    async fn fire_rule(&self, rule: &ProactiveRule, event: &TriggerEvent) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        proactive_rules::mark_fired(&mut tx, rule.id).await?;

        let title = rule
            .action_config
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(&rule.name)
            .to_string();
        let description = rule
            .action_config
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let confidence = rule.action_config.get("confidence").and_then(Value::as_f64).map(|v| v as f32);
        let priority = rule.action_config.get("priority").and_then(Value::as_str).map(str::to_string);

        let suggestion = suggestions::insert(
            &mut tx,
            rule.organization_id,
            event.board_id,
            event.agent_id,
            None,
            &rule.action_type,
            &title,
            description.as_deref(),
            confidence,
            priority.as_deref(),
        )
        .await?;
        tx.commit().await?;

        if let Some(board_id) = event.board_id {
            board_sync::broadcast_suggestion(&self.bus, board_id, &suggestion);
        }
        suggestion_stream::publish(&self.bus, &suggestion);
        Ok(())
    }
}

/// Pure cooldown check (§4.6 step 3): a rule that has never fired is never
/// cooling down; otherwise it must be at least `cooldown_seconds` since
/// `last_fired_at`.
fn rule_is_cooling_down(last_fired_at: Option<DateTime<Utc>>, cooldown_seconds: i32) -> bool {
    match last_fired_at {
        Some(last) => Utc::now().signed_duration_since(last).num_seconds() < cooldown_seconds as i64,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn a_rule_that_never_fired_is_never_cooling_down() {
        assert!(!rule_is_cooling_down(None, 300));
    }

    #[test]
    fn a_rule_fired_within_the_cooldown_window_is_cooling_down() {
        let last = Utc::now() - Duration::seconds(10);
        assert!(rule_is_cooling_down(Some(last), 300));
    }

    #[test]
    fn a_rule_fired_past_the_cooldown_window_is_not_cooling_down() {
        let last = Utc::now() - Duration::seconds(301);
        assert!(!rule_is_cooling_down(Some(last), 300));
    }
}
