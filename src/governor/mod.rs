//! The Heartbeat Governor (SPEC_FULL.md §4.7): a periodic control loop that
//! decides each auto-heartbeat-enabled agent's next poll interval and
//! dispatches the change to its gateway. A Postgres advisory lock enforces
//! a single writer across instances — the loop simply skips a tick if it
//! cannot acquire the lock rather than queuing behind it.

pub mod ladder;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::storage::agents::{self, GovernorUpdate};
use crate::storage::{boards, gateways};
use ladder::{compute_desired_heartbeat, merge_heartbeat_config};

/// Advisory lock key pair, matching the Python original's literal constants.
const LOCK_KEY_1: i64 = 424242;
const LOCK_KEY_2: i64 = 1701;

const MIN_INTERVAL_SECS: u64 = 30;
const DEFAULT_INTERVAL_SECS: u64 = 300;

pub struct GovernorConfig {
    pub interval_secs: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self { interval_secs: DEFAULT_INTERVAL_SECS }
    }
}

pub struct HeartbeatGovernor {
    pool: PgPool,
    http: Client,
    config: GovernorConfig,
}

impl HeartbeatGovernor {
    pub fn new(pool: PgPool, config: GovernorConfig) -> Arc<Self> {
        let interval_secs = config.interval_secs.max(MIN_INTERVAL_SECS);
        Arc::new(Self {
            pool,
            http: Client::new(),
            config: GovernorConfig { interval_secs },
        })
    }

    /// Run the tick loop forever. Call once at startup as a spawned task.
    pub async fn run_loop(self: Arc<Self>) {
        let mut tick = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        loop {
            tick.tick().await;
            if let Err(e) = self.run_once().await {
                warn!(error = %e, "heartbeat governor: tick failed");
            }
        }
    }

    /// One full governor tick: acquire lock, snapshot, decide, persist,
    /// dispatch, release. Returns `Ok(())` even when the lock could not be
    /// acquired (another instance is already running this tick).
    pub async fn run_once(&self) -> anyhow::Result<()> {
        if !self.try_acquire_lock().await? {
            debug!("heartbeat governor: lock held elsewhere, skipping tick");
            return Ok(());
        }
        let result = self.run_locked().await;
        if let Err(e) = self.release_lock().await {
            warn!(error = %e, "heartbeat governor: failed to release advisory lock");
        }
        result
    }

    async fn try_acquire_lock(&self) -> anyhow::Result<bool> {
        let (acquired,): (bool,) =
            sqlx::query_as("SELECT pg_try_advisory_lock($1, $2)")
                .bind(LOCK_KEY_1)
                .bind(LOCK_KEY_2)
                .fetch_one(&self.pool)
                .await?;
        Ok(acquired)
    }

    async fn release_lock(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT pg_advisory_unlock($1, $2)")
            .bind(LOCK_KEY_1)
            .bind(LOCK_KEY_2)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn run_locked(&self) -> anyhow::Result<()> {
        let candidates = agents::list_auto_heartbeat_enabled(&self.pool).await?;
        if candidates.is_empty() {
            return Ok(());
        }

        let board_ids: Vec<Uuid> = candidates.iter().filter_map(|a| a.board_id).collect();
        let boards_by_id: HashMap<Uuid, _> = boards::get_by_ids(&self.pool, &board_ids)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();
        let last_chat_by_board = boards::latest_chat_by_board(&self.pool).await?;
        let has_work_by_agent = agents::has_work_by_agent(&self.pool).await?;

        let mut updates = Vec::new();
        let mut gateway_patches: HashMap<Uuid, Vec<serde_json::Value>> = HashMap::new();

        for agent in &candidates {
            let Some(board) = agent.board_id.and_then(|id| boards_by_id.get(&id)) else {
                continue;
            };
            if !board.auto_heartbeat_governor_enabled {
                continue;
            }

            let has_work = has_work_by_agent.get(&agent.id).copied().unwrap_or(false);
            let last_chat = agent.board_id.and_then(|id| last_chat_by_board.get(&id).copied());
            let is_active = is_agent_active(&board.auto_heartbeat_governor_activity_trigger_type, last_chat, has_work);

            let decision = compute_desired_heartbeat(
                is_active,
                agent.auto_heartbeat_step,
                &board.ladder(),
                ladder::DEFAULT_ACTIVE_EVERY,
                &board.auto_heartbeat_governor_lead_cap_every,
                agent.is_board_lead,
            );

            let unchanged = decision.step == agent.auto_heartbeat_step
                && decision.off == agent.auto_heartbeat_off
                && decision.every.as_deref() == agent.heartbeat_every().as_deref();
            if unchanged {
                continue;
            }

            let heartbeat_config = decision
                .every
                .as_ref()
                .map(|every| merge_heartbeat_config(agent.heartbeat_config.as_ref(), every));

            if let Some(config) = &heartbeat_config {
                gateway_patches.entry(agent.gateway_id).or_default().push(json!({
                    "agent_id": agent.id,
                    "heartbeat_config": config,
                }));
            }

            updates.push(GovernorUpdate {
                agent_id: agent.id,
                step: decision.step,
                off: decision.off,
                heartbeat_config: heartbeat_config.clone(),
                last_active_at: if is_active { Some(chrono::Utc::now()) } else { None },
            });
        }

        if updates.is_empty() {
            return Ok(());
        }

        info!(count = updates.len(), "heartbeat governor: applying updates");
        agents::apply_governor_updates(&self.pool, &updates).await?;
        self.dispatch_patches(gateway_patches).await;
        Ok(())
    }

    /// Send each gateway its batch of agent heartbeat-config patches.
    /// Per-tick retry policy is log-only: a failed dispatch is picked back
    /// up on the next tick once the row's step/every has already advanced,
    /// not retried in-tick.
    async fn dispatch_patches(&self, patches: HashMap<Uuid, Vec<serde_json::Value>>) {
        for (gateway_id, agent_patches) in patches {
            let gateway = match gateways::get_by_id(&self.pool, gateway_id).await {
                Ok(Some(g)) => g,
                Ok(None) => continue,
                Err(e) => {
                    warn!(gateway_id = %gateway_id, error = %e, "heartbeat governor: failed loading gateway");
                    continue;
                }
            };
            let Some(url) = &gateway.url else {
                debug!(gateway_id = %gateway_id, "heartbeat governor: gateway has no URL, skipping dispatch");
                continue;
            };
            let endpoint = format!("{}/agents/heartbeat-config", url.trim_end_matches('/'));
            let result = self
                .http
                .patch(&endpoint)
                .bearer_auth(&gateway.token_hash)
                .json(&json!({ "patches": agent_patches }))
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    debug!(gateway_id = %gateway_id, "heartbeat governor: patch dispatched");
                }
                Ok(resp) => {
                    warn!(gateway_id = %gateway_id, status = %resp.status(), "heartbeat governor: gateway rejected patch");
                }
                Err(e) => {
                    warn!(gateway_id = %gateway_id, error = %e, "heartbeat governor: patch dispatch failed");
                }
            }
        }
    }
}

/// §4.7 step 2: trigger type A ("chat") counts only chat activity within the
/// active window; type B ("chat_or_work") also counts in-progress work.
fn is_agent_active(
    trigger_type: &str,
    last_chat_at: Option<chrono::DateTime<chrono::Utc>>,
    has_work: bool,
) -> bool {
    let chat_active = last_chat_at
        .map(|t| chrono::Utc::now().signed_duration_since(t).num_minutes() < ladder::ACTIVE_WINDOW_MINUTES)
        .unwrap_or(false);
    match trigger_type {
        "A" => chat_active,
        _ => chat_active || has_work,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn trigger_a_ignores_work_without_recent_chat() {
        assert!(!is_agent_active("A", None, true));
    }

    #[test]
    fn trigger_a_counts_recent_chat() {
        let recent = chrono::Utc::now() - Duration::minutes(5);
        assert!(is_agent_active("A", Some(recent), false));
    }

    #[test]
    fn trigger_b_counts_work_alone() {
        assert!(is_agent_active("chat_or_work", None, true));
    }

    #[test]
    fn stale_chat_outside_the_active_window_does_not_count() {
        let stale = chrono::Utc::now() - Duration::minutes(ladder::ACTIVE_WINDOW_MINUTES + 1);
        assert!(!is_agent_active("A", Some(stale), false));
    }
}
