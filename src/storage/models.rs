//! Row structs for every entity in SPEC_FULL.md §3. Mirrors the daemon's
//! existing `#[derive(sqlx::FromRow)]` row-struct convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Board {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub auto_heartbeat_governor_enabled: bool,
    pub auto_heartbeat_governor_run_interval_seconds: i32,
    pub auto_heartbeat_governor_ladder: Value,
    pub auto_heartbeat_governor_lead_cap_every: String,
    pub auto_heartbeat_governor_activity_trigger_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    /// The ladder stored as JSON array of duration strings, per §4.7.
    pub fn ladder(&self) -> Vec<String> {
        self.auto_heartbeat_governor_ladder
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Gateway {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub url: Option<String>,
    pub workspace_root: Option<String>,
    pub token_hash: String,
    pub status: String,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Agent {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub gateway_id: Uuid,
    pub board_id: Option<Uuid>,
    pub workspace_path: String,
    pub is_board_lead: bool,
    pub token_hash: String,
    pub auto_heartbeat_enabled: bool,
    pub auto_heartbeat_step: i32,
    pub auto_heartbeat_off: bool,
    pub auto_heartbeat_last_active_at: Option<DateTime<Utc>>,
    pub heartbeat_config: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn heartbeat_every(&self) -> Option<String> {
        self.heartbeat_config
            .as_ref()
            .and_then(|c| c.get("every"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct EndUser {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct EndUserAssignment {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub end_user_id: Uuid,
    pub agent_id: Uuid,
    pub board_id: Option<Uuid>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub agent_id: Uuid,
    pub gateway_id: Uuid,
    pub session_key: String,
    pub status: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Builds the canonical `h5:{user_id}:{agent_id}` session key (§3).
pub fn session_key(user_id: Uuid, agent_id: Uuid) -> String {
    format!("h5:{user_id}:{agent_id}")
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct SystemEvent {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub board_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ProactiveRule {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub board_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub trigger_event: String,
    pub conditions: Value,
    pub action_type: String,
    pub action_config: Value,
    pub is_enabled: bool,
    pub is_builtin: bool,
    pub cooldown_seconds: i32,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Suggestion {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub board_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub source_event_id: Option<Uuid>,
    pub suggestion_type: String,
    pub title: String,
    pub description: Option<String>,
    pub confidence: Option<f32>,
    pub priority: Option<String>,
    pub status: String,
    pub resolved_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub status: String,
    pub priority: Option<String>,
    pub assigned_agent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
