//! Pure computation for the Heartbeat Governor's per-agent decision
//! (SPEC_FULL.md §4.7): duration-string parsing and the active/backoff
//! ladder step function. No I/O — everything here is unit-testable without
//! a database.

use serde_json::{json, Value};

pub const DEFAULT_ACTIVE_EVERY: &str = "5m";
pub const DEFAULT_LEAD_CAP_EVERY: &str = "1h";
pub const ACTIVE_WINDOW_MINUTES: i64 = 60;

pub fn default_ladder() -> Vec<String> {
    vec!["10m", "30m", "1h", "3h", "6h"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Parse a `^\d+[smhd]$` duration string into seconds. Returns `None` for
/// anything else rather than guessing at a default — a malformed stored
/// value should surface, not silently become zero.
pub fn parse_duration_seconds(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (digits, unit) = raw.split_at(raw.len() - 1);
    let amount: i64 = digits.parse().ok()?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => return None,
    };
    Some(amount * multiplier)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub step: i32,
    pub off: bool,
    pub every: Option<String>,
}

/// §4.7 step 3: `compute_desired_heartbeat`.
///
/// - Active (activity within `ACTIVE_WINDOW_MINUTES`): reset to step 0,
///   `every = active_every`.
/// - Otherwise: advance to `max(1, step + 1)`, looking up `every` from the
///   ladder at `step - 1`; once past the ladder's end the agent goes
///   `off` — unless `lead_cap_every` keeps a board lead alive forever.
pub fn compute_desired_heartbeat(
    is_active: bool,
    current_step: i32,
    ladder: &[String],
    active_every: &str,
    lead_cap_every: &str,
    is_board_lead: bool,
) -> Decision {
    if is_active {
        return Decision {
            step: 0,
            off: false,
            every: Some(active_every.to_string()),
        };
    }

    let next_step = (current_step + 1).max(1);
    let idx = (next_step - 1) as usize;

    match ladder.get(idx) {
        Some(every) => Decision {
            step: next_step,
            off: false,
            every: Some(every.clone()),
        },
        None if is_board_lead => Decision {
            step: next_step,
            off: false,
            every: Some(lead_cap_every.to_string()),
        },
        None => Decision {
            step: next_step,
            off: true,
            every: None,
        },
    }
}

/// Merge `{every, target: "last", includeReasoning: false}` into an
/// existing `heartbeat_config` JSON object, preserving any other keys —
/// §4.7 step 4 (`_merge_heartbeat_config`).
pub fn merge_heartbeat_config(existing: Option<&Value>, every: &str) -> Value {
    let mut merged = match existing {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => json!({}),
    };
    let obj = merged.as_object_mut().expect("constructed as object above");
    obj.insert("every".to_string(), json!(every));
    obj.insert("target".to_string(), json!("last"));
    obj.insert("includeReasoning".to_string(), json!(false));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_duration_seconds("5m"), Some(300));
        assert_eq!(parse_duration_seconds("1h"), Some(3600));
        assert_eq!(parse_duration_seconds("30s"), Some(30));
        assert_eq!(parse_duration_seconds("2d"), Some(172_800));
    }

    #[test]
    fn rejects_malformed_duration() {
        assert_eq!(parse_duration_seconds(""), None);
        assert_eq!(parse_duration_seconds("abc"), None);
        assert_eq!(parse_duration_seconds("10x"), None);
    }

    #[test]
    fn active_resets_to_step_zero() {
        let ladder = default_ladder();
        let decision = compute_desired_heartbeat(true, 3, &ladder, "5m", "1h", false);
        assert_eq!(decision, Decision { step: 0, off: false, every: Some("5m".into()) });
    }

    #[test]
    fn inactive_advances_up_the_ladder() {
        let ladder = default_ladder();
        let decision = compute_desired_heartbeat(false, 0, &ladder, "5m", "1h", false);
        assert_eq!(decision.step, 1);
        assert_eq!(decision.every.as_deref(), Some("10m"));
    }

    #[test]
    fn non_lead_goes_off_past_the_ladder_end() {
        let ladder = default_ladder();
        let decision = compute_desired_heartbeat(false, ladder.len() as i32, &ladder, "5m", "1h", false);
        assert!(decision.off);
        assert_eq!(decision.every, None);
    }

    #[test]
    fn board_lead_is_capped_instead_of_turned_off() {
        let ladder = default_ladder();
        let decision = compute_desired_heartbeat(false, ladder.len() as i32, &ladder, "5m", "1h", true);
        assert!(!decision.off);
        assert_eq!(decision.every.as_deref(), Some("1h"));
    }

    #[test]
    fn merge_preserves_unrelated_keys() {
        let existing = json!({"every": "5m", "target": "last", "includeReasoning": false, "model": "opus"});
        let merged = merge_heartbeat_config(Some(&existing), "30m");
        assert_eq!(merged["every"], json!("30m"));
        assert_eq!(merged["model"], json!("opus"));
    }

    #[test]
    fn merge_with_no_existing_config_builds_fresh_object() {
        let merged = merge_heartbeat_config(None, "10m");
        assert_eq!(merged["every"], json!("10m"));
        assert_eq!(merged["target"], json!("last"));
    }
}
