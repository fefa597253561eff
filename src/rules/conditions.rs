//! Evaluates a ProactiveRule's `conditions` JSON against a trigger event's
//! context object. The shape is a flat AND-list of leaf comparisons — there
//! is no OR/tree concept:
//!
//! ```json
//! { "rules": [
//!     { "field": "task.priority", "op": "eq", "value": "high" },
//!     { "field": "task.age_minutes", "op": "gt", "value": 30 }
//! ]}
//! ```
//!
//! A missing or empty `rules` list always matches, mirroring the prior
//! engine's "nothing to check" stance — a rule with no conditions should not
//! silently stop firing. Anything a leaf can't make sense of — a missing
//! field, an unrecognized operator — fails closed.

use serde_json::Value;
use tracing::warn;

pub fn evaluate(conditions: &Value, context: &Value) -> bool {
    let rules = match conditions {
        Value::Null => return true,
        Value::Object(map) => map.get("rules").and_then(Value::as_array),
        _ => return true,
    };
    match rules {
        Some(rules) => rules.iter().all(|leaf| evaluate_leaf(leaf, context)),
        None => true,
    }
}

fn evaluate_leaf(leaf: &Value, context: &Value) -> bool {
    let field = leaf.get("field").and_then(Value::as_str).unwrap_or("");
    let op = leaf.get("op").and_then(Value::as_str).unwrap_or("eq");
    let expected = leaf.get("value").cloned().unwrap_or(Value::Null);
    let actual = resolve_field(context, field);

    match op {
        "eq" => actual.as_ref() == Some(&expected),
        "ne" => actual.as_ref() != Some(&expected),
        "gt" => compare(&actual, &expected, |a, b| a > b),
        "lt" => compare(&actual, &expected, |a, b| a < b),
        "gte" => compare(&actual, &expected, |a, b| a >= b),
        "lte" => compare(&actual, &expected, |a, b| a <= b),
        "in" => expected
            .as_array()
            .map(|arr| actual.as_ref().is_some_and(|a| arr.contains(a)))
            .unwrap_or(false),
        "contains" => match (&actual, expected.as_str()) {
            (Some(Value::String(s)), Some(needle)) => s.contains(needle),
            _ => false,
        },
        other => {
            warn!(op = other, "rule engine: unrecognized operator, failing closed");
            false
        }
    }
}

fn resolve_field(context: &Value, dotted_path: &str) -> Option<Value> {
    let mut cur = context;
    for part in dotted_path.split('.') {
        cur = cur.get(part)?;
    }
    Some(cur.clone())
}

fn compare(actual: &Option<Value>, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_ref().and_then(Value::as_f64), expected.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_or_empty_rules_always_match() {
        assert!(evaluate(&Value::Null, &json!({})));
        assert!(evaluate(&json!({}), &json!({"task": {"priority": "low"}})));
        assert!(evaluate(&json!({"rules": []}), &json!({})));
    }

    #[test]
    fn every_leaf_in_rules_must_match() {
        let conditions = json!({"rules": [
            {"field": "task.priority", "op": "eq", "value": "high"},
            {"field": "task.age_minutes", "op": "gt", "value": 30},
        ]});
        let matching = json!({"task": {"priority": "high", "age_minutes": 45}});
        let non_matching = json!({"task": {"priority": "high", "age_minutes": 10}});
        assert!(evaluate(&conditions, &matching));
        assert!(!evaluate(&conditions, &non_matching));
    }

    #[test]
    fn in_checks_membership() {
        let conditions = json!({"rules": [{"field": "status", "op": "in", "value": ["blocked", "stalled"]}]});
        assert!(evaluate(&conditions, &json!({"status": "blocked"})));
        assert!(!evaluate(&conditions, &json!({"status": "done"})));
    }

    #[test]
    fn missing_field_never_matches_a_comparison() {
        let conditions = json!({"rules": [{"field": "missing", "op": "eq", "value": "x"}]});
        assert!(!evaluate(&conditions, &json!({})));
    }

    #[test]
    fn unrecognized_operator_fails_closed() {
        let conditions = json!({"rules": [{"field": "status", "op": "matches_regex", "value": "x"}]});
        assert!(!evaluate(&conditions, &json!({"status": "x"})));
    }
}
