//! The Rule Engine (SPEC_FULL.md §4.6): SystemEvents drive a cooldown-gated
//! trigger → condition → action pipeline that writes Suggestion rows.
//! Structurally this generalizes the old config-driven automation engine
//! (trigger event → matching rules → async action dispatch) to org-scoped
//! rules loaded from storage instead of a static config file, and to a
//! richer AND-tree condition language instead of single key=value strings.

pub mod admin;
pub mod conditions;
pub mod engine;

pub use engine::{RuleEngine, TriggerEvent};
