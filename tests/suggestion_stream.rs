//! Suggestion fan-out onto the org event bus (SPEC_FULL.md §4.6 step 6):
//! publishing a Suggestion reaches a subscriber on that org's channel and
//! carries the `suggestion.new` wire type.

use chrono::Utc;
use corelay::bus::Bus;
use corelay::events::org_channel;
use corelay::storage::models::Suggestion;
use corelay::suggestions::publish;
use uuid::Uuid;

fn sample_suggestion(organization_id: Uuid) -> Suggestion {
    Suggestion {
        id: Uuid::new_v4(),
        organization_id,
        board_id: Some(Uuid::new_v4()),
        agent_id: None,
        source_event_id: None,
        suggestion_type: "stalled_task".to_string(),
        title: "Task has been idle for 2 hours".to_string(),
        description: None,
        confidence: Some(0.8),
        priority: Some("medium".to_string()),
        status: "pending".to_string(),
        resolved_at: None,
        expires_at: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn publishing_a_suggestion_reaches_the_org_channel() {
    let bus = Bus::new();
    let org_id = Uuid::new_v4();
    let mut rx = bus.subscribe(&org_channel(org_id));

    let suggestion = sample_suggestion(org_id);
    publish(&bus, &suggestion);

    let raw = rx.recv().await.unwrap();
    assert!(raw.contains("suggestion.new"));
    assert!(raw.contains(&suggestion.id.to_string()));
}

#[tokio::test]
async fn a_different_org_does_not_see_the_suggestion() {
    let bus = Bus::new();
    let org_a = Uuid::new_v4();
    let org_b = Uuid::new_v4();
    let mut rx_b = bus.subscribe(&org_channel(org_b));

    publish(&bus, &sample_suggestion(org_a));

    assert!(rx_b.try_recv().is_err());
}
