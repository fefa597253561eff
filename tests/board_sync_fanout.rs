//! Board sync fan-out (SPEC_FULL.md §4.4, scenario-style): two viewers
//! subscribed to the same board see the same task update, and a viewer on
//! a different board sees nothing.

use corelay::board_sync;
use corelay::bus::Bus;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn two_viewers_on_the_same_board_both_see_the_update() {
    let bus = Bus::new();
    let board_id = Uuid::new_v4();
    let task_id = Uuid::new_v4();
    let mut viewer_a = bus.subscribe(&board_sync::channel(board_id));
    let mut viewer_b = bus.subscribe(&board_sync::channel(board_id));

    let changes = json!({"status": "in_progress", "previous_status": "inbox"});
    let actor = json!({"type": "user", "id": "ws-client"});
    board_sync::broadcast_task_updated(&bus, board_id, task_id, &changes, &actor);

    let a = viewer_a.recv().await.unwrap();
    let b = viewer_b.recv().await.unwrap();
    assert_eq!(a, b);
    assert!(a.contains(&task_id.to_string()));
    assert!(a.contains("previous_status"));
    assert!(a.contains("ws-client"));
}

#[tokio::test]
async fn a_viewer_on_a_different_board_sees_nothing() {
    let bus = Bus::new();
    let board_a = Uuid::new_v4();
    let board_b = Uuid::new_v4();
    let mut viewer_b = bus.subscribe(&board_sync::channel(board_b));

    board_sync::broadcast_task_deleted(&bus, board_a, Uuid::new_v4());

    assert!(viewer_b.try_recv().is_err());
}
