//! Message Router delivery fallback (SPEC_FULL.md §4.3): when the
//! destination socket is registered on this instance the envelope goes
//! straight to it; otherwise it is published to that connection's route
//! channel for another instance to pick up.

use corelay::bus::Bus;
use corelay::pool::ConnectionPool;
use corelay::protocol::{Envelope, MSG_CHAT_REPLY};
use corelay::router::{gateway_route_channel, user_route_channel};
use uuid::Uuid;

#[tokio::test]
async fn an_unregistered_user_falls_back_to_the_route_channel() {
    let bus = Bus::new();
    let user_pool: ConnectionPool<Uuid> = ConnectionPool::new();
    let user_id = Uuid::new_v4();

    assert!(!user_pool.connected(&user_id).await);
    let mut route = bus.subscribe(&user_route_channel(user_id));

    let envelope = Envelope::new(MSG_CHAT_REPLY).with_payload(serde_json::json!({"content": "hi"}));
    bus.publish_json(&user_route_channel(user_id), &serde_json::to_value(&envelope).unwrap());

    let raw = route.recv().await.unwrap();
    assert!(raw.contains(MSG_CHAT_REPLY));
}

#[tokio::test]
async fn gateway_and_user_route_channels_never_collide() {
    let id = Uuid::new_v4();
    assert_ne!(user_route_channel(id), gateway_route_channel(id));
}
