//! End-to-end scenario tests driven against a real `corelayd` server bound
//! to an ephemeral port, the way the original Python test suite's S1-S6
//! scenarios exercised the live relay. These need a reachable Postgres
//! instance (`COREL_DATABASE_URL`) and are skipped otherwise — there is no
//! ephemeral-file equivalent for Postgres the way there is for SQLite.

use std::sync::Arc;

use corelay::config::Config;
use corelay::AppContext;
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

fn test_config(port: u16, database_url: String) -> Config {
    Config {
        port,
        database_url,
        log: "error".to_string(),
        log_file: None,
        end_user_jwt_secret: "test-end-user-secret".to_string(),
        operator_shared_secret: "test-operator-secret".to_string(),
        gateway_heartbeat_interval_seconds: 60,
        governor_interval_seconds: 300,
    }
}

async fn find_free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Starts a real server on an ephemeral port and returns its base HTTP/WS
/// origin. The spawned task is detached — the process exiting at the end of
/// the test run tears it down.
async fn spawn_server(database_url: String) -> String {
    let port = find_free_port().await;
    let config = test_config(port, database_url);
    let ctx = AppContext::new(config).await.expect("AppContext::new against a reachable Postgres");
    let router = corelay::build_router(Arc::clone(&ctx));
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    // Give the accept loop a moment to start taking connections.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    format!("127.0.0.1:{port}")
}

macro_rules! require_database_url {
    () => {
        match std::env::var("COREL_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("skipping: COREL_DATABASE_URL not set");
                return;
            }
        }
    };
}

#[tokio::test]
async fn health_endpoint_reports_ok_against_a_live_database() {
    let database_url = require_database_url!();
    let addr = spawn_server(database_url).await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn board_sync_without_a_token_is_closed_unauthenticated() {
    let database_url = require_database_url!();
    let addr = spawn_server(database_url).await;

    let board_id = uuid::Uuid::new_v4();
    let url = format!("ws://{addr}/ws/board/{board_id}/sync");
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    loop {
        match ws.next().await {
            Some(Ok(Message::Close(Some(CloseFrame { code, .. })))) => {
                assert_eq!(u16::from(code), 4001);
                return;
            }
            Some(Ok(Message::Close(None))) => panic!("connection closed without a close frame"),
            Some(Ok(_)) => continue,
            Some(Err(e)) => panic!("websocket error while waiting for close frame: {e}"),
            None => panic!("connection ended before a close frame arrived"),
        }
    }
}
