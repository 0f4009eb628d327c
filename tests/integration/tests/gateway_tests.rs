//! Gateway session integration tests
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use bridge_gateway::connection::{ConnectionState, FileSessionStore, Session, SessionStore};
use integration_tests::*;
use serde_json::json;

fn query_value<'a>(record: &'a ConnectionRecord, key: &str) -> Option<&'a str> {
    record.query.get(key).map(String::as_str)
}

#[tokio::test]
async fn test_fresh_handshake_dispatches_each_frame_once() {
    let mock = MockPlatform::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("client.json");

    mock.script_connection(
        ConnectionScript::new()
            .frame(hello("s-fresh"))
            .frame(chat_message(1, "m1", "one"))
            .frame(chat_message(2, "m2", "two"))
            .frame(chat_message(2, "m2", "two again"))
            .frame(chat_message(1, "m1", "one again")),
    );

    let handler = RecordingHandler::new();
    let gateway = spawn_gateway(&mock, fast_gateway_config(&session_file), handler.clone())
        .await
        .unwrap();

    assert!(eventually(WAIT, || handler.frames().len() >= 2).await);
    // Give the replays time to be (not) dispatched
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handler.sequences(), vec![Some(1), Some(2)]);
    assert_eq!(handler.frames()[1].body["content"], "two");

    let connections = mock.connections();
    assert_eq!(connections.len(), 1);
    assert_eq!(query_value(&connections[0], "compress"), Some("1"));
    assert_eq!(query_value(&connections[0], "sn"), Some("0"));
    assert_eq!(query_value(&connections[0], "sessionId"), None);
    assert_eq!(query_value(&connections[0], "resume"), None);

    assert_eq!(mock.discovery_calls(), vec![Some("Bot test-token".to_string())]);

    let status = gateway.handle.state();
    assert_eq!(status.state, ConnectionState::Open);
    assert_eq!(status.session, Session::new("s-fresh", 2));
    assert_eq!(gateway.store.load().await, Session::new("s-fresh", 2));

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_resume_from_persisted_session() {
    let mock = MockPlatform::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("client.json");

    FileSessionStore::new(&session_file)
        .save(&Session::new("s-old", 7))
        .await
        .unwrap();

    mock.script_connection(
        ConnectionScript::new()
            .frame(resume_ack("s-new"))
            .frame(chat_message(7, "m7", "already seen"))
            .frame(chat_message(8, "m8", "missed while away")),
    );

    let handler = RecordingHandler::new();
    let gateway = spawn_gateway(&mock, fast_gateway_config(&session_file), handler.clone())
        .await
        .unwrap();

    assert!(eventually(WAIT, || !handler.frames().is_empty()).await);
    assert!(eventually(WAIT, || gateway.handle.state().session == Session::new("s-new", 8)).await);
    assert_eq!(handler.sequences(), vec![Some(8)]);

    let connections = mock.connections();
    assert_eq!(query_value(&connections[0], "sessionId"), Some("s-old"));
    assert_eq!(query_value(&connections[0], "resume"), Some("1"));
    assert_eq!(query_value(&connections[0], "sn"), Some("7"));
    assert_eq!(connections[0].received.first(), Some(&json!({"s": 4, "sn": 7})));

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_server_reconnect_starts_a_fresh_session() {
    let mock = MockPlatform::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("client.json");

    mock.script_connection(
        ConnectionScript::new()
            .frame(hello("s-first"))
            .frame(chat_message(1, "m1", "hello"))
            .frame(reconnect()),
    );

    let handler = RecordingHandler::new();
    let gateway = spawn_gateway(&mock, fast_gateway_config(&session_file), handler.clone())
        .await
        .unwrap();

    assert!(eventually(WAIT, || mock.connections().len() >= 2).await);
    assert!(eventually(WAIT, || gateway.handle.state().session.session_id == "mock-session-1").await);

    let second = &mock.connections()[1];
    assert_eq!(query_value(second, "sn"), Some("0"));
    assert_eq!(query_value(second, "sessionId"), None);
    assert_eq!(query_value(second, "resume"), None);
    assert!(second.received.iter().all(|frame| frame["s"] != 4));

    assert_eq!(handler.sequences(), vec![Some(1)]);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_rejected_handshake_reconnects_fresh() {
    let mock = MockPlatform::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("client.json");

    FileSessionStore::new(&session_file)
        .save(&Session::new("s-expired", 4))
        .await
        .unwrap();

    mock.script_connection(ConnectionScript::new().frame(hello_rejected(40103)));

    let handler = RecordingHandler::new();
    let gateway = spawn_gateway(&mock, fast_gateway_config(&session_file), handler.clone())
        .await
        .unwrap();

    assert!(eventually(WAIT, || gateway.handle.state().session.session_id == "mock-session-1").await);

    let connections = mock.connections();
    assert_eq!(query_value(&connections[0], "sessionId"), Some("s-expired"));
    assert_eq!(query_value(&connections[1], "sessionId"), None);
    assert_eq!(query_value(&connections[1], "sn"), Some("0"));
    assert_eq!(mock.discovery_calls().len(), 2);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_unanswered_heartbeats_force_one_reconnect() {
    let mock = MockPlatform::start().await.unwrap();
    mock.set_auto_pong(false);
    let dir = tempfile::tempdir().unwrap();

    let config = bridge_common::GatewayConfig {
        heartbeat_interval: Duration::from_millis(100),
        heartbeat_retry_delay: Duration::from_millis(30),
        heartbeat_max_retries: 2,
        reconnect_delay: Duration::from_millis(500),
        ..fast_gateway_config(&dir.path().join("client.json"))
    };

    let handler = RecordingHandler::new();
    let gateway = spawn_gateway(&mock, config, handler.clone()).await.unwrap();

    assert!(eventually(WAIT, || mock.connections().len() >= 2).await);

    let first = &mock.connections()[0];
    let pings: Vec<_> = first.received.iter().filter(|f| f["s"] == 2).collect();
    assert_eq!(pings.len(), 3);
    assert!(pings.iter().all(|p| p["sn"] == 0));

    // The session from the first hello was dropped
    assert_eq!(query_value(&mock.connections()[1], "sessionId"), None);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_answered_heartbeats_keep_the_connection() {
    let mock = MockPlatform::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let config = bridge_common::GatewayConfig {
        heartbeat_interval: Duration::from_millis(50),
        heartbeat_retry_delay: Duration::from_millis(20),
        ..fast_gateway_config(&dir.path().join("client.json"))
    };

    let handler = RecordingHandler::new();
    let gateway = spawn_gateway(&mock, config, handler.clone()).await.unwrap();

    assert!(eventually(WAIT, || {
        mock.connections()
            .first()
            .is_some_and(|c| c.received.iter().filter(|f| f["s"] == 2).count() >= 5)
    })
    .await);
    assert_eq!(mock.connections().len(), 1);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_request_drops_the_session() {
    let mock = MockPlatform::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let handler = RecordingHandler::new();
    let gateway = spawn_gateway(
        &mock,
        fast_gateway_config(&dir.path().join("client.json")),
        handler.clone(),
    )
    .await
    .unwrap();

    assert!(eventually(WAIT, || gateway.handle.state().session.session_id == "mock-session-0").await);
    gateway.handle.request_reconnect();
    assert!(eventually(WAIT, || gateway.handle.state().session.session_id == "mock-session-1").await);
    assert_eq!(query_value(&mock.connections()[1], "sessionId"), None);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_request_during_reconnect_delay_is_merged() {
    let mock = MockPlatform::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let config = bridge_common::GatewayConfig {
        reconnect_delay: Duration::from_millis(400),
        ..fast_gateway_config(&dir.path().join("client.json"))
    };

    let handler = RecordingHandler::new();
    let gateway = spawn_gateway(&mock, config, handler.clone()).await.unwrap();

    assert!(eventually(WAIT, || gateway.handle.state().session.session_id == "mock-session-0").await);
    gateway.handle.request_reconnect();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_ne!(gateway.handle.state().state, ConnectionState::Open);
    gateway.handle.request_reconnect();

    assert!(eventually(WAIT, || gateway.handle.state().session.session_id == "mock-session-1").await);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(mock.connections().len(), 2);
    assert_eq!(gateway.handle.state().state, ConnectionState::Open);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_keeps_the_session() {
    let mock = MockPlatform::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("client.json");

    mock.script_connection(
        ConnectionScript::new()
            .frame(hello("s-keep"))
            .frame(chat_message(3, "m3", "last words")),
    );

    let handler = RecordingHandler::new();
    let gateway = spawn_gateway(&mock, fast_gateway_config(&session_file), handler.clone())
        .await
        .unwrap();

    assert!(eventually(WAIT, || !handler.frames().is_empty()).await);
    let handle = gateway.handle.clone();
    gateway.stop().await.unwrap();

    assert_eq!(handle.state().state, ConnectionState::Disconnected);
    assert_eq!(
        FileSessionStore::new(&session_file).load().await,
        Session::new("s-keep", 3)
    );
    assert_eq!(mock.connections().len(), 1);
}

#[tokio::test]
async fn test_transport_close_triggers_reconnect() {
    let mock = MockPlatform::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    mock.script_connection(ConnectionScript::new().frame(hello("s-short")).close());

    let handler = RecordingHandler::new();
    let gateway = spawn_gateway(
        &mock,
        fast_gateway_config(&dir.path().join("client.json")),
        handler.clone(),
    )
    .await
    .unwrap();

    assert!(eventually(WAIT, || gateway.handle.state().session.session_id == "mock-session-1").await);
    assert_eq!(query_value(&mock.connections()[1], "sessionId"), None);

    gateway.stop().await.unwrap();
}
