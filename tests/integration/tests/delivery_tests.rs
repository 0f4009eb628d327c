//! Outbound delivery integration tests against the mock message API
//!
//! Run with: cargo test -p integration-tests --test delivery_tests

use std::sync::Arc;

use bridge_common::{PlatformClient, PlatformConfig};
use bridge_delivery::{Card, DeliveryError, DeliveryQueue, OutboundMessage, SendAction};
use integration_tests::*;
use serde_json::json;

fn queue_for(config: &PlatformConfig) -> DeliveryQueue {
    let platform = PlatformClient::new(config).unwrap();
    DeliveryQueue::spawn(fast_delivery_config(), Arc::new(platform))
}

#[tokio::test]
async fn test_correlated_messages_update_the_first_delivery() {
    let mock = MockPlatform::start().await.unwrap();
    let queue = queue_for(&mock.platform_config());

    let first = queue
        .enqueue(OutboundMessage::kmarkdown("ch-1", "first").with_correlation_id("src-1"))
        .outcome()
        .await
        .unwrap();
    assert_eq!(first.action, SendAction::Create);
    let target = first.target_message_id.clone().unwrap();

    let second = queue
        .enqueue(OutboundMessage::kmarkdown("ch-1", "edited").with_correlation_id("src-1"))
        .outcome()
        .await
        .unwrap();
    assert_eq!(second.action, SendAction::Update);
    assert_eq!(second.target_message_id.as_deref(), Some(target.as_str()));

    let requests = mock.api_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "/api/v3/message/create");
    assert_eq!(requests[1].path, "/api/v3/message/update");
    assert!(requests
        .iter()
        .all(|r| r.authorization.as_deref() == Some("Bot test-token")));

    assert_eq!(requests[0].body["target_id"], "ch-1");
    assert_eq!(requests[0].body["type"], 9);
    assert!(requests[0].body["nonce"].as_str().is_some_and(|n| !n.is_empty()));
    assert_eq!(requests[1].body, json!({"msg_id": target, "content": "edited"}));
}

#[tokio::test]
async fn test_malformed_payload_is_attempted_once() {
    let mock = MockPlatform::start().await.unwrap();
    mock.script_api_response(json!({"code": 40000, "message": "bad payload", "data": {}}));
    let queue = queue_for(&mock.platform_config());

    let failed = queue
        .enqueue(OutboundMessage::text("ch-1", "broken"))
        .outcome()
        .await;
    assert_eq!(
        failed,
        Err(DeliveryError::Rejected {
            code: 40000,
            message: "bad payload".to_string()
        })
    );

    // The queue keeps going
    let next = queue
        .enqueue(OutboundMessage::text("ch-1", "fine"))
        .outcome()
        .await;
    assert!(next.is_ok());
    assert_eq!(mock.api_requests().len(), 2);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let mock = MockPlatform::start().await.unwrap();
    mock.script_api_response(json!({"code": 50000, "message": "busy", "data": {}}));
    mock.script_api_response(json!({"code": 0, "message": "", "data": {"msg_id": "k-late"}}));
    let queue = queue_for(&mock.platform_config());

    let delivered = queue
        .enqueue(OutboundMessage::text("ch-1", "eventually"))
        .outcome()
        .await
        .unwrap();

    assert_eq!(delivered.attempts, 2);
    assert_eq!(delivered.target_message_id.as_deref(), Some("k-late"));

    let requests = mock.api_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body["nonce"], requests[1].body["nonce"]);
}

#[tokio::test]
async fn test_oversized_card_is_truncated_and_resent() {
    let mock = MockPlatform::start().await.unwrap();
    mock.script_api_response(json!({"code": 40012, "message": "content too long", "data": {}}));
    let queue = queue_for(&mock.platform_config());

    let card = Card::new().section("a".repeat(3000));
    let delivered = queue
        .enqueue(OutboundMessage::card("ch-1", vec![card]))
        .outcome()
        .await
        .unwrap();
    assert_eq!(delivered.attempts, 2);

    let requests = mock.api_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].body["type"], 10);

    let resent = requests[1].body["content"].as_str().unwrap();
    let resent_len = resent.len();
    let original_len = requests[0].body["content"].as_str().unwrap().len();
    assert!(resent_len < original_len);
    assert!(resent.contains("(content truncated)"));
}

#[tokio::test]
async fn test_forwarding_mode_wraps_requests() {
    let mock = MockPlatform::start().await.unwrap();
    let config = PlatformConfig {
        forward_url: Some(format!("{}/forward", mock.base_url())),
        ..mock.platform_config()
    };
    let queue = queue_for(&config);

    let delivered = queue
        .enqueue(OutboundMessage::text("ch-1", "via relay"))
        .outcome()
        .await
        .unwrap();
    assert_eq!(delivered.target_message_id.as_deref(), Some("forwarded"));

    let forwarded = mock.forwarded();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0]["method"], "post");
    assert_eq!(
        forwarded[0]["url"],
        format!("{}/message/create", mock.api_base_url())
    );
    assert_eq!(forwarded[0]["headers"]["Authorization"], "Bot test-token");
    assert_eq!(forwarded[0]["content"], "via relay");
    assert!(mock.api_requests().is_empty());
}
