//! Client-level behaviour: connection retries, authorization and single sends.

mod common;

use apns_push::connection::ConnectionManager;
use apns_push::{
    ApnsClient, Authentication, CredentialProvider, DeliveryOptions, DispatchError, Notification,
    NotificationError, Outcome, Payload, Priority, Reason,
};
use common::{tokens, ScriptedTransport};
use p256::ecdsa::SigningKey;
use rand_core::OsRng;

fn provider() -> CredentialProvider {
    CredentialProvider::new("TEAM123456", "KEY1234567", SigningKey::random(&mut OsRng))
}

fn hello() -> Payload {
    Payload::new().alert("hi")
}

fn token_client(transport: ScriptedTransport) -> ApnsClient<ScriptedTransport> {
    ApnsClient::new(transport, Authentication::Token(provider()))
}

#[tokio::test(start_paused = true)]
async fn test_connects_after_two_failures() {
    let transport = ScriptedTransport::new(10).fail_connects(2);
    let mut client = ApnsClient::new(transport, Authentication::None);

    let results = client
        .send_notification_batch(tokens(3), &hello(), &DeliveryOptions::default())
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(client.transport().connect_attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_three_failures() {
    let transport = ScriptedTransport::new(10).fail_connects(3);
    let mut client = ApnsClient::new(transport, Authentication::None);

    let result = client
        .send_notification_batch(tokens(3), &hello(), &DeliveryOptions::default())
        .await;

    match result {
        Err(DispatchError::Connection(err)) => assert_eq!(err.attempts, 3),
        other => panic!("expected connection failure, got {other:?}"),
    }
    assert_eq!(client.transport().connect_attempts(), 3);
    assert!(client.transport().requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_custom_retry_budget() {
    let transport = ScriptedTransport::new(10).fail_connects(4);
    let client = ApnsClient::new(transport, Authentication::None)
        .with_connection_manager(ConnectionManager::with_max_attempts(5));

    client.connect().await.unwrap();
    assert_eq!(client.transport().connect_attempts(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_existing_connection_is_reused() {
    let transport = ScriptedTransport::new(10).connected();
    let mut client = ApnsClient::new(transport, Authentication::None);

    for _ in 0..2 {
        client
            .send_notification_batch(tokens(2), &Payload::new(), &DeliveryOptions::default())
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
    }
    assert_eq!(client.transport().connect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_bearer_token_and_delivery_headers() {
    let mut client = token_client(ScriptedTransport::new(10));
    let options = DeliveryOptions {
        priority: Priority::Delayed,
        topic: Some("com.example.app".to_string()),
        expiration: Some(1_700_000_000),
    };

    client
        .send_notification_batch(tokens(2), &Payload::new().alert("hi"), &options)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    let requests = client.transport().requests();
    assert_eq!(requests.len(), 2);
    let headers = &requests[0].headers;
    let authorization = headers["authorization"].to_str().unwrap();
    assert!(authorization.starts_with("bearer "));
    assert_eq!(authorization.trim_start_matches("bearer ").split('.').count(), 3);
    assert_eq!(headers["apns-priority"], "5");
    assert_eq!(headers["apns-topic"], "com.example.app");
    assert_eq!(headers["apns-expiration"], "1700000000");
    assert_eq!(requests[1].headers, requests[0].headers);
}

#[tokio::test(start_paused = true)]
async fn test_expired_provider_token_marks_credential() {
    let transport =
        ScriptedTransport::new(10).respond("t1", 403, r#"{"reason":"ExpiredProviderToken"}"#);
    let mut client = token_client(transport);

    let results = client
        .send_notification_batch(tokens(3), &hello(), &DeliveryOptions::default())
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(results["t1"].reason(), Some(Reason::ExpiredProviderToken));
    assert!(client.credentials().unwrap().is_expired());

    // The next batch signs a fresh token.
    client
        .send_notification_batch(tokens(1), &Payload::new(), &DeliveryOptions::default())
        .await
        .unwrap();
    assert!(!client.credentials().unwrap().is_expired());
}

#[tokio::test(start_paused = true)]
async fn test_send_notification_success() {
    let mut client = token_client(ScriptedTransport::new(10));
    let notification = Notification::new("abc123", Payload::new().alert("hi"));

    client
        .send_notification(&notification, &DeliveryOptions::default())
        .await
        .unwrap();
    assert_eq!(client.transport().requests()[0].path, "/3/device/abc123");
}

#[tokio::test(start_paused = true)]
async fn test_send_notification_rejected() {
    let transport = ScriptedTransport::new(10).respond("dead", 410, r#"{"reason":"Unregistered"}"#);
    let mut client = token_client(transport);
    let notification = Notification::new("dead", Payload::new().alert("hi"));

    match client.send_notification(&notification, &DeliveryOptions::default()).await {
        Err(NotificationError::Rejected(reason)) => {
            assert_eq!(reason, Reason::Unregistered);
            assert!(reason.is_token_invalid());
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_outcome_reason_for_unknown_string() {
    let transport = ScriptedTransport::new(10).respond("t0", 400, r#"{"reason":"SomethingNew"}"#);
    let mut client = ApnsClient::new(transport, Authentication::None);

    let results = client
        .send_notification_batch(tokens(1), &Payload::new(), &DeliveryOptions::default())
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(results["t0"], Outcome::Failure("SomethingNew".to_string()));
    assert_eq!(results["t0"].reason(), Some(Reason::Other("SomethingNew".to_string())));
}

#[test]
fn test_debug_hides_secrets() {
    let client = token_client(ScriptedTransport::new(10));
    assert_eq!(format!("{client:?}"), "ApnsClient: KEY1234567");

    let anonymous = ApnsClient::new(ScriptedTransport::new(10), Authentication::None);
    assert_eq!(format!("{anonymous:?}"), "ApnsClient: unauthenticated");
}
