//! Integration tests for the Stripe webhook route.
//!
//! Drives the full router over the in-memory store: signature checks,
//! classification into audit entries, and the HTTP answers for each
//! failure mode.

use std::time::Duration;

use anyhow::Result;
use axum::http::{header::ALLOW, Method, StatusCode};
use carelog_testing::{
    http::{empty_request, response_json, signed_webhook_request, webhook_request, WEBHOOK_PATH},
    Clock, PaymentEventBuilder, TestEnv, WEBHOOK_SECRET,
};
use serde_json::json;

#[tokio::test]
async fn succeeded_event_is_recorded_in_major_units() -> Result<()> {
    let env = TestEnv::new();
    let event = PaymentEventBuilder::succeeded().object_id("pi_123").amount(5000).currency("usd");

    let response = env.post_webhook(&event.to_bytes()).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await?, json!({"received": true}));

    let entries = env.store.snapshot().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "payment_succeeded");
    assert_eq!(
        entries[0].details_json()?,
        json!({"object_id": "pi_123", "amount": "50.00", "currency": "usd"})
    );
    assert_eq!(entries[0].source_event_id.as_deref(), Some(event.id()));
    assert!(entries[0].user_name.is_none());
    Ok(())
}

#[tokio::test]
async fn correlation_metadata_is_kept() -> Result<()> {
    let env = TestEnv::new();
    let event = PaymentEventBuilder::succeeded()
        .amount(12_550)
        .metadata("appointment_id", "apt_981")
        .metadata("patient_ref", "p-77");

    env.post_webhook(&event.to_bytes()).await?;

    let details = env.store.snapshot().await[0].details_json()?;
    assert_eq!(details["amount"], json!("125.50"));
    assert_eq!(details["metadata"], json!({"appointment_id": "apt_981", "patient_ref": "p-77"}));
    Ok(())
}

#[tokio::test]
async fn failed_and_canceled_events_are_recorded() -> Result<()> {
    let env = TestEnv::new();

    let failed =
        PaymentEventBuilder::failed().object_id("pi_f").amount(900).failure_message("Card declined");
    let canceled = PaymentEventBuilder::canceled().object_id("pi_c").amount(100);

    assert_eq!(env.post_webhook(&failed.to_bytes()).await?.status(), StatusCode::OK);
    assert_eq!(env.post_webhook(&canceled.to_bytes()).await?.status(), StatusCode::OK);

    let entries = env.store.snapshot().await;
    assert_eq!(entries[0].action, "payment_failed");
    assert_eq!(
        entries[0].details_json()?,
        json!({"object_id": "pi_f", "amount": "9.00", "failure_reason": "Card declined"})
    );
    assert_eq!(entries[1].action, "payment_canceled");
    assert_eq!(entries[1].details_json()?, json!({"object_id": "pi_c"}));
    Ok(())
}

#[tokio::test]
async fn unrecognized_event_is_acknowledged_without_entry() -> Result<()> {
    let env = TestEnv::new();
    let event = PaymentEventBuilder::new("charge.refunded");

    let response = env.post_webhook(&event.to_bytes()).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await?, json!({"received": true}));
    assert!(env.store.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn bad_signature_yields_400_and_no_entry() -> Result<()> {
    let env = TestEnv::new();
    let body = br#"{"type":"payment_intent.succeeded"}"#;

    let response = env.send(webhook_request(body, Some("bad_sig"))).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = response_json(response).await?["error"].as_str().unwrap_or_default().to_string();
    assert!(error.starts_with("Webhook Error: "), "unexpected error: {error}");
    assert!(env.store.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn missing_signature_header_is_rejected() -> Result<()> {
    let env = TestEnv::new();
    let event = PaymentEventBuilder::succeeded();

    let response = env.send(webhook_request(&event.to_bytes(), None)).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(env.store.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn signature_from_other_secret_is_rejected() -> Result<()> {
    let env = TestEnv::new();
    let body = PaymentEventBuilder::succeeded().to_bytes();
    let request = signed_webhook_request(&body, "whsec_not_ours", env.clock.unix_timestamp());

    let response = env.send(request).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response_json(response).await?,
        json!({"error": "Webhook Error: No signatures found matching the expected signature for payload"})
    );
    assert!(env.store.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn stale_signature_is_rejected() -> Result<()> {
    let env = TestEnv::new();
    let body = PaymentEventBuilder::succeeded().to_bytes();
    let request = signed_webhook_request(&body, WEBHOOK_SECRET, env.clock.unix_timestamp() - 600);

    let response = env.send(request).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response_json(response).await?,
        json!({"error": "Webhook Error: Timestamp outside the tolerance zone"})
    );
    Ok(())
}

#[tokio::test]
async fn zero_tolerance_accepts_old_signatures() -> Result<()> {
    let env = TestEnv::builder().tolerance(Duration::ZERO).build();
    let body = PaymentEventBuilder::canceled().to_bytes();
    let request = signed_webhook_request(&body, WEBHOOK_SECRET, env.clock.unix_timestamp() - 86_400);

    assert_eq!(env.send(request).await?.status(), StatusCode::OK);
    assert_eq!(env.store.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn authentic_but_malformed_body_is_400() -> Result<()> {
    let env = TestEnv::new();

    let response = env.post_webhook(br#"{"hello":"world"}"#).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response_json(response).await?,
        json!({"error": "Webhook Error: malformed event payload"})
    );
    Ok(())
}

#[tokio::test]
async fn recognized_event_without_object_id_is_400() -> Result<()> {
    let env = TestEnv::new();
    let event = PaymentEventBuilder::succeeded().without("id");

    let response = env.post_webhook(&event.to_bytes()).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(env.store.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn replays_are_recorded_by_default() -> Result<()> {
    let env = TestEnv::new();
    let body = PaymentEventBuilder::succeeded().event_id("evt_replayed").to_bytes();

    env.post_webhook(&body).await?;
    env.post_webhook(&body).await?;

    assert_eq!(env.store.len().await, 2);
    Ok(())
}

#[tokio::test]
async fn replays_are_acknowledged_once_with_idempotency() -> Result<()> {
    let env = TestEnv::builder().idempotency(true).build();
    let body = PaymentEventBuilder::succeeded().event_id("evt_replayed").to_bytes();

    let first = env.post_webhook(&body).await?;
    let second = env.post_webhook(&body).await?;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(response_json(second).await?, json!({"received": true}));
    assert_eq!(env.store.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn store_failure_is_500() -> Result<()> {
    let env = TestEnv::new();
    env.store.set_unavailable(true);

    let response = env.post_webhook(&PaymentEventBuilder::succeeded().to_bytes()).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response_json(response).await?, json!({"error": "Storage unavailable"}));
    Ok(())
}

#[tokio::test]
async fn non_post_methods_are_405() -> Result<()> {
    let env = TestEnv::new();

    for method in [Method::GET, Method::PUT, Method::DELETE] {
        let response = env.send(empty_request(method.clone(), WEBHOOK_PATH)).await?;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
        assert_eq!(response.headers()[ALLOW], "POST");
        assert_eq!(response_json(response).await?, json!({"error": "Method Not Allowed"}));
    }
    Ok(())
}

#[tokio::test]
async fn oversized_body_is_rejected() -> Result<()> {
    let env = TestEnv::new();
    let body = vec![b'x'; 2 * 1024 * 1024];

    let response = env.post_webhook(&body).await?;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(env.store.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn responses_carry_request_id() -> Result<()> {
    let env = TestEnv::new();

    let response = env.post_webhook(&PaymentEventBuilder::succeeded().to_bytes()).await?;

    assert!(response.headers().contains_key("x-request-id"));
    Ok(())
}
