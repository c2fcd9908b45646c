//! Integration tests for the audit read and write routes.

use std::time::Duration;

use anyhow::Result;
use axum::http::{
    header::{ALLOW, AUTHORIZATION},
    HeaderValue, Method, StatusCode,
};
use carelog_testing::{
    http::{
        audit_list_request, audit_record_request, empty_request, raw_audit_record_request,
        response_json, AUDIT_PATH,
    },
    tokens::{bearer_token, expired_token, sign_json, token_signed_with, token_with_issuer},
    TestEnv, JWT_SECRET,
};
use serde_json::{json, Value};

fn actions(body: &Value) -> Vec<String> {
    body.as_array()
        .map(|entries| {
            entries.iter().filter_map(|e| e["action"].as_str().map(String::from)).collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn list_returns_newest_hundred_of_one_fifty() -> Result<()> {
    let env = TestEnv::new();
    env.seed_entries(150).await?;

    let response = env.send(audit_list_request(Some(&bearer_token("dr.hale")))).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await?;
    let actions = actions(&body);
    assert_eq!(actions.len(), 100);
    assert_eq!(actions.first().map(String::as_str), Some("seeded_149"));
    assert_eq!(actions.last().map(String::as_str), Some("seeded_50"));

    let timestamps: Vec<&str> =
        body.as_array().into_iter().flatten().filter_map(|e| e["timestamp"].as_str()).collect();
    assert!(timestamps.windows(2).all(|pair| pair[0] > pair[1]));
    Ok(())
}

#[tokio::test]
async fn entry_wire_format() -> Result<()> {
    let env = TestEnv::new();
    env.state.recorder.record("export", &json!({"rows": 12}), Some("dr.hale")).await?;

    let response = env.send(audit_list_request(Some(&bearer_token("dr.hale")))).await?;
    let body = response_json(response).await?;

    insta::assert_json_snapshot!(body, {
        "[].timestamp" => "[timestamp]",
    }, @r#"
    [
      {
        "id": 1,
        "action": "export",
        "details": "{\"rows\":12}",
        "user_name": "dr.hale",
        "timestamp": "[timestamp]"
      }
    ]
    "#);
    Ok(())
}

#[tokio::test]
async fn missing_token_is_401_without_store_access() -> Result<()> {
    let env = TestEnv::new();
    env.seed_entries(3).await?;

    let response = env.send(audit_list_request(None)).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response_json(response).await?, json!({"error": "No token"}));
    assert_eq!(env.store.read_count(), 0);
    Ok(())
}

#[tokio::test]
async fn invalid_tokens_are_401_without_store_access() -> Result<()> {
    let env = TestEnv::new();

    for token in [
        "not-a-jwt".to_string(),
        token_signed_with("someone-elses-secret", carelog_testing::tokens::claims("x", u64::MAX)),
        expired_token("dr.hale"),
    ] {
        let response = env.send(audit_list_request(Some(&token))).await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response_json(response).await?, json!({"error": "Invalid token"}));
    }
    assert_eq!(env.store.read_count(), 0);
    Ok(())
}

#[tokio::test]
async fn any_correctly_signed_token_may_read() -> Result<()> {
    let env = TestEnv::new();
    env.seed_entries(2).await?;
    let exp = jsonwebtoken::get_current_timestamp() + 600;

    for claims in [json!({"userId": 7, "exp": exp}), json!({"sub": "dr.hale"}), json!({})] {
        let token = sign_json(JWT_SECRET, &claims);
        let response = env.send(audit_list_request(Some(&token))).await?;

        assert_eq!(response.status(), StatusCode::OK, "{claims}");
        assert_eq!(actions(&response_json(response).await?), ["seeded_1", "seeded_0"]);
    }
    Ok(())
}

#[tokio::test]
async fn claimless_token_with_foreign_secret_is_401() -> Result<()> {
    let env = TestEnv::new();
    let token = sign_json("someone-elses-secret", &json!({"sub": "dr.hale"}));

    let response = env.send(audit_list_request(Some(&token))).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response_json(response).await?, json!({"error": "Invalid token"}));
    Ok(())
}

#[tokio::test]
async fn issuer_is_checked_when_configured() -> Result<()> {
    let env = TestEnv::builder().issuer("carelog").build();

    let ok = env.send(audit_list_request(Some(&token_with_issuer("a", "carelog")))).await?;
    let wrong = env.send(audit_list_request(Some(&token_with_issuer("a", "other")))).await?;

    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn leeway_admits_recently_expired_token() -> Result<()> {
    let env = TestEnv::builder().leeway(Duration::from_secs(120)).build();

    let response = env.send(audit_list_request(Some(&expired_token("dr.hale")))).await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn repeated_reads_are_identical() -> Result<()> {
    let env = TestEnv::new();
    env.seed_entries(20).await?;
    let token = bearer_token("dr.hale");

    let first = response_json(env.send(audit_list_request(Some(&token))).await?).await?;
    let second = response_json(env.send(audit_list_request(Some(&token))).await?).await?;

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn read_store_failure_is_500() -> Result<()> {
    let env = TestEnv::new();
    env.store.set_unavailable(true);

    let response = env.send(audit_list_request(Some(&bearer_token("dr.hale")))).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response_json(response).await?, json!({"error": "Storage unavailable"}));
    Ok(())
}

#[tokio::test]
async fn record_appends_entry() -> Result<()> {
    let env = TestEnv::new();
    let body = json!({"action": "chart_viewed", "details": {"chart": "c-1"}, "user_name": "nurse.ade"});

    let response = env.send(audit_record_request(&body)).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await?, json!({"success": true}));

    let entries = env.store.snapshot().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "chart_viewed");
    assert_eq!(entries[0].details_json()?, json!({"chart": "c-1"}));
    assert_eq!(entries[0].user_name.as_deref(), Some("nurse.ade"));
    Ok(())
}

#[tokio::test]
async fn record_does_not_check_bearer_tokens() -> Result<()> {
    let env = TestEnv::new();
    let mut request = audit_record_request(&json!({"action": "login"}));
    request.headers_mut().insert(AUTHORIZATION, HeaderValue::from_static("Bearer not-a-jwt"));

    let response = env.send(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(env.store.snapshot().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn record_without_user_is_system_entry() -> Result<()> {
    let env = TestEnv::new();

    let response = env.send(audit_record_request(&json!({"action": "nightly_export"}))).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let entries = env.store.snapshot().await;
    assert!(entries[0].user_name.is_none());
    assert_eq!(entries[0].details, "null");
    Ok(())
}

#[tokio::test]
async fn record_rejects_malformed_json_and_blank_action() -> Result<()> {
    let env = TestEnv::new();

    let malformed = env.send(raw_audit_record_request("{not json")).await?;
    let blank = env.send(audit_record_request(&json!({"action": "  ", "details": {}}))).await?;

    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    assert!(response_json(malformed).await?["error"].is_string());
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    assert!(env.store.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn record_store_failure_is_500() -> Result<()> {
    let env = TestEnv::new();
    env.store.set_unavailable(true);

    let response = env.send(audit_record_request(&json!({"action": "login"}))).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response_json(response).await?, json!({"error": "Storage unavailable"}));
    Ok(())
}

#[tokio::test]
async fn webhook_entries_show_up_in_list() -> Result<()> {
    let env = TestEnv::new();
    let event = carelog_testing::PaymentEventBuilder::succeeded().object_id("pi_123").amount(5000);
    env.post_webhook(&event.to_bytes()).await?;

    let body = response_json(env.send(audit_list_request(Some(&bearer_token("a")))).await?).await?;

    assert_eq!(body[0]["action"], json!("payment_succeeded"));
    assert_eq!(body[0]["source_event_id"], json!(event.id()));
    Ok(())
}

#[tokio::test]
async fn other_methods_are_405() -> Result<()> {
    let env = TestEnv::new();

    for method in [Method::PUT, Method::PATCH, Method::DELETE] {
        let response = env.send(empty_request(method.clone(), AUDIT_PATH)).await?;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
        assert_eq!(response.headers()[ALLOW], "GET, POST");
    }
    Ok(())
}
