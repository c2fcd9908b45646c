//! Request builders and response helpers.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
};
use carelog_api::crypto::{generate_signature_header, SIGNATURE_HEADER};
use serde_json::Value;

/// Webhook route path.
pub const WEBHOOK_PATH: &str = "/webhooks/stripe";

/// Audit route path.
pub const AUDIT_PATH: &str = "/audit";

/// A webhook POST signed with `secret` at `timestamp`.
pub fn signed_webhook_request(body: &[u8], secret: &str, timestamp: i64) -> Request<Body> {
    webhook_request(body, Some(&generate_signature_header(body, secret, timestamp)))
}

/// A webhook POST with a literal signature header, or none.
pub fn webhook_request(body: &[u8], signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(WEBHOOK_PATH)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_vec())).unwrap_or_default()
}

/// `GET /audit`, with a bearer token when given.
pub fn audit_list_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(AUDIT_PATH);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap_or_default()
}

/// `POST /audit` with a JSON body.
pub fn audit_record_request(body: &Value) -> Request<Body> {
    raw_audit_record_request(body.to_string())
}

/// `POST /audit` with a raw body.
pub fn raw_audit_record_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(AUDIT_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap_or_default()
}

/// A bodiless request with an arbitrary method.
pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap_or_default()
}

/// Reads the body as JSON.
///
/// # Errors
///
/// Returns error if the body cannot be read or is not JSON.
pub async fn response_json(response: Response) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .context("failed to read response body")?;
    serde_json::from_slice(&bytes).context("response body is not JSON")
}
