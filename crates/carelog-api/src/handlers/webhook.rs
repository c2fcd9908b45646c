//! Stripe webhook receiver.

use axum::{
    extract::State,
    http::{HeaderMap, Method},
    response::Response,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::instrument;

use super::{method_not_allowed, ApiError};
use crate::{crypto::SIGNATURE_HEADER, AppState};

/// Acknowledgement body.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// Always `true`.
    pub received: bool,
}

/// `POST /webhooks/stripe`
///
/// Verifies the signature over the raw body, classifies the event and
/// records it. Any verified event is acknowledged, unhandled types and
/// replays included.
///
/// # Errors
///
/// 400 for signature or payload failures, 500 if the entry cannot be
/// written.
#[instrument(
    name = "receive_stripe_webhook",
    skip(state, headers, body),
    fields(content_length = body.len())
)]
pub async fn receive_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    state.webhooks.process(&body, signature).await.map_err(ApiError::webhook)?;

    Ok(Json(WebhookAck { received: true }))
}

/// Any other method on `/webhooks/stripe`.
pub async fn webhook_method_not_allowed(method: Method) -> Response {
    method_not_allowed(&method, "POST")
}
