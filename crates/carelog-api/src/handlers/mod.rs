//! HTTP request handlers.
//!
//! Every failure is answered as `{"error": "<message>"}` with the status
//! from [`ApiError::status`] and the error code in `X-Error-Code`.
//! Server-side failures are logged with their detail and answered with a
//! generic message.

pub mod audit;
pub mod webhook;

use axum::{
    http::{header::ALLOW, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use carelog_core::CarelogError;
use serde::Serialize;
use tracing::error;

pub use audit::{audit_method_not_allowed, list_audit_entries, record_audit_entry};
pub use webhook::{receive_stripe_webhook, webhook_method_not_allowed};

use crate::auth::AuthError;

const ERROR_CODE_HEADER: &str = "x-error-code";

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
}

/// A [`CarelogError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    error: CarelogError,
    webhook: bool,
}

impl ApiError {
    /// Wraps an error raised on the webhook route, where client errors
    /// read `Webhook Error: <reason>`.
    pub fn webhook(error: impl Into<CarelogError>) -> Self {
        Self { error: error.into(), webhook: true }
    }

    /// HTTP status for the wrapped error.
    pub fn status(&self) -> StatusCode {
        match &self.error {
            CarelogError::InvalidSignature { .. }
            | CarelogError::InvalidPayload { .. }
            | CarelogError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CarelogError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            CarelogError::UnsupportedMethod { .. } => StatusCode::METHOD_NOT_ALLOWED,
            CarelogError::Timeout => StatusCode::REQUEST_TIMEOUT,
            CarelogError::StorageUnavailable(_) | CarelogError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    fn message(&self) -> String {
        match &self.error {
            CarelogError::StorageUnavailable(_) => "Storage unavailable".to_string(),
            CarelogError::Other(_) => "Internal server error".to_string(),
            CarelogError::InvalidSignature { reason } | CarelogError::InvalidPayload { reason }
                if self.webhook =>
            {
                format!("Webhook Error: {reason}")
            },
            other => other.to_string(),
        }
    }
}

impl From<CarelogError> for ApiError {
    fn from(error: CarelogError) -> Self {
        Self { error, webhook: false }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        Self::from(CarelogError::from(error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.error.code();

        if !self.error.is_client_error() {
            error!(code, %status, error = %self.error, "Request failed");
        }

        let mut response = (status, Json(ErrorBody { error: self.message() })).into_response();
        response.headers_mut().insert(ERROR_CODE_HEADER, HeaderValue::from_static(code));
        response
    }
}

/// Builds the 405 answer for a route, advertising the allowed methods.
pub fn method_not_allowed(method: &Method, allow: &'static str) -> Response {
    let mut response =
        ApiError::from(CarelogError::UnsupportedMethod { method: method.to_string() })
            .into_response();
    response.headers_mut().insert(ALLOW, HeaderValue::from_static(allow));
    response
}
