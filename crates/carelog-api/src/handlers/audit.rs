//! Audit trail read and write routes.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, Method},
    response::Response,
    Json,
};
use carelog_core::{AuditLogEntry, CarelogError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use super::{method_not_allowed, ApiError};
use crate::AppState;

/// Body of `POST /audit`.
#[derive(Debug, Deserialize)]
pub struct RecordAuditRequest {
    /// Action tag.
    pub action: String,
    /// Arbitrary JSON, stored as text.
    #[serde(default)]
    pub details: Value,
    /// Acting user.
    #[serde(default)]
    pub user_name: Option<String>,
}

/// Body of a successful `POST /audit`.
#[derive(Debug, Serialize)]
pub struct RecordAuditResponse {
    /// Always `true`.
    pub success: bool,
}

/// `GET /audit`
///
/// Returns up to 100 entries, newest first, to bearer token holders.
#[instrument(name = "list_audit_entries", skip_all)]
pub async fn list_audit_entries(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AuditLogEntry>>, ApiError> {
    let entries = state.queries.list(&headers).await?;
    Ok(Json(entries))
}

/// `POST /audit`
#[instrument(name = "record_audit_entry", skip_all)]
pub async fn record_audit_entry(
    State(state): State<AppState>,
    payload: Result<Json<RecordAuditRequest>, JsonRejection>,
) -> Result<Json<RecordAuditResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| CarelogError::InvalidInput(rejection.body_text()))?;

    state
        .recorder
        .record(&request.action, &request.details, request.user_name.as_deref())
        .await?;

    Ok(Json(RecordAuditResponse { success: true }))
}

/// Any other method on `/audit`.
pub async fn audit_method_not_allowed(method: Method) -> Response {
    method_not_allowed(&method, "GET, POST")
}
