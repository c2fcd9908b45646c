//! Audit trail records and their identifiers.
//!
//! Entries are immutable once written: the store assigns `id` and
//! `timestamp` on insert, and nothing in this crate updates or deletes a
//! stored row.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type BoxDynError = sqlx::error::BoxDynError;

/// Action tags produced by the payment webhook.
pub mod actions {
    /// A payment completed.
    pub const PAYMENT_SUCCEEDED: &str = "payment_succeeded";
    /// A payment attempt failed.
    pub const PAYMENT_FAILED: &str = "payment_failed";
    /// A payment was canceled before completion.
    pub const PAYMENT_CANCELED: &str = "payment_canceled";
}

/// Store-assigned audit entry identifier.
///
/// Monotonic with insertion order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AuditEntryId(pub i64);

impl fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AuditEntryId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl sqlx::Type<PgDb> for AuditEntryId {
    fn type_info() -> PgTypeInfo {
        <i64 as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for AuditEntryId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        <i64 as sqlx::Decode<PgDb>>::decode(value).map(Self::from)
    }
}

/// A stored audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Store-assigned identifier.
    pub id: AuditEntryId,
    /// Short action tag, e.g. `payment_succeeded` or `export`.
    pub action: String,
    /// Serialized JSON payload. Opaque to the recorder.
    pub details: String,
    /// Actor that performed the action; absent for system entries.
    pub user_name: Option<String>,
    /// Provider event id for entries produced by a webhook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_event_id: Option<String>,
    /// Insert time assigned by the store. The sole ordering key.
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Parses `details` back into JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored text is not valid JSON, which can
    /// only happen for rows written outside this crate.
    pub fn details_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.details)
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for AuditLogEntry {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            action: row.try_get("action")?,
            details: row.try_get("details")?,
            user_name: row.try_get("user_name")?,
            source_event_id: row.try_get("source_event_id")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

/// An entry waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    /// Action tag.
    pub action: String,
    /// Serialized JSON payload.
    pub details: String,
    /// Actor, if any.
    pub user_name: Option<String>,
    /// Provider event id, if produced by a webhook.
    pub source_event_id: Option<String>,
}

impl NewAuditEntry {
    /// Creates an entry, serializing `details` to text.
    pub fn new(action: impl Into<String>, details: &serde_json::Value) -> Self {
        Self {
            action: action.into(),
            details: details.to_string(),
            user_name: None,
            source_event_id: None,
        }
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_user_name(mut self, user_name: Option<String>) -> Self {
        self.user_name = user_name;
        self
    }

    /// Links the entry to the provider event that produced it.
    #[must_use]
    pub fn with_source_event(mut self, event_id: impl Into<String>) -> Self {
        self.source_event_id = Some(event_id.into());
        self
    }
}
