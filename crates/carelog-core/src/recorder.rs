//! Append-only audit recorder.
//!
//! The only write path into the audit trail. Both the payment webhook and
//! the unauthenticated `POST /audit` route append through an
//! [`AuditRecorder`], so the trail has a single shape regardless of
//! producer.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{
    error::CarelogError,
    models::{AuditEntryId, AuditLogEntry, NewAuditEntry},
    storage::AuditStore,
};

/// Maximum number of entries returned by a single audit read.
pub const RECENT_ENTRIES_LIMIT: usize = 100;

/// Appends entries to and reads entries from an [`AuditStore`].
///
/// Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

impl AuditRecorder {
    /// Creates a recorder over `store`.
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Records an action with its details.
    ///
    /// `details` is serialized to text as given. A blank `user_name` is
    /// stored as absent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank action and `StorageUnavailable`
    /// if the store rejects the write.
    pub async fn record(
        &self,
        action: &str,
        details: &Value,
        user_name: Option<&str>,
    ) -> Result<AuditEntryId, CarelogError> {
        let user_name = user_name.map(str::trim).filter(|u| !u.is_empty()).map(String::from);
        self.append(NewAuditEntry::new(action, details).with_user_name(user_name)).await
    }

    /// Appends a fully built entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank action and `StorageUnavailable`
    /// if the store rejects the write.
    #[instrument(
        name = "audit.append",
        skip(self, entry),
        fields(action = %entry.action, source_event_id = ?entry.source_event_id)
    )]
    pub async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntryId, CarelogError> {
        if entry.action.trim().is_empty() {
            return Err(CarelogError::InvalidInput("action must not be empty".to_string()));
        }

        match self.store.append(entry).await {
            Ok(id) => {
                debug!(entry_id = %id, "Audit entry recorded");
                Ok(id)
            },
            Err(e) => {
                warn!(error = %e, "Failed to record audit entry");
                Err(e.into())
            },
        }
    }

    /// Returns up to `limit` entries, newest first, capped at
    /// [`RECENT_ENTRIES_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be read.
    pub async fn recent(&self, limit: usize) -> Result<Vec<AuditLogEntry>, CarelogError> {
        let limit = limit.min(RECENT_ENTRIES_LIMIT);
        Ok(self.store.recent(limit).await?)
    }

    /// Returns whether the provider event has already produced an entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be read.
    pub async fn has_source_event(&self, event_id: &str) -> Result<bool, CarelogError> {
        Ok(self.store.contains_source_event(event_id).await?)
    }
}
