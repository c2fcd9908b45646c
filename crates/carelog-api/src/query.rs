//! Authenticated read access to the audit trail.

use axum::http::HeaderMap;
use carelog_core::{AuditLogEntry, AuditRecorder, CarelogError, RECENT_ENTRIES_LIMIT};
use tracing::{debug, instrument, warn};

use crate::auth::TokenVerifier;

/// Lists the most recent audit entries for token holders.
#[derive(Debug, Clone)]
pub struct AuditQueryService {
    tokens: TokenVerifier,
    recorder: AuditRecorder,
}

impl AuditQueryService {
    /// Creates the service.
    pub fn new(tokens: TokenVerifier, recorder: AuditRecorder) -> Self {
        Self { tokens, recorder }
    }

    /// Returns the newest [`RECENT_ENTRIES_LIMIT`] entries, newest first.
    ///
    /// The bearer token in `headers` is verified before the store is
    /// touched.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for a missing, invalid or expired token and
    /// `StorageUnavailable` if the store cannot be read.
    #[instrument(name = "audit.list", skip_all)]
    pub async fn list(&self, headers: &HeaderMap) -> Result<Vec<AuditLogEntry>, CarelogError> {
        let claims = self.tokens.authenticate(headers).map_err(|e| {
            warn!(reason = ?e, "Rejected audit read");
            e
        })?;

        let entries = self.recorder.recent(RECENT_ENTRIES_LIMIT).await?;
        debug!(subject = claims.sub.as_deref(), count = entries.len(), "Audit entries listed");

        Ok(entries)
    }
}
