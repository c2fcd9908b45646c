//! Payment webhook processing: verify, classify, record.
//!
//! ```text
//!  raw body + header
//!        │
//!        ▼
//!  SignatureVerifier ──✗──▶ InvalidSignature / InvalidPayload
//!        │
//!        ▼
//!  classify() ──Ignore──▶ Ignored
//!        │
//!        ▼  (idempotency on: already seen?) ──▶ Duplicate
//!  AuditRecorder ──✗──▶ StorageUnavailable
//!        │
//!        ▼
//!     Recorded
//! ```

use carelog_core::{
    classify, AuditEntryId, AuditRecorder, CarelogError, Classification, PaymentEvent,
};
use tracing::{debug, field, info, instrument};

use crate::crypto::SignatureVerifier;

/// What a verified webhook call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// One audit entry was appended.
    Recorded {
        /// The new entry.
        entry_id: AuditEntryId,
    },
    /// Event type has no audit mapping; nothing was written.
    Ignored {
        /// The unhandled event type.
        event_type: String,
    },
    /// The event already produced an entry; nothing was written.
    Duplicate {
        /// The replayed provider event id.
        event_id: String,
    },
}

/// Turns verified provider callbacks into audit entries.
#[derive(Debug, Clone)]
pub struct WebhookProcessor {
    verifier: SignatureVerifier,
    recorder: AuditRecorder,
    idempotent: bool,
}

impl WebhookProcessor {
    /// Creates a processor. Replays are recorded again unless
    /// [`WebhookProcessor::with_idempotency`] is enabled.
    pub fn new(verifier: SignatureVerifier, recorder: AuditRecorder) -> Self {
        Self { verifier, recorder, idempotent: false }
    }

    /// Skips events whose provider id already appears in the audit trail.
    #[must_use]
    pub fn with_idempotency(mut self, enabled: bool) -> Self {
        self.idempotent = enabled;
        self
    }

    /// Processes one callback.
    ///
    /// Nothing is written unless the signature verifies.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` or `InvalidPayload` for requests that must
    /// not be trusted and `StorageUnavailable` if the entry cannot be
    /// written.
    #[instrument(
        name = "webhook.process",
        skip_all,
        fields(event_id = field::Empty, event_type = field::Empty)
    )]
    pub async fn process(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, CarelogError> {
        let envelope = self.verifier.construct_event(payload, signature)?;

        let span = tracing::Span::current();
        span.record("event_id", envelope.id.as_str());
        span.record("event_type", envelope.event_type.as_str());

        let event = PaymentEvent::try_from(envelope)?;

        let entry = match classify(&event) {
            Classification::Record(entry) => entry,
            Classification::Ignore { event_type } => {
                debug!(%event_type, "Unhandled event type acknowledged");
                return Ok(WebhookOutcome::Ignored { event_type });
            },
        };

        if self.idempotent && self.recorder.has_source_event(&event.event_id).await? {
            info!("Duplicate event acknowledged without recording");
            return Ok(WebhookOutcome::Duplicate { event_id: event.event_id });
        }

        let entry_id = self.recorder.append(entry).await?;
        info!(%entry_id, "Payment event recorded");

        Ok(WebhookOutcome::Recorded { entry_id })
    }
}
