//! Verified payment provider events and their audit classification.
//!
//! ```text
//!  raw body ──▶ ProviderEvent ──▶ PaymentEvent ──▶ classify()
//!  (verified)     (envelope)        (typed)           │
//!                                                     ├─ Record(NewAuditEntry)
//!                                                     └─ Ignore
//! ```
//!
//! Classification is a total function over [`PaymentEventKind`]: every
//! provider event type lands in exactly one branch, and unknown types are
//! an explicit variant rather than an error.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::{
    error::CarelogError,
    models::{actions, NewAuditEntry},
};

/// Provider event type for a completed payment.
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
/// Provider event type for a failed payment attempt.
pub const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";
/// Provider event type for a canceled payment.
pub const PAYMENT_INTENT_CANCELED: &str = "payment_intent.canceled";

/// Provider event envelope as delivered in the webhook body.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEvent {
    /// Provider-assigned event id (`evt_...`).
    pub id: String,
    /// Event type, e.g. `payment_intent.succeeded`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Creation time as Unix seconds.
    #[serde(default)]
    pub created: Option<i64>,
    /// Event payload.
    pub data: ProviderEventData,
}

/// Payload wrapper of a provider event.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEventData {
    /// The resource the event is about.
    pub object: Value,
}

impl ProviderEvent {
    /// Parses a verified raw body.
    ///
    /// # Errors
    ///
    /// Returns `CarelogError::InvalidPayload` if the body is not a provider
    /// event envelope.
    pub fn from_slice(payload: &[u8]) -> Result<Self, CarelogError> {
        serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            CarelogError::invalid_payload("malformed event payload")
        })
    }
}

/// Closed set of payment event kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentEventKind {
    /// `payment_intent.succeeded`
    Succeeded,
    /// `payment_intent.payment_failed`
    Failed,
    /// `payment_intent.canceled`
    Canceled,
    /// Any other event type, kept verbatim.
    Other(String),
}

impl PaymentEventKind {
    /// Maps a provider event type onto a kind.
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type {
            PAYMENT_INTENT_SUCCEEDED => Self::Succeeded,
            PAYMENT_INTENT_FAILED => Self::Failed,
            PAYMENT_INTENT_CANCELED => Self::Canceled,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the provider event type string.
    pub fn as_event_type(&self) -> &str {
        match self {
            Self::Succeeded => PAYMENT_INTENT_SUCCEEDED,
            Self::Failed => PAYMENT_INTENT_FAILED,
            Self::Canceled => PAYMENT_INTENT_CANCELED,
            Self::Other(event_type) => event_type,
        }
    }

    /// Returns the audit action tag, or `None` for unhandled kinds.
    pub fn audit_action(&self) -> Option<&'static str> {
        match self {
            Self::Succeeded => Some(actions::PAYMENT_SUCCEEDED),
            Self::Failed => Some(actions::PAYMENT_FAILED),
            Self::Canceled => Some(actions::PAYMENT_CANCELED),
            Self::Other(_) => None,
        }
    }
}

/// Typed view of a verified payment event.
///
/// Built once per verified callback and dropped after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    /// Provider event id.
    pub event_id: String,
    /// Event kind.
    pub kind: PaymentEventKind,
    /// Provider id of the affected payment intent. Empty for unhandled
    /// kinds whose object has no id.
    pub object_id: String,
    /// Amount in minor currency units.
    pub amount: Option<i64>,
    /// Three-letter currency code, lowercase as sent by the provider.
    pub currency: Option<String>,
    /// Caller-supplied string metadata (correlation ids and the like).
    pub metadata: BTreeMap<String, String>,
    /// Provider failure message for failed payments.
    pub failure_reason: Option<String>,
    /// Provider cancellation reason for canceled payments.
    pub cancellation_reason: Option<String>,
}

impl TryFrom<ProviderEvent> for PaymentEvent {
    type Error = CarelogError;

    fn try_from(event: ProviderEvent) -> Result<Self, Self::Error> {
        let kind = PaymentEventKind::from_event_type(&event.event_type);
        let object = event.data.object.as_object();
        let field = |name: &str| object.and_then(|o| o.get(name));
        let string_field = |name: &str| field(name).and_then(Value::as_str).map(String::from);

        let object_id = match (string_field("id"), &kind) {
            (Some(id), _) => id,
            (None, PaymentEventKind::Other(_)) => String::new(),
            (None, _) => {
                return Err(CarelogError::invalid_payload(format!(
                    "{} event is missing the payment intent id",
                    kind.as_event_type()
                )));
            },
        };

        let metadata = field("metadata")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let failure_reason = field("last_payment_error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .map(String::from);

        Ok(Self {
            event_id: event.id,
            kind,
            object_id,
            amount: field("amount").and_then(Value::as_i64),
            currency: string_field("currency"),
            metadata,
            failure_reason,
            cancellation_reason: string_field("cancellation_reason"),
        })
    }
}

/// Outcome of classifying a payment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Append exactly this entry.
    Record(NewAuditEntry),
    /// Acknowledge without writing to the audit trail.
    Ignore {
        /// The unhandled provider event type.
        event_type: String,
    },
}

/// Maps a payment event to its audit outcome.
pub fn classify(event: &PaymentEvent) -> Classification {
    let Some(action) = event.kind.audit_action() else {
        return Classification::Ignore { event_type: event.kind.as_event_type().to_string() };
    };

    let mut details = Map::new();
    details.insert("object_id".to_string(), json!(event.object_id));

    match event.kind {
        PaymentEventKind::Succeeded => {
            if let Some(amount) = event.amount {
                details.insert("amount".to_string(), json!(format_major_units(amount)));
            }
            if let Some(currency) = &event.currency {
                details.insert("currency".to_string(), json!(currency));
            }
            if !event.metadata.is_empty() {
                details.insert("metadata".to_string(), json!(event.metadata));
            }
        },
        PaymentEventKind::Failed => {
            if let Some(amount) = event.amount {
                details.insert("amount".to_string(), json!(format_major_units(amount)));
            }
            if let Some(reason) = &event.failure_reason {
                details.insert("failure_reason".to_string(), json!(reason));
            }
        },
        PaymentEventKind::Canceled | PaymentEventKind::Other(_) => {},
    }

    Classification::Record(
        NewAuditEntry::new(action, &Value::Object(details)).with_source_event(&event.event_id),
    )
}

/// Formats a minor-unit amount as a major-unit decimal string.
///
/// `5000` becomes `"50.00"`, `-125` becomes `"-1.25"`.
pub fn format_major_units(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str, object: Value) -> PaymentEvent {
        let envelope = ProviderEvent {
            id: "evt_1".to_string(),
            event_type: event_type.to_string(),
            created: Some(1_700_000_000),
            data: ProviderEventData { object },
        };
        PaymentEvent::try_from(envelope).unwrap()
    }

    fn recorded(classification: Classification) -> (String, Value, Option<String>) {
        match classification {
            Classification::Record(entry) => (
                entry.action,
                serde_json::from_str(&entry.details).unwrap(),
                entry.source_event_id,
            ),
            Classification::Ignore { event_type } => panic!("unexpectedly ignored {event_type}"),
        }
    }

    #[test]
    fn succeeded_records_amount_in_major_units() {
        let event = event(
            PAYMENT_INTENT_SUCCEEDED,
            json!({"id": "pi_123", "amount": 5000, "currency": "usd"}),
        );

        let (action, details, source) = recorded(classify(&event));

        assert_eq!(action, "payment_succeeded");
        assert_eq!(details, json!({"object_id": "pi_123", "amount": "50.00", "currency": "usd"}));
        assert_eq!(source.as_deref(), Some("evt_1"));
    }

    #[test]
    fn succeeded_carries_string_metadata_only() {
        let event = event(
            PAYMENT_INTENT_SUCCEEDED,
            json!({
                "id": "pi_9",
                "amount": 1999,
                "metadata": {"appointment_id": "apt_42", "visits": 3}
            }),
        );

        let (_, details, _) = recorded(classify(&event));

        assert_eq!(details["metadata"], json!({"appointment_id": "apt_42"}));
        assert_eq!(details["amount"], json!("19.99"));
    }

    #[test]
    fn failed_records_failure_reason() {
        let event = event(
            PAYMENT_INTENT_FAILED,
            json!({
                "id": "pi_7",
                "amount": 1200,
                "last_payment_error": {"message": "Your card was declined."}
            }),
        );

        let (action, details, _) = recorded(classify(&event));

        assert_eq!(action, "payment_failed");
        assert_eq!(details["failure_reason"], json!("Your card was declined."));
        assert_eq!(details["amount"], json!("12.00"));
    }

    #[test]
    fn canceled_records_object_id_only() {
        let event = event(
            PAYMENT_INTENT_CANCELED,
            json!({"id": "pi_5", "amount": 800, "cancellation_reason": "abandoned"}),
        );

        let (action, details, _) = recorded(classify(&event));

        assert_eq!(action, "payment_canceled");
        assert_eq!(details, json!({"object_id": "pi_5"}));
    }

    #[test]
    fn unknown_types_are_ignored() {
        let event = event("customer.created", json!({"id": "cus_1"}));

        assert_eq!(
            classify(&event),
            Classification::Ignore { event_type: "customer.created".to_string() }
        );
    }

    #[test]
    fn unknown_types_tolerate_missing_object_id() {
        let event = event("balance.available", json!({"available": []}));
        assert_eq!(event.kind, PaymentEventKind::Other("balance.available".to_string()));
        assert!(event.object_id.is_empty());
    }

    #[test]
    fn handled_types_require_object_id() {
        let envelope = ProviderEvent {
            id: "evt_2".to_string(),
            event_type: PAYMENT_INTENT_SUCCEEDED.to_string(),
            created: None,
            data: ProviderEventData { object: json!({"amount": 100}) },
        };

        let err = PaymentEvent::try_from(envelope).unwrap_err();
        assert!(matches!(err, CarelogError::InvalidPayload { .. }));
    }

    #[test]
    fn envelope_parse_failure_is_invalid_payload() {
        let err = ProviderEvent::from_slice(br#"{"type":"payment_intent.succeeded"}"#).unwrap_err();
        assert!(matches!(err, CarelogError::InvalidPayload { .. }));
    }

    #[test]
    fn kind_round_trips_event_type() {
        for event_type in
            [PAYMENT_INTENT_SUCCEEDED, PAYMENT_INTENT_FAILED, PAYMENT_INTENT_CANCELED, "charge.refunded"]
        {
            assert_eq!(PaymentEventKind::from_event_type(event_type).as_event_type(), event_type);
        }
    }

    #[test]
    fn major_unit_formatting() {
        assert_eq!(format_major_units(5000), "50.00");
        assert_eq!(format_major_units(5), "0.05");
        assert_eq!(format_major_units(0), "0.00");
        assert_eq!(format_major_units(-125), "-1.25");
        assert_eq!(format_major_units(i64::MIN), "-92233720368547758.08");
    }
}
