//! Provider event fixtures.

use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Builder for provider event envelopes.
#[derive(Debug, Clone)]
pub struct PaymentEventBuilder {
    id: String,
    event_type: String,
    object: Map<String, Value>,
}

impl PaymentEventBuilder {
    /// Starts an event of `event_type` with a random `evt_` id and an
    /// object id of `pi_test`.
    pub fn new(event_type: impl Into<String>) -> Self {
        let mut object = Map::new();
        object.insert("id".to_string(), json!("pi_test"));
        object.insert("object".to_string(), json!("payment_intent"));

        Self {
            id: format!("evt_{}", Uuid::new_v4().simple()),
            event_type: event_type.into(),
            object,
        }
    }

    /// `payment_intent.succeeded`
    pub fn succeeded() -> Self {
        Self::new("payment_intent.succeeded")
    }

    /// `payment_intent.payment_failed`
    pub fn failed() -> Self {
        Self::new("payment_intent.payment_failed")
    }

    /// `payment_intent.canceled`
    pub fn canceled() -> Self {
        Self::new("payment_intent.canceled")
    }

    /// Sets the provider event id.
    #[must_use]
    pub fn event_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the payment intent id.
    #[must_use]
    pub fn object_id(self, id: impl Into<String>) -> Self {
        self.field("id", json!(id.into()))
    }

    /// Sets the amount in minor units.
    #[must_use]
    pub fn amount(self, amount: i64) -> Self {
        self.field("amount", json!(amount))
    }

    /// Sets the currency.
    #[must_use]
    pub fn currency(self, currency: &str) -> Self {
        self.field("currency", json!(currency))
    }

    /// Adds a metadata key.
    #[must_use]
    pub fn metadata(mut self, key: &str, value: &str) -> Self {
        let metadata = self.object.entry("metadata").or_insert_with(|| json!({}));
        if let Some(map) = metadata.as_object_mut() {
            map.insert(key.to_string(), json!(value));
        }
        self
    }

    /// Sets `last_payment_error.message`.
    #[must_use]
    pub fn failure_message(self, message: &str) -> Self {
        self.field("last_payment_error", json!({ "message": message }))
    }

    /// Sets an arbitrary field on the object.
    #[must_use]
    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.object.insert(key.to_string(), value);
        self
    }

    /// Removes a field from the object.
    #[must_use]
    pub fn without(mut self, key: &str) -> Self {
        self.object.remove(key);
        self
    }

    /// The provider event id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The envelope as JSON.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "object": "event",
            "type": self.event_type,
            "created": 1_700_000_000,
            "livemode": false,
            "data": { "object": Value::Object(self.object.clone()) },
        })
    }

    /// The envelope as compact body bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }
}
