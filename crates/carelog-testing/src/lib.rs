//! Test infrastructure for carelog integration tests.
//!
//! [`TestEnv`] wires the real router over an in-memory audit store and a
//! [`TestClock`], with known secrets so tests can sign webhooks and mint
//! bearer tokens. No database is needed.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use axum::{body::Body, http::Request, response::Response, Router};
use carelog_api::{create_router, AppState, SecuritySettings};
pub use carelog_core::{storage::memory::MemoryAuditStore, Clock, TestClock};
use carelog_core::{AuditEntryId, AuditStore, NewAuditEntry};
use secrecy::SecretString;
use serde_json::json;
use tower::ServiceExt;

pub mod fixtures;
pub mod http;
pub mod tokens;

pub use fixtures::PaymentEventBuilder;

/// Webhook signing secret used by every [`TestEnv`].
pub const WEBHOOK_SECRET: &str = "whsec_test_0123456789abcdef";

/// Token signing secret used by every [`TestEnv`].
pub const JWT_SECRET: &str = "jwt-test-secret-for-carelog";

/// Builder for [`TestEnv`].
#[derive(Debug, Clone)]
pub struct TestEnvBuilder {
    tolerance: Duration,
    idempotency: bool,
    issuer: Option<String>,
    leeway: Duration,
    request_timeout: Duration,
}

impl Default for TestEnvBuilder {
    fn default() -> Self {
        Self {
            tolerance: Duration::from_secs(300),
            idempotency: false,
            issuer: None,
            leeway: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl TestEnvBuilder {
    /// Sets the webhook timestamp tolerance.
    #[must_use]
    pub fn tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Enables replay protection.
    #[must_use]
    pub fn idempotency(mut self, enabled: bool) -> Self {
        self.idempotency = enabled;
        self
    }

    /// Requires tokens to carry this issuer.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the token expiry leeway.
    #[must_use]
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Builds the environment.
    pub fn build(self) -> TestEnv {
        let clock = TestClock::new();
        let store = Arc::new(MemoryAuditStore::with_clock(Arc::new(clock.clone())));

        let settings = SecuritySettings {
            webhook_secret: SecretString::from(WEBHOOK_SECRET.to_string()),
            webhook_tolerance: self.tolerance,
            webhook_idempotency: self.idempotency,
            jwt_secret: SecretString::from(JWT_SECRET.to_string()),
            jwt_issuer: self.issuer,
            jwt_leeway: self.leeway,
        };

        let state = AppState::new(store.clone(), &settings, Arc::new(clock.clone()));
        let router = create_router(state.clone(), self.request_timeout);

        TestEnv { clock, store, state, router }
    }
}

/// Router plus the store and clock behind it.
pub struct TestEnv {
    /// Clock driving webhook tolerance and entry timestamps.
    pub clock: TestClock,
    /// The audit store behind the router.
    pub store: Arc<MemoryAuditStore>,
    /// Application state shared with the router.
    pub state: AppState,
    router: Router,
}

impl TestEnv {
    /// Environment with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts a builder.
    pub fn builder() -> TestEnvBuilder {
        TestEnvBuilder::default()
    }

    /// A clone of the router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Sends one request through the router.
    ///
    /// # Errors
    ///
    /// Returns error if the router fails to produce a response.
    pub async fn send(&self, request: Request<Body>) -> Result<Response> {
        Ok(self.router().oneshot(request).await?)
    }

    /// Signs `body` at the current clock time and posts it to the webhook
    /// route.
    ///
    /// # Errors
    ///
    /// Returns error if the router fails to produce a response.
    pub async fn post_webhook(&self, body: &[u8]) -> Result<Response> {
        let request = http::signed_webhook_request(body, WEBHOOK_SECRET, self.clock.unix_timestamp());
        self.send(request).await
    }

    /// Appends `count` entries directly to the store, one second apart,
    /// named `seeded_0` onwards.
    ///
    /// # Errors
    ///
    /// Returns error if the store rejects a write.
    pub async fn seed_entries(&self, count: usize) -> Result<Vec<AuditEntryId>> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let entry = NewAuditEntry::new(format!("seeded_{i}"), &json!({ "seq": i }));
            ids.push(self.store.append(entry).await?);
            self.clock.advance(Duration::from_secs(1));
        }
        Ok(ids)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
