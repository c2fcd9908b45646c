//! Carelog HTTP API.
//!
//! Routes:
//! - `POST /webhooks/stripe`: signature-verified payment callbacks
//! - `GET /audit`: newest 100 audit entries, bearer token required
//! - `POST /audit`: append an audit entry

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use carelog_core::{AuditRecorder, AuditStore, Clock};

pub mod auth;
pub mod config;
pub mod crypto;
pub mod handlers;
pub mod query;
pub mod server;
pub mod webhook;

pub use config::{Config, SecuritySettings};
pub use query::AuditQueryService;
pub use server::{create_router, shutdown_signal, start_server};
pub use webhook::{WebhookOutcome, WebhookProcessor};

use crate::{auth::TokenVerifier, crypto::SignatureVerifier};

/// Shared state handed to every handler.
///
/// Built once at startup from an explicit store; nothing here is global.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Webhook verification and recording.
    pub webhooks: WebhookProcessor,
    /// Authenticated audit reads.
    pub queries: AuditQueryService,
    /// Audit writes from `POST /audit`.
    pub recorder: AuditRecorder,
}

impl AppState {
    /// Wires the request path over `store`.
    pub fn new(store: Arc<dyn AuditStore>, settings: &SecuritySettings, clock: Arc<dyn Clock>) -> Self {
        let recorder = AuditRecorder::new(store);

        let verifier = SignatureVerifier::new(settings.webhook_secret.clone(), clock)
            .with_tolerance(settings.webhook_tolerance);
        let webhooks = WebhookProcessor::new(verifier, recorder.clone())
            .with_idempotency(settings.webhook_idempotency);

        let mut tokens =
            TokenVerifier::from_secret(&settings.jwt_secret).with_leeway(settings.jwt_leeway);
        if let Some(issuer) = &settings.jwt_issuer {
            tokens = tokens.with_issuer(issuer);
        }
        let queries = AuditQueryService::new(tokens, recorder.clone());

        Self { webhooks, queries, recorder }
    }
}
