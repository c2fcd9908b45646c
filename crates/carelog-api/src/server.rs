//! HTTP server configuration and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. Timeout enforcement (`408` with the JSON error body)
//! 4. Body size limit (1 MiB)
//! 5. Handler execution
//!
//! # Graceful Shutdown
//!
//! On SIGINT or SIGTERM the server stops accepting connections and waits
//! for in-flight requests before returning.

use std::{future::Future, net::SocketAddr, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use carelog_core::CarelogError;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{handlers, handlers::ApiError, AppState};

/// Maximum accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Creates the router with all routes and middleware.
///
/// ```no_run
/// use std::{sync::Arc, time::Duration};
///
/// use carelog_api::{create_router, AppState, Config};
/// use carelog_core::{storage::memory::MemoryAuditStore, RealClock};
///
/// # fn build(config: &Config) {
/// let state = AppState::new(
///     Arc::new(MemoryAuditStore::new()),
///     &config.security_settings(),
///     Arc::new(RealClock),
/// );
/// let app = create_router(state, Duration::from_secs(30));
/// # }
/// ```
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let webhook_routes = Router::new().route(
        "/webhooks/stripe",
        post(handlers::receive_stripe_webhook).fallback(handlers::webhook_method_not_allowed),
    );

    let audit_routes = Router::new().route(
        "/audit",
        get(handlers::list_audit_entries)
            .post(handlers::record_audit_entry)
            .fallback(handlers::audit_method_not_allowed),
    );

    Router::new()
        .merge(webhook_routes)
        .merge(audit_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(request_timeout, enforce_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Adds an `X-Request-Id` header to every response.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Answers `408` with the error body when the inner service outlives `limit`.
///
/// The pending handler future is dropped on expiry.
async fn enforce_timeout(State(limit): State<Duration>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(%method, %path, timeout = ?limit, "Request timed out");
            ApiError::from(CarelogError::Timeout).into_response()
        },
    }
}

/// Serves `app` on `addr` until `shutdown` resolves.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound or the server
/// fails while running.
pub async fn start_server(
    app: Router,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Waiting for in-flight requests to complete");
}
