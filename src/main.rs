//! Carelog payment audit service.
//!
//! Main entry point for the Carelog server. Loads configuration, prepares
//! the audit store and serves the webhook and audit routes until shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use carelog_api::{create_router, shutdown_signal, start_server, AppState, Config};
use carelog_core::{
    storage::{run_migrations, Storage},
    RealClock,
};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::oneshot;
use tracing::{error, info};

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config);

    info!("Starting Carelog payment audit service");
    info!(
        database_url = %config.database_url_masked(),
        host = %config.host,
        port = config.port,
        max_connections = config.database_max_connections,
        idempotency = config.webhook_idempotency,
        "Configuration loaded"
    );

    let db_pool = create_database_pool(&config).await?;
    info!("Database connection pool established");

    run_migrations(&db_pool).await.context("Failed to run database migrations")?;
    info!("Database migrations completed");

    let storage = Storage::new(db_pool.clone());
    let state =
        AppState::new(storage.audit_logs.clone(), &config.security_settings(), Arc::new(RealClock));
    let app = create_router(state, config.request_timeout());
    let addr = config.parse_server_addr()?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server_handle = tokio::spawn(async move {
        let shutdown = async {
            let _ = stop_rx.await;
        };
        if let Err(e) = start_server(app, addr, shutdown).await {
            error!(error = %e, "Server failed");
        }
    });

    info!(%addr, "Carelog is ready to receive webhooks");

    tokio::select! {
        () = shutdown_signal() => {
            let _ = stop_tx.send(());
            tokio::select! {
                _ = tokio::time::sleep(SHUTDOWN_GRACE_PERIOD) => {
                    info!("Shutdown grace period expired");
                }
                _ = &mut server_handle => {
                    info!("Server stopped");
                }
            }
        }
        _ = &mut server_handle => {
            error!("Server exited before shutdown was requested");
        }
    }

    db_pool.close().await;
    info!("Database connections closed");

    info!("Carelog shutdown complete");
    Ok(())
}

/// Initializes tracing from the configured filter.
///
/// `RUST_LOG` flows through [`Config`], so the configured value already
/// reflects the environment. An unparsable filter falls back to `info`.
fn init_tracing(config: &Config) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_new(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if config.log_json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);
    let mut retries = 0;

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    error = %e,
                    "Database connection failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}
