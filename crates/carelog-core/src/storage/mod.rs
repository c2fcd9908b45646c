//! Durable audit log storage.
//!
//! [`AuditStore`] is the seam between the recorder and the backing store.
//! The Postgres [`audit_logs::Repository`] is used in production and the
//! in-memory [`memory::MemoryAuditStore`] in tests and local runs.
//!
//! Stores only ever append and read. There is no update or delete path.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

pub mod audit_logs;
pub mod memory;

use crate::{
    error::Result,
    models::{AuditEntryId, AuditLogEntry, NewAuditEntry},
};

/// Append-only audit log operations.
#[async_trait]
pub trait AuditStore: Send + Sync + 'static {
    /// Appends an entry, assigning its id and timestamp.
    ///
    /// Concurrent appends must not lose or merge entries.
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntryId>;

    /// Returns up to `limit` entries, newest first.
    ///
    /// Ties on `timestamp` are broken by `id`, descending.
    async fn recent(&self, limit: usize) -> Result<Vec<AuditLogEntry>>;

    /// Returns whether an entry produced by `event_id` already exists.
    async fn contains_source_event(&self, event_id: &str) -> Result<bool>;
}

/// Container for the Postgres repositories.
#[derive(Clone)]
pub struct Storage {
    /// Audit log repository.
    pub audit_logs: Arc<audit_logs::Repository>,
}

impl Storage {
    /// Creates a storage instance over the given pool.
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);
        Self { audit_logs: Arc::new(audit_logs::Repository::new(pool)) }
    }

    /// Performs a health check on the database connection.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unreachable.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&*self.audit_logs.pool()).await?;
        Ok(())
    }
}

/// Creates the audit log schema if it does not exist yet.
///
/// # Errors
///
/// Returns error if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id BIGSERIAL PRIMARY KEY,
            action TEXT NOT NULL CHECK (length(trim(action)) > 0),
            details TEXT NOT NULL,
            user_name TEXT,
            source_event_id TEXT,
            "timestamp" TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_audit_logs_timestamp
            ON audit_logs ("timestamp" DESC, id DESC)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE INDEX IF NOT EXISTS idx_audit_logs_source_event
            ON audit_logs (source_event_id)
            WHERE source_event_id IS NOT NULL
        ",
    )
    .execute(pool)
    .await?;

    Ok(())
}
