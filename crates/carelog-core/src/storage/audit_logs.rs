//! Postgres repository for the `audit_logs` table.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::AuditStore;
use crate::{
    error::Result,
    models::{AuditEntryId, AuditLogEntry, NewAuditEntry},
};

/// Repository for audit log rows.
///
/// Inserts rely on the column default for `timestamp`, so the database
/// clock is the single source of ordering across API instances.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Appends an entry.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails or a constraint is violated.
    pub async fn create(&self, entry: &NewAuditEntry) -> Result<AuditEntryId> {
        let row = sqlx::query(
            r"
            INSERT INTO audit_logs (action, details, user_name, source_event_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(&entry.action)
        .bind(&entry.details)
        .bind(entry.user_name.as_deref())
        .bind(entry.source_event_id.as_deref())
        .fetch_one(&*self.pool)
        .await?;

        Ok(row.try_get::<AuditEntryId, _>("id")?)
    }

    /// Returns up to `limit` entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_recent(&self, limit: usize) -> Result<Vec<AuditLogEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let entries = sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT id, action, details, user_name, source_event_id, "timestamp"
            FROM audit_logs
            ORDER BY "timestamp" DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&*self.pool)
        .await?;

        Ok(entries)
    }

    /// Finds the entry produced by a provider event, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_source_event(&self, event_id: &str) -> Result<Option<AuditLogEntry>> {
        let entry = sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT id, action, details, user_name, source_event_id, "timestamp"
            FROM audit_logs
            WHERE source_event_id = $1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(entry)
    }

    /// Counts all entries.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs").fetch_one(&*self.pool).await?;

        Ok(count)
    }
}

#[async_trait]
impl AuditStore for Repository {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntryId> {
        self.create(&entry).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuditLogEntry>> {
        self.find_recent(limit).await
    }

    async fn contains_source_event(&self, event_id: &str) -> Result<bool> {
        Ok(self.find_by_source_event(event_id).await?.is_some())
    }
}
