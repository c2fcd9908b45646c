//! In-memory audit store for tests and local runs.
//!
//! Keeps the same ordering contract as Postgres. Timestamps come from the
//! injected [`Clock`], so tests can control them. Supports failure
//! injection and counts reads to check that a request never reached the
//! store.

use std::sync::{
    atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::AuditStore;
use crate::{
    error::{CoreError, Result},
    models::{AuditEntryId, AuditLogEntry, NewAuditEntry},
    time::{Clock, RealClock},
};

/// In-memory [`AuditStore`].
#[derive(Debug)]
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditLogEntry>>,
    next_id: AtomicI64,
    clock: Arc<dyn Clock>,
    unavailable: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryAuditStore {
    /// Creates an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(RealClock))
    }

    /// Creates an empty store that stamps entries with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            clock,
            unavailable: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        }
    }

    /// Makes every subsequent operation fail with a database error until
    /// reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of read operations served so far, failed ones included.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Returns every entry in insertion order.
    pub async fn snapshot(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::Database("audit store unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntryId> {
        self.check_available()?;

        let mut entries = self.entries.write().await;
        let id = AuditEntryId::from(self.next_id.fetch_add(1, Ordering::SeqCst));
        entries.push(AuditLogEntry {
            id,
            action: entry.action,
            details: entry.details,
            user_name: entry.user_name,
            source_event_id: entry.source_event_id,
            timestamp: self.clock.now(),
        });

        Ok(id)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuditLogEntry>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut entries = self.entries.read().await.clone();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        entries.truncate(limit);

        Ok(entries)
    }

    async fn contains_source_event(&self, event_id: &str) -> Result<bool> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        Ok(self
            .entries
            .read()
            .await
            .iter()
            .any(|entry| entry.source_event_id.as_deref() == Some(event_id)))
    }
}
