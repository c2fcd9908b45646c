//! Core domain models, payment event classification and audit storage.
//!
//! Provides the append-only audit trail, the typed view of verified payment
//! provider events, and the error taxonomy shared by the HTTP layer. The
//! durable log is the only shared state; every other type here is built per
//! request and dropped afterwards.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod models;
pub mod recorder;
pub mod storage;
pub mod time;

pub use error::{CarelogError, CoreError, Result};
pub use events::{classify, Classification, PaymentEvent, PaymentEventKind, ProviderEvent};
pub use models::{AuditEntryId, AuditLogEntry, NewAuditEntry};
pub use recorder::{AuditRecorder, RECENT_ENTRIES_LIMIT};
pub use storage::AuditStore;
pub use time::{Clock, RealClock, TestClock};
