//! Error types for audit persistence and request handling.
//!
//! `CoreError` describes what went wrong inside a store. `CarelogError` is
//! the request-level taxonomy: every variant carries a stable code so
//! clients and operators can tell failures apart without parsing messages.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Storage-layer error.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database operation failed or the database could not be reached.
    #[error("Database error: {0}")]
    Database(String),

    /// Entity not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Constraint violation.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested entry not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::ConstraintViolation(format!("unique constraint violation: {db_err}"))
            },
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                Self::ConstraintViolation(format!("check constraint violation: {db_err}"))
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Request-level errors with codes.
#[derive(Debug, Error)]
pub enum CarelogError {
    // Client errors (E1001-E1005)
    /// Webhook signature missing, malformed or not matching (E1001).
    #[error("{reason}")]
    InvalidSignature {
        /// Why verification failed. Never contains the secret.
        reason: String,
    },

    /// Authentic webhook body that is not a provider event envelope (E1002).
    #[error("{reason}")]
    InvalidPayload {
        /// Why parsing failed.
        reason: String,
    },

    /// Missing, invalid or expired bearer token (E1003).
    #[error("{reason}")]
    Unauthorized {
        /// Client-facing reason. Never contains the token.
        reason: String,
    },

    /// HTTP method not supported by the route (E1004).
    #[error("Method Not Allowed")]
    UnsupportedMethod {
        /// The method that was used.
        method: String,
    },

    /// Request input failed validation (E1005).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // System errors (E3001-E3002)
    /// Durable store unreachable or rejected the operation (E3001).
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Request did not complete within the configured timeout (E3002).
    #[error("Request timed out")]
    Timeout,

    /// Generic error for wrapping anything unexpected.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CarelogError {
    /// Returns the error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSignature { .. } => "E1001",
            Self::InvalidPayload { .. } => "E1002",
            Self::Unauthorized { .. } => "E1003",
            Self::UnsupportedMethod { .. } => "E1004",
            Self::InvalidInput(_) => "E1005",
            Self::StorageUnavailable(_) => "E3001",
            Self::Timeout => "E3002",
            Self::Other(_) => "E9999",
        }
    }

    /// Returns whether the caller is at fault.
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::StorageUnavailable(_) | Self::Timeout | Self::Other(_))
    }

    /// Shorthand for an [`CarelogError::InvalidSignature`].
    pub fn invalid_signature(reason: impl Into<String>) -> Self {
        Self::InvalidSignature { reason: reason.into() }
    }

    /// Shorthand for an [`CarelogError::InvalidPayload`].
    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        Self::InvalidPayload { reason: reason.into() }
    }

    /// Shorthand for an [`CarelogError::Unauthorized`].
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized { reason: reason.into() }
    }
}

impl From<CoreError> for CarelogError {
    fn from(err: CoreError) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}
