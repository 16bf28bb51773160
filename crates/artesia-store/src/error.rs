//! Error types for Artesia storage.

use artesia_core::{BalanceError, TransitionError};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Its identifier.
        id: String,
    },

    /// Record already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// Kind of record.
        entity: &'static str,
        /// Its identifier.
        id: String,
    },

    /// Balance arithmetic rejected the change; nothing was written.
    #[error(transparent)]
    Balance(#[from] BalanceError),

    /// The conversion is not in a state that allows the change.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl StoreError {
    pub(crate) fn account_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "account",
            id: id.to_string(),
        }
    }

    pub(crate) fn conversion_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "conversion",
            id: id.to_string(),
        }
    }

    /// Check if the error is transient infrastructure trouble rather than a
    /// rejected operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}
