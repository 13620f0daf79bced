//! Storage error types for the blood bank storage abstraction layer.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested record was not found.
    #[error("Record not found: {table}/{id}")]
    NotFound {
        /// The table the record was looked up in.
        table: String,
        /// The record identifier.
        id: String,
    },

    /// A record with this identity exists with a different payload.
    ///
    /// Imports are idempotent for byte-identical payloads; a conflicting
    /// payload for an existing identity is rejected, never overwritten.
    #[error("Record conflict: {table}/{id} already exists with different content")]
    Conflict {
        /// The table holding the conflicting record.
        table: String,
        /// The record identifier.
        id: String,
    },

    /// A sync start was requested while the type is already syncing.
    #[error("Sync already in progress for type {sync_type}")]
    SyncInProgress {
        /// The contended sync type.
        sync_type: String,
    },

    /// An internal storage error occurred.
    #[error("Internal storage error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            table: table.into(),
            id: id.into(),
        }
    }

    /// Creates a new `SyncInProgress` error.
    #[must_use]
    pub fn sync_in_progress(sync_type: impl Into<String>) -> Self {
        Self::SyncInProgress {
            sync_type: sync_type.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a conflict error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` if this is a concurrency conflict on a sync-type lock.
    #[must_use]
    pub fn is_sync_in_progress(&self) -> bool {
        matches!(self, Self::SyncInProgress { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::SyncInProgress { .. } => ErrorCategory::Concurrency,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Record not found.
    NotFound,
    /// Identity conflict.
    Conflict,
    /// Concurrent sync start rejected.
    Concurrency,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Concurrency => write!(f, "concurrency"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
