//! Error types for block mutations
//!
//! Every failure a façade operation can surface to the UI layer. The dense
//! order engine never fails; everything here comes from the store boundary,
//! the template source, the access policy or payload validation.

use crate::db::StoreError;
use crate::models::{BlockKind, ValidationError};
use thiserror::Error;

/// Errors that can occur during block mutations
///
/// A failed mutation leaves the stored tree untouched: each operation is one
/// atomic batch, so either everything was written or nothing was.
///
/// # Examples
///
/// ```rust
/// use pagetree_core::models::BlockKind;
/// use pagetree_core::operations::BlockOperationError;
///
/// let err = BlockOperationError::template_not_found(BlockKind::Event);
/// assert_eq!(err.to_string(), "No payload template for block kind 'event'");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlockOperationError {
    /// The store rejected a read or write
    ///
    /// Logged at the façade boundary and abandoned without retry.
    #[error("Store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// No payload template registered for the requested kind
    #[error("No payload template for block kind '{kind}'")]
    TemplateNotFound { kind: BlockKind },

    /// Concurrent writers kept invalidating the snapshot
    ///
    /// The operation was retried `attempts` times against fresh snapshots
    /// and every write was rejected by a revision precondition.
    #[error("Version conflict at '{path}' after {attempts} attempt(s)")]
    VersionConflict { path: String, attempts: usize },

    /// The session's access policy does not allow the mutation
    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    /// Payload field edit rejected
    #[error("Invalid field: {0}")]
    InvalidField(ValidationError),

    /// The stored record itself no longer decodes
    #[error("Stored record '{key}' is corrupt: {reason}")]
    CorruptRecord { key: String, reason: String },

    /// A block can only join an existing group or open the next one
    #[error("Page order {page_order} is past the next free group {next}")]
    InvalidPageOrder { page_order: u32, next: u32 },

    /// The referenced record no longer exists
    #[error("Record '{key}' not found under '{path}'")]
    RecordNotFound { path: String, key: String },

    /// Any other store-level failure (bad path, encoding)
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl BlockOperationError {
    pub fn store_unavailable(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }

    pub fn template_not_found(kind: BlockKind) -> Self {
        Self::TemplateNotFound { kind }
    }

    pub fn version_conflict(path: impl Into<String>, attempts: usize) -> Self {
        Self::VersionConflict {
            path: path.into(),
            attempts,
        }
    }

    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            reason: reason.into(),
        }
    }

    pub fn record_not_found(path: impl Into<String>, key: impl Into<String>) -> Self {
        Self::RecordNotFound {
            path: path.into(),
            key: key.into(),
        }
    }

    /// A stored record under `key` failed to decode
    pub fn corrupt_record(key: impl Into<String>, error: ValidationError) -> Self {
        let reason = match error {
            ValidationError::MalformedRecord { reason, .. } => reason,
            other => other.to_string(),
        };
        Self::CorruptRecord {
            key: key.into(),
            reason,
        }
    }

    pub fn invalid_page_order(page_order: u32, next: u32) -> Self {
        Self::InvalidPageOrder { page_order, next }
    }

    /// Whether the same call could succeed against a fresh snapshot
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_conflict())
    }
}

impl From<StoreError> for BlockOperationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable { reason } => Self::StoreUnavailable { reason },
            other => Self::Store(other),
        }
    }
}

impl From<ValidationError> for BlockOperationError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::MalformedRecord { key, reason } => Self::CorruptRecord { key, reason },
            other => Self::InvalidField(other),
        }
    }
}
