//! Store Error Types
//!
//! Errors raised at the collaborator-store boundary. Reads of missing paths are
//! not errors; they return an empty snapshot.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store rejected the call (offline, permission, transport)
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    /// A revision precondition of a write no longer holds
    #[error("Revision conflict at '{path}': expected revision {expected}, current is {actual}")]
    Conflict {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// Malformed path or overlapping paths inside one batch
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A stored value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn conflict(path: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::Conflict {
            path: path.into(),
            expected,
            actual,
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether re-reading and retrying the operation can succeed
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            StoreError::unavailable("offline").to_string(),
            "Store unavailable: offline"
        );
        assert_eq!(
            StoreError::conflict("pages/homepage/components", 3, 5).to_string(),
            "Revision conflict at 'pages/homepage/components': expected revision 3, current is 5"
        );
    }

    #[test]
    fn test_is_conflict() {
        assert!(StoreError::conflict("p", 1, 2).is_conflict());
        assert!(!StoreError::unavailable("x").is_conflict());
    }
}
