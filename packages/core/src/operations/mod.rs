//! Block Operation Types
//!
//! Supporting types for the mutation façade in `services`: the error type
//! surfaced to callers, the conflict retry policy and the small value types
//! operations return.

mod error;
pub mod retry;

pub use error::BlockOperationError;
pub use retry::RetryPolicy;

/// What a delete actually removed
///
/// # Examples
///
/// ```rust
/// # use pagetree_core::operations::DeleteOutcome;
/// let outcome = DeleteOutcome::default();
/// assert!(!outcome.group_removed);
/// assert!(outcome.is_noop());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Keys cleared from the store
    pub removed: Vec<String>,
    /// Whether the page group disappeared and the groups above it moved down
    pub group_removed: bool,
    /// Number of surviving records whose order value was rewritten
    pub reordered: usize,
}

impl DeleteOutcome {
    /// Nothing was there to delete
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
    }
}
