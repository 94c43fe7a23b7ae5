//! Store Change Events
//!
//! Every applied batch is announced once on a broadcast channel, after the
//! batch is visible to readers. Subscribers that only care about "something
//! changed" (loggers, dev tools) listen here instead of holding a path
//! subscription.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One applied atomic batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Store revision produced by the batch
    pub revision: u64,
    /// Normalized paths written by the batch (sets and deletes)
    pub paths: Vec<String>,
    /// Number of those paths that were deletions
    pub deletions: usize,
    pub applied_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Whether the batch touched `path`, one of its ancestors or descendants
    pub fn touches(&self, path: &str) -> bool {
        self.paths.iter().any(|p| super::path::is_related(p, path))
    }
}
