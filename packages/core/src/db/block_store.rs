//! BlockStore Trait - Collaborator Store Abstraction
//!
//! The editing core never talks to a concrete database. It consumes this
//! contract, which mirrors a schemaless realtime key-value tree:
//!
//! - `read(path)` returns everything under a path, or an empty snapshot
//! - `write(batch)` applies a multi-path batch atomically (`None` deletes)
//! - `subscribe(path)` pushes the current snapshot, then one snapshot per
//!   atomic batch that touches the path
//! - `allocate_key(parent)` hands out a fresh child key without writing
//!
//! # Revisions
//!
//! Every snapshot carries the revision of the last batch that touched its path
//! (the path itself, an ancestor or a descendant). A batch may carry revision
//! preconditions; if any of them no longer holds the whole batch is rejected
//! with `StoreError::Conflict` and nothing is applied. This is what lets the
//! mutation façade run read-then-write sequences without losing updates.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pagetree_core::db::{BlockStore, MemoryStore, WriteBatch};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), pagetree_core::db::StoreError> {
//! let store = MemoryStore::new();
//! let snapshot = store.read("pages/homepage/components").await?;
//!
//! let mut batch = WriteBatch::new();
//! batch.set("pages/homepage/components/k1/nestedOrder", json!(0));
//! batch.expect_revision("pages/homepage/components", snapshot.revision());
//! store.write(batch).await?;
//! # Ok(())
//! # }
//! ```

use super::{path, StoreError};
use crate::models::{OrderEntry, Record, ValidationError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Point-in-time view of everything stored under one path
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    path: String,
    revision: u64,
    value: Value,
}

impl Snapshot {
    pub fn new(path: impl AsRef<str>, revision: u64, value: Value) -> Self {
        Self {
            path: path::normalize(path.as_ref()),
            revision,
            value,
        }
    }

    /// Snapshot of a path that holds nothing
    pub fn empty(path: impl AsRef<str>) -> Self {
        Self::new(path, 0, Value::Null)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn is_empty(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Direct children as `(key, value)` pairs, in key order
    pub fn children(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.value
            .as_object()
            .into_iter()
            .flat_map(|map| map.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Order fields of every child; children without them are logged and left out
    pub fn order_entries(&self) -> Vec<OrderEntry<'_>> {
        self.children()
            .filter_map(|(key, value)| match OrderEntry::from_value(key, value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Ignoring unordered child under '{}': {}", self.path, e);
                    None
                }
            })
            .collect()
    }

    /// Decode every child as a record
    ///
    /// Returns the decoded records and one error per child that failed.
    pub fn records(&self) -> (Vec<Record>, Vec<ValidationError>) {
        let mut records = Vec::new();
        let mut errors = Vec::new();
        for (key, value) in self.children() {
            match Record::from_value(&self.path, key, value) {
                Ok(record) => records.push(record),
                Err(e) => errors.push(e),
            }
        }
        (records, errors)
    }

    /// Decode the whole value; `None` when the path is empty
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        if self.value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(self.value.clone())?))
    }
}

/// Multi-path write applied as one atomic batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    updates: BTreeMap<String, Option<Value>>,
    preconditions: BTreeMap<String, u64>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` at `path` (a JSON `null` deletes)
    pub fn set(&mut self, path: impl AsRef<str>, value: Value) -> &mut Self {
        let value = if value.is_null() { None } else { Some(value) };
        self.updates.insert(path::normalize(path.as_ref()), value);
        self
    }

    /// Remove whatever is stored at `path`
    pub fn delete(&mut self, path: impl AsRef<str>) -> &mut Self {
        self.updates.insert(path::normalize(path.as_ref()), None);
        self
    }

    /// Reject the batch unless `path` is still at `revision`
    pub fn expect_revision(&mut self, path: impl AsRef<str>, revision: u64) -> &mut Self {
        self.preconditions
            .insert(path::normalize(path.as_ref()), revision);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn updates(&self) -> &BTreeMap<String, Option<Value>> {
        &self.updates
    }

    pub fn preconditions(&self) -> &BTreeMap<String, u64> {
        &self.preconditions
    }

    /// Value queued for `path`, if any (`Some(None)` = queued deletion)
    pub fn get(&self, path: &str) -> Option<Option<&Value>> {
        self.updates.get(&path::normalize(path)).map(Option::as_ref)
    }

    pub fn into_parts(self) -> (BTreeMap<String, Option<Value>>, BTreeMap<String, u64>) {
        (self.updates, self.preconditions)
    }

    /// First pair of queued paths where one contains the other
    pub fn overlapping_paths(&self) -> Option<(&str, &str)> {
        let paths: Vec<&str> = self.updates.keys().map(String::as_str).collect();
        for (i, a) in paths.iter().enumerate() {
            for b in &paths[i + 1..] {
                if path::is_related(a, b) {
                    return Some((*a, *b));
                }
            }
        }
        None
    }
}

/// Push subscription to one path
///
/// The first `next()` resolves immediately with the current snapshot. Dropping
/// the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    path: String,
    rx: mpsc::UnboundedReceiver<Snapshot>,
}

impl Subscription {
    pub fn new(path: impl AsRef<str>, rx: mpsc::UnboundedReceiver<Snapshot>) -> Self {
        Self {
            path: path::normalize(path.as_ref()),
            rx,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next snapshot; `None` once the store has gone away
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<Snapshot> {
        UnboundedReceiverStream::new(self.rx)
    }
}

/// Collaborator store consumed by the editing core
///
/// Implementations must be `Send + Sync`; futures are moved between tasks.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Everything under `path`; an empty snapshot when nothing is there
    async fn read(&self, path: &str) -> Result<Snapshot, StoreError>;

    /// Apply `batch` atomically and return the new store revision
    ///
    /// Either every update is applied and subscribers see the fully-new state,
    /// or nothing is applied.
    async fn write(&self, batch: WriteBatch) -> Result<u64, StoreError>;

    /// Register a push listener on `path`
    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;

    /// Fresh, never reused child key under `parent_path`
    fn allocate_key(&self, parent_path: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_empty() {
        assert!(Snapshot::empty("pages/homepage").is_empty());
        assert!(Snapshot::new("p", 1, json!({})).is_empty());
        assert!(!Snapshot::new("p", 1, json!({ "k": 1 })).is_empty());
        assert_eq!(Snapshot::empty("/pages/homepage/").path(), "pages/homepage");
    }

    #[test]
    fn test_order_entries_skip_unordered_children() {
        let snapshot = Snapshot::new(
            "p",
            3,
            json!({
                "a": { "pageOrder": 0, "nestedOrder": 0, "data": { "type": "text" } },
                "b": { "title": "stray" },
                "c": { "pageOrder": 1, "nestedOrder": 0, "data": { "type": "bogus" } }
            }),
        );

        let entries = snapshot.order_entries();
        let keys: Vec<&str> = entries.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["a", "c"]);

        let (records, errors) = snapshot.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "a");
        assert_eq!(records[0].path, "p");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_decode() {
        let snapshot = Snapshot::new("users/u1", 1, json!({ "name": "Dana" }));
        let decoded: Option<serde_json::Map<String, Value>> = snapshot.decode().unwrap();
        assert_eq!(decoded.unwrap()["name"], "Dana");

        let empty: Option<Value> = Snapshot::empty("users/u2").decode().unwrap();
        assert!(empty.is_none());
    }

    #[test]
    fn test_write_batch_normalizes_and_detects_overlap() {
        let mut batch = WriteBatch::new();
        batch
            .set("/p/k1/nestedOrder/", json!(1))
            .set("p/k2", Value::Null)
            .expect_revision("p/", 4);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.get("p/k1/nestedOrder"), Some(Some(&json!(1))));
        assert_eq!(batch.get("p/k2"), Some(None));
        assert_eq!(batch.preconditions().get("p"), Some(&4));
        assert!(batch.overlapping_paths().is_none());

        batch.delete("p/k1");
        assert_eq!(batch.overlapping_paths(), Some(("p/k1", "p/k1/nestedOrder")));
    }
}
