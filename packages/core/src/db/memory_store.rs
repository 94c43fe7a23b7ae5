//! In-Process Block Store
//!
//! `MemoryStore` keeps the whole tree as one JSON document and implements the
//! `BlockStore` contract on top of it:
//!
//! - Batches are validated, checked against their revision preconditions and
//!   applied under a single lock, so readers and subscribers only ever observe
//!   fully-old or fully-new state.
//! - Subscriber snapshots are produced inside the same critical section as the
//!   write that caused them.
//! - Each applied batch is announced as a `ChangeEvent` on a broadcast channel.
//! - Empty objects are pruned after deletes, as a realtime tree would.
//!
//! The store can be switched offline to exercise `StoreError::Unavailable`.

use super::events::ChangeEvent;
use super::{path, BlockStore, Snapshot, StoreError, Subscription, WriteBatch};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use uuid::Uuid;

/// Broadcast channel capacity for change events.
///
/// Lagging observers only miss intermediate notifications; the store state is
/// always read fresh.
pub const DEFAULT_CHANGE_CHANNEL_CAPACITY: usize = 128;

struct Subscriber {
    path: String,
    tx: mpsc::UnboundedSender<Snapshot>,
}

/// Revisions kept per path segment
///
/// `written` is the revision of the last batch that wrote this exact path, or
/// deleted a child that was folded back into it. `subtree` is the newest
/// revision written at or below it. Only live paths and their ancestors keep a
/// node, so the tree never outgrows the document.
#[derive(Debug, Default)]
struct RevisionNode {
    written: u64,
    subtree: u64,
    children: HashMap<String, RevisionNode>,
}

impl RevisionNode {
    /// Newest revision written at an ancestor of `target`, at `target` or below it
    fn revision_of(&self, target: &str) -> u64 {
        let mut node = self;
        let mut newest = node.written;
        for segment in path::segments(target) {
            match node.children.get(segment) {
                Some(child) => {
                    node = child;
                    newest = newest.max(node.written);
                }
                None => return newest,
            }
        }
        newest.max(node.subtree)
    }

    fn touch(&mut self, segments: &[&str], revision: u64) -> &mut RevisionNode {
        let mut node = self;
        node.subtree = node.subtree.max(revision);
        for segment in segments {
            node = node.children.entry(segment.to_string()).or_default();
            node.subtree = node.subtree.max(revision);
        }
        node
    }

    /// Older revisions below a freshly written path are shadowed by it
    fn record_set(&mut self, segments: &[&str], revision: u64) {
        let node = self.touch(segments, revision);
        node.written = revision;
        node.children.clear();
    }

    /// The deleted path is dropped and its revision lands on the parent
    fn record_delete(&mut self, segments: &[&str], revision: u64) {
        let Some((last, parents)) = segments.split_last() else {
            self.record_set(segments, revision);
            return;
        };
        let parent = self.touch(parents, revision);
        parent.children.remove(*last);
        parent.written = revision;
    }

    /// Drop the childless node at `segments`, folding its revision into the parent
    fn fold_leaf(&mut self, segments: &[&str]) -> bool {
        let Some((last, parents)) = segments.split_last() else {
            return false;
        };
        let mut parent = self;
        for segment in parents {
            match parent.children.get_mut(*segment) {
                Some(child) => parent = child,
                None => return false,
            }
        }
        match parent.children.get(*last) {
            Some(leaf) if leaf.children.is_empty() => {
                let written = leaf.written;
                parent.children.remove(*last);
                parent.written = parent.written.max(written);
                true
            }
            _ => false,
        }
    }

    /// Number of tracked paths below this node
    #[cfg(test)]
    fn len(&self) -> usize {
        self.children.values().map(|child| 1 + child.len()).sum()
    }
}

struct StoreState {
    root: Value,
    revision: u64,
    revisions: RevisionNode,
    subscribers: Vec<Subscriber>,
}

impl StoreState {
    fn lookup(&self, segments: &[&str]) -> Option<&Value> {
        let mut node = &self.root;
        for segment in segments {
            node = node.get(*segment)?;
        }
        Some(node)
    }

    fn get(&self, target: &str) -> Value {
        let segments: Vec<&str> = path::segments(target).collect();
        self.lookup(&segments).cloned().unwrap_or(Value::Null)
    }

    fn revision_of(&self, target: &str) -> u64 {
        self.revisions.revision_of(target)
    }

    fn snapshot(&self, target: &str) -> Snapshot {
        Snapshot::new(target, self.revision_of(target), self.get(target))
    }

    fn set(&mut self, target: &str, value: Value, revision: u64) {
        let segments: Vec<&str> = path::segments(target).collect();
        self.revisions.record_set(&segments, revision);
        let Some((last, parents)) = segments.split_last() else {
            return;
        };

        let mut node = &mut self.root;
        for segment in parents {
            node = ensure_object(node)
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        ensure_object(node).insert(last.to_string(), value);
    }

    fn delete(&mut self, target: &str, revision: u64) {
        let segments: Vec<&str> = path::segments(target).collect();
        remove_and_prune(&mut self.root, &segments);
        self.revisions.record_delete(&segments, revision);

        // Ancestors pruned from the document lose their revision node too
        for depth in (1..segments.len()).rev() {
            let ancestor = &segments[..depth];
            if self.lookup(ancestor).is_some() || !self.revisions.fold_leaf(ancestor) {
                break;
            }
        }
    }
}

/// Turn `node` into an object (dropping a scalar) and borrow its map
fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced by an object"),
    }
}

/// Remove the value at `segments` and drop objects left empty on the way up
fn remove_and_prune(node: &mut Value, segments: &[&str]) {
    let Value::Object(map) = node else {
        return;
    };
    match segments {
        [] => {}
        [last] => {
            map.remove(*last);
        }
        [first, rest @ ..] => {
            if let Some(child) = map.get_mut(*first) {
                remove_and_prune(child, rest);
                if child.as_object().is_some_and(Map::is_empty) {
                    map.remove(*first);
                }
            }
        }
    }
}

struct Inner {
    state: Mutex<StoreState>,
    available: AtomicBool,
    change_tx: broadcast::Sender<ChangeEvent>,
}

/// JSON-document store living in process memory
///
/// Cloning is cheap and every clone shares the same tree.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANGE_CHANNEL_CAPACITY)
    }

    /// Store with a custom change-event channel capacity
    pub fn with_capacity(change_channel_capacity: usize) -> Self {
        Self::with_root(Value::Object(Map::new()), change_channel_capacity)
    }

    /// Store pre-populated with `root` (must be a JSON object)
    pub fn from_value(root: Value) -> Result<Self, StoreError> {
        if !root.is_object() {
            return Err(StoreError::invalid_path("", "the root must be an object"));
        }
        Ok(Self::with_root(root, DEFAULT_CHANGE_CHANNEL_CAPACITY))
    }

    fn with_root(root: Value, change_channel_capacity: usize) -> Self {
        let (change_tx, _) = broadcast::channel(change_channel_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(StoreState {
                    root,
                    revision: 0,
                    revisions: RevisionNode::default(),
                    subscribers: Vec::new(),
                }),
                available: AtomicBool::new(true),
                change_tx,
            }),
        }
    }

    /// Simulate the store going offline (`false`) or coming back (`true`)
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// Receive one `ChangeEvent` per applied batch
    pub fn subscribe_to_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.change_tx.subscribe()
    }

    /// Current store revision (number of applied batches)
    pub async fn revision(&self) -> u64 {
        self.inner.state.lock().await.revision
    }

    /// Copy of the whole tree
    pub async fn dump(&self) -> Value {
        self.inner.state.lock().await.root.clone()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::unavailable("memory store is offline"))
        }
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn read(&self, target: &str) -> Result<Snapshot, StoreError> {
        self.ensure_available()?;
        path::validate(target, true)?;
        let state = self.inner.state.lock().await;
        Ok(state.snapshot(target))
    }

    async fn write(&self, batch: WriteBatch) -> Result<u64, StoreError> {
        self.ensure_available()?;
        for written in batch.updates().keys() {
            path::validate(written, false)?;
        }
        if let Some((a, b)) = batch.overlapping_paths() {
            return Err(StoreError::invalid_path(
                a,
                format!("overlaps '{}' in the same batch", b),
            ));
        }

        let mut state = self.inner.state.lock().await;
        for (guarded, expected) in batch.preconditions() {
            let actual = state.revision_of(guarded);
            if actual != *expected {
                tracing::debug!(
                    "Rejecting batch: '{}' moved from revision {} to {}",
                    guarded,
                    expected,
                    actual
                );
                return Err(StoreError::conflict(guarded.clone(), *expected, actual));
            }
        }

        let (updates, _) = batch.into_parts();
        if updates.is_empty() {
            return Ok(state.revision);
        }

        state.revision += 1;
        let revision = state.revision;
        let mut deletions = 0;
        for (written, value) in &updates {
            match value {
                Some(value) => state.set(written, value.clone(), revision),
                None => {
                    state.delete(written, revision);
                    deletions += 1;
                }
            }
        }

        let paths: Vec<String> = updates.into_keys().collect();
        let mut subscribers = std::mem::take(&mut state.subscribers);
        subscribers.retain(|sub| {
            if !paths.iter().any(|p| path::is_related(p, &sub.path)) {
                return !sub.tx.is_closed();
            }
            sub.tx.send(state.snapshot(&sub.path)).is_ok()
        });
        state.subscribers = subscribers;
        drop(state);

        // No receivers is fine
        let _ = self.inner.change_tx.send(ChangeEvent {
            revision,
            paths,
            deletions,
            applied_at: Utc::now(),
        });

        Ok(revision)
    }

    async fn subscribe(&self, target: &str) -> Result<Subscription, StoreError> {
        self.ensure_available()?;
        path::validate(target, true)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.inner.state.lock().await;
        let normalized = path::normalize(target);
        // Receiver is alive in this scope
        let _ = tx.send(state.snapshot(&normalized));
        state.subscribers.push(Subscriber {
            path: normalized.clone(),
            tx,
        });
        Ok(Subscription::new(normalized, rx))
    }

    fn allocate_key(&self, _parent_path: &str) -> String {
        Uuid::new_v4().simple().to_string()
    }
}
