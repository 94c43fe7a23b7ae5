//! Tree Materialization
//!
//! Turns a flat snapshot of records into the ordered groups the page renders:
//!
//! 1. Partition children by `pageOrder`
//! 2. Walk partitions in ascending `pageOrder`
//! 3. Sort each partition by `nestedOrder`, decode its records
//! 4. Pick the group layout from the first member's block kind
//!
//! Steps 3 and 4 run lazily, one group per `TreeView::next()`.
//!
//! Nothing is dropped silently. A group whose first member cannot be decoded
//! comes out as `GroupOutcome::Skipped`; individual undecodable children and
//! children without order fields are left out of their group. Every skip is
//! reported to the `Diagnostics` collaborator.

use crate::db::Snapshot;
use crate::models::{BlockKind, OrderEntry, Record, ValidationError};
use serde::Serialize;
use serde_json::Value;
use std::collections::{btree_map, BTreeMap};
use std::sync::{Arc, Mutex};

/// How a page group is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupLayout {
    EventCarousel,
    ProjectList,
    Accordion,
    TextSection,
}

impl GroupLayout {
    pub fn for_kind(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Event => GroupLayout::EventCarousel,
            BlockKind::Project => GroupLayout::ProjectList,
            BlockKind::Accordion => GroupLayout::Accordion,
            BlockKind::Text => GroupLayout::TextSection,
        }
    }
}

/// One render-ready page group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderGroup {
    pub page_order: u32,
    pub layout: GroupLayout,
    /// Members in ascending `nested_order`
    pub children: Vec<Record>,
}

/// Why something was left out of the rendered tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// `data.type` names no known block kind
    UnrecognizedKind {
        key: String,
        page_order: u32,
        kind: String,
    },
    /// The record could not be decoded for another reason
    MalformedRecord {
        key: String,
        page_order: u32,
        reason: String,
    },
    /// The record has no usable order fields and belongs to no group
    Unordered { key: String, reason: String },
}

impl SkipReason {
    pub fn key(&self) -> &str {
        match self {
            SkipReason::UnrecognizedKind { key, .. }
            | SkipReason::MalformedRecord { key, .. }
            | SkipReason::Unordered { key, .. } => key,
        }
    }

    fn from_decode_error(key: &str, page_order: u32, value: &Value, error: ValidationError) -> Self {
        let discriminator = value
            .get("data")
            .and_then(|data| data.get("type"))
            .and_then(Value::as_str);
        match discriminator {
            Some(kind) if kind.parse::<BlockKind>().is_err() => SkipReason::UnrecognizedKind {
                key: key.to_string(),
                page_order,
                kind: kind.to_string(),
            },
            _ => SkipReason::MalformedRecord {
                key: key.to_string(),
                page_order,
                reason: error.to_string(),
            },
        }
    }
}

/// Materialization result for one page group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    Rendered(RenderGroup),
    /// Whole group left out; the reason concerns its first member
    Skipped(SkipReason),
}

impl GroupOutcome {
    pub fn rendered(&self) -> Option<&RenderGroup> {
        match self {
            GroupOutcome::Rendered(group) => Some(group),
            GroupOutcome::Skipped(_) => None,
        }
    }
}

/// Receives everything materialization leaves out
pub trait Diagnostics: Send + Sync {
    /// `whole_group` is set when the skip removed an entire page group
    fn skipped(&self, path: &str, reason: &SkipReason, whole_group: bool);
}

/// Logs skips at `warn`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn skipped(&self, path: &str, reason: &SkipReason, whole_group: bool) {
        if whole_group {
            tracing::warn!("Skipping page group under '{}': {:?}", path, reason);
        } else {
            tracing::warn!("Skipping record under '{}': {:?}", path, reason);
        }
    }
}

/// Keeps every skip in memory
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    skipped: Mutex<Vec<SkipReason>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips reported so far, oldest first
    pub fn skipped_reasons(&self) -> Vec<SkipReason> {
        match self.skipped.lock() {
            Ok(skipped) => skipped.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn skipped(&self, _path: &str, reason: &SkipReason, _whole_group: bool) {
        match self.skipped.lock() {
            Ok(mut skipped) => skipped.push(reason.clone()),
            Err(poisoned) => poisoned.into_inner().push(reason.clone()),
        }
    }
}

/// Builds `TreeView`s from snapshots
#[derive(Clone)]
pub struct TreeMaterializer {
    diagnostics: Arc<dyn Diagnostics>,
}

impl Default for TreeMaterializer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TreeMaterializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeMaterializer").finish_non_exhaustive()
    }
}

impl TreeMaterializer {
    /// Materializer reporting skips through `tracing`
    pub fn new() -> Self {
        Self::with_diagnostics(Arc::new(TracingDiagnostics))
    }

    pub fn with_diagnostics(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self { diagnostics }
    }

    /// Lazily materialize every page group in `snapshot`
    pub fn materialize<'a>(&'a self, snapshot: &'a Snapshot) -> TreeView<'a> {
        let mut partitions: BTreeMap<u32, Vec<(OrderEntry<'a>, &'a Value)>> = BTreeMap::new();

        for (key, value) in snapshot.children() {
            match OrderEntry::from_value(key, value) {
                Ok(entry) => partitions
                    .entry(entry.page_order)
                    .or_default()
                    .push((entry, value)),
                Err(e) => self.diagnostics.skipped(
                    snapshot.path(),
                    &SkipReason::Unordered {
                        key: key.to_string(),
                        reason: e.to_string(),
                    },
                    false,
                ),
            }
        }

        TreeView {
            path: snapshot.path(),
            partitions: partitions.into_iter(),
            diagnostics: self.diagnostics.as_ref(),
        }
    }

    /// Only the groups that render, in page order
    pub fn render(&self, snapshot: &Snapshot) -> Vec<RenderGroup> {
        self.materialize(snapshot)
            .filter_map(|outcome| match outcome {
                GroupOutcome::Rendered(group) => Some(group),
                GroupOutcome::Skipped(_) => None,
            })
            .collect()
    }
}

/// Ordered page groups of one snapshot, produced one at a time
pub struct TreeView<'a> {
    path: &'a str,
    partitions: btree_map::IntoIter<u32, Vec<(OrderEntry<'a>, &'a Value)>>,
    diagnostics: &'a dyn Diagnostics,
}

impl TreeView<'_> {
    fn build_group(&self, page_order: u32, mut members: Vec<(OrderEntry<'_>, &Value)>) -> GroupOutcome {
        members.sort_by(|(a, _), (b, _)| {
            a.nested_order
                .cmp(&b.nested_order)
                .then_with(|| a.key.cmp(b.key))
        });

        let mut children = Vec::with_capacity(members.len());
        let mut layout = None;

        for (index, (entry, value)) in members.into_iter().enumerate() {
            match Record::from_value(self.path, entry.key, value) {
                Ok(record) => {
                    if index == 0 {
                        layout = Some(GroupLayout::for_kind(record.kind()));
                    }
                    children.push(record);
                }
                Err(e) => {
                    let reason = SkipReason::from_decode_error(entry.key, page_order, value, e);
                    if index == 0 {
                        self.diagnostics.skipped(self.path, &reason, true);
                        return GroupOutcome::Skipped(reason);
                    }
                    self.diagnostics.skipped(self.path, &reason, false);
                }
            }
        }

        match layout {
            Some(layout) => GroupOutcome::Rendered(RenderGroup {
                page_order,
                layout,
                children,
            }),
            // Partitions are never empty; the first member either decoded or returned above
            None => GroupOutcome::Skipped(SkipReason::MalformedRecord {
                key: String::new(),
                page_order,
                reason: "empty group".to_string(),
            }),
        }
    }
}

impl Iterator for TreeView<'_> {
    type Item = GroupOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        let (page_order, members) = self.partitions.next()?;
        Some(self.build_group(page_order, members))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.partitions.size_hint()
    }
}
