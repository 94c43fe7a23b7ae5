//! Business Services
//!
//! This module contains the editing core built on top of the store layer:
//!
//! - `BlockService` - Mutation façade (add, delete, move, field edits, drafts)
//! - `TreeMaterializer` - Snapshot to ordered render groups
//!
//! Services coordinate between the store and the UI layer. The UI calls a
//! façade operation, then observes the effect through a `TreeSubscription`
//! rather than through the operation's return value.

pub mod block_service;
pub mod materializer;

pub use block_service::{BlockService, TreeSubscription};
pub use materializer::{
    Diagnostics, GroupLayout, GroupOutcome, RecordingDiagnostics, RenderGroup, SkipReason,
    TracingDiagnostics, TreeMaterializer, TreeView,
};
