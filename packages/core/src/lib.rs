//! PageTree Core Editing Layer
//!
//! This crate provides the ordered-tree editing core of a department website
//! CMS: content blocks stored as flat records in a realtime key-value tree,
//! ranked by two dense orders, edited through a small mutation façade and
//! materialized into ordered render groups.
//!
//! # Architecture
//!
//! - **Two dense rankings**: `pageOrder` across page groups, `nestedOrder`
//!   inside a group; both always form `0..N` with no gaps or duplicates
//! - **One batch per edit**: every operation is a single atomic multi-path write
//! - **Revision-checked writes**: read-then-write races are detected by the
//!   store and retried from a fresh snapshot
//! - **Store agnostic**: services run against any `BlockStore`
//!
//! # Modules
//!
//! - [`models`] - Records, block payloads, templates, access policy
//! - [`db`] - Store contract, in-process store, dense order engine
//! - [`operations`] - Operation errors, retry policy, delete outcomes
//! - [`services`] - Mutation façade and tree materialization
//! - [`config`] - Editor configuration

pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use config::EditorConfig;
pub use db::{BlockStore, DenseOrderCalculator, Direction, MemoryStore, StoreError};
pub use models::*;
pub use operations::{BlockOperationError, DeleteOutcome, RetryPolicy};
pub use services::*;
