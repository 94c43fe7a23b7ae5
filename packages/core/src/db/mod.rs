//! Store Layer
//!
//! The editing core persists records in a schemaless realtime key-value tree
//! addressed by `/`-separated paths. This module holds:
//!
//! - The `BlockStore` contract the rest of the crate is written against
//! - `MemoryStore`, an in-process implementation used by tests and tools
//! - The dense order engine computing order writes from a snapshot
//! - Path helpers and change events
//!
//! # Architecture
//!
//! Services never assume a concrete backend. Anything that can read a
//! subtree, apply a multi-path batch atomically, push snapshots to listeners
//! and allocate child keys can stand behind `BlockStore`. Read-then-write
//! sequences stay safe through per-path revisions checked at write time.

mod block_store;
pub mod dense_ordering;
mod error;
pub mod events;
mod memory_store;
pub mod path;

pub use block_store::{BlockStore, Snapshot, Subscription, WriteBatch};
pub use dense_ordering::{
    DenseOrderCalculator, DensityViolation, Direction, OrderField, OrderWrites,
};
pub use error::StoreError;
pub use events::ChangeEvent;
pub use memory_store::{MemoryStore, DEFAULT_CHANGE_CHANNEL_CAPACITY};
