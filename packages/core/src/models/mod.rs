//! Data Models
//!
//! This module contains the data structures shared by every layer of PageTree:
//!
//! - `Record` - One content block as it lives in the store (position + payload)
//! - `BlockPayload` - Tagged union of the content kinds (event, project, accordion, text)
//! - `OrderEntry` / `Ordered` - Order-only view consumed by the dense order engine
//! - `AccessPolicy` - Per-session edit rights derived from the user whitelist
//! - `TemplateRegistry` - Default payloads used when a block is added
//!
//! Positions are never stored as pointers. A record's place in the page is fully
//! determined by `(path, page_order, nested_order)`.

mod access;
mod block;
mod record;
mod template;

pub use access::{AccessPolicy, UserProfile, ADMINISTRATOR_LEVEL};
pub use block::{
    AccordionBlock, BlockKind, BlockPayload, EventBlock, ProjectBlock, TextBlock, ValidationError,
};
pub use record::{OrderEntry, Ordered, Record, RecordRef, NESTED_ORDER_FIELD, PAGE_ORDER_FIELD};
pub use template::TemplateRegistry;
