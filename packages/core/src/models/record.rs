//! Record Data Structures
//!
//! A `Record` is one content block stored at `{path}/{key}`:
//!
//! ```json
//! {
//!   "pageOrder": 2,
//!   "nestedOrder": 0,
//!   "data": { "type": "event", "title": "Open House" }
//! }
//! ```
//!
//! `path` is the parent collection (e.g. `pages/homepage/components`) and `key` the
//! store-assigned child key. Neither is serialized; both come from where the
//! value lives in the tree.
//!
//! Records sharing `path` form a page group; records sharing `path` and
//! `page_order` form a sibling group (one carousel, one project list, ...).

use super::{BlockKind, BlockPayload, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stored name of the group order field
pub const PAGE_ORDER_FIELD: &str = "pageOrder";

/// Stored name of the within-group order field
pub const NESTED_ORDER_FIELD: &str = "nestedOrder";

/// Anything that occupies a slot in the two-level ordering
///
/// The dense order engine is generic over this trait so it can run on fully
/// decoded records as well as on order-only projections.
pub trait Ordered {
    fn key(&self) -> &str;
    fn page_order(&self) -> u32;
    fn nested_order(&self) -> u32;
}

/// One content block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Child key under `path` (assigned by the store, never reused)
    #[serde(skip)]
    pub key: String,

    /// Parent collection path
    #[serde(skip)]
    pub path: String,

    /// Dense rank of this record's group among all groups under `path`
    pub page_order: u32,

    /// Dense rank inside the group
    pub nested_order: u32,

    /// Typed content
    pub data: BlockPayload,
}

impl Record {
    pub fn new(
        path: impl Into<String>,
        key: impl Into<String>,
        page_order: u32,
        nested_order: u32,
        data: BlockPayload,
    ) -> Self {
        Self {
            key: key.into(),
            path: path.into(),
            page_order,
            nested_order,
            data,
        }
    }

    /// Decode a stored value found at `{path}/{key}`
    pub fn from_value(path: &str, key: &str, value: &Value) -> Result<Self, ValidationError> {
        let mut record: Record = serde_json::from_value(value.clone()).map_err(|e| {
            ValidationError::MalformedRecord {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;
        record.key = key.to_string();
        record.path = path.to_string();
        Ok(record)
    }

    /// Encode for storage
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn kind(&self) -> BlockKind {
        self.data.kind()
    }

    /// Absolute path of this record (`{path}/{key}`)
    pub fn full_path(&self) -> String {
        crate::db::path::join(&self.path, &self.key)
    }

    /// Handle to this record for façade calls
    pub fn to_ref(&self) -> RecordRef {
        RecordRef {
            path: self.path.clone(),
            key: self.key.clone(),
            page_order: self.page_order,
            nested_order: self.nested_order,
        }
    }
}

impl Ordered for Record {
    fn key(&self) -> &str {
        &self.key
    }

    fn page_order(&self) -> u32 {
        self.page_order
    }

    fn nested_order(&self) -> u32 {
        self.nested_order
    }
}

/// Order-only projection of a record
///
/// Decodes as long as the two order fields are present, whatever the payload
/// looks like, so reordering keeps working around a malformed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderEntry<'a> {
    pub key: &'a str,
    pub page_order: u32,
    pub nested_order: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredOrder {
    page_order: u32,
    nested_order: u32,
}

impl<'a> OrderEntry<'a> {
    pub fn new(key: &'a str, page_order: u32, nested_order: u32) -> Self {
        Self {
            key,
            page_order,
            nested_order,
        }
    }

    /// Read the order fields of a stored value
    pub fn from_value(key: &'a str, value: &Value) -> Result<Self, ValidationError> {
        let stored = StoredOrder::deserialize(value).map_err(|e| {
            ValidationError::MalformedRecord {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self::new(key, stored.page_order, stored.nested_order))
    }
}

impl Ordered for OrderEntry<'_> {
    fn key(&self) -> &str {
        self.key
    }

    fn page_order(&self) -> u32 {
        self.page_order
    }

    fn nested_order(&self) -> u32 {
        self.nested_order
    }
}

/// Handle to a record as the UI layer holds it
///
/// The order values are what the caller last rendered; the façade always
/// re-reads the store before acting and trusts the fresh values over these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub path: String,
    pub key: String,
    pub page_order: u32,
    pub nested_order: u32,
}

impl RecordRef {
    pub fn new(
        path: impl Into<String>,
        key: impl Into<String>,
        page_order: u32,
        nested_order: u32,
    ) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            page_order,
            nested_order,
        }
    }
}

impl From<&Record> for RecordRef {
    fn from(record: &Record) -> Self {
        record.to_ref()
    }
}
