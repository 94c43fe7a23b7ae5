//! Block Payloads
//!
//! Every record carries a `data` object whose `type` field selects the content
//! kind. The kinds are modeled as a closed tagged union so that template lookup
//! and layout dispatch are exhaustive matches instead of string comparisons.
//!
//! # Stored format
//!
//! ```json
//! { "type": "event", "title": "Open House", "imgSource": "imgs/open-house.webp", ... }
//! ```
//!
//! Missing text fields deserialize as empty strings, matching what editors see
//! for a freshly added block that was never filled in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Validation errors for block payloads and records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown block kind: {0}")]
    UnknownBlockKind(String),

    #[error("Unknown field '{field}' for block kind '{kind}'")]
    UnknownField { kind: BlockKind, field: String },

    #[error("Field '{0}' is maintained by the order engine and cannot be edited directly")]
    OrderFieldNotEditable(String),

    #[error("Malformed record '{key}': {reason}")]
    MalformedRecord { key: String, reason: String },
}

/// Discriminator of a content block (`data.type` in the store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Event,
    Project,
    Accordion,
    Text,
}

impl BlockKind {
    /// All kinds, in the order templates are listed
    pub const ALL: [BlockKind; 4] = [
        BlockKind::Event,
        BlockKind::Project,
        BlockKind::Accordion,
        BlockKind::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Event => "event",
            BlockKind::Project => "project",
            BlockKind::Accordion => "accordion",
            BlockKind::Text => "text",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event" => Ok(BlockKind::Event),
            "project" => Ok(BlockKind::Project),
            "accordion" => Ok(BlockKind::Accordion),
            "text" => Ok(BlockKind::Text),
            other => Err(ValidationError::UnknownBlockKind(other.to_string())),
        }
    }
}

/// One entry of an event carousel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventBlock {
    pub title: String,
    pub description: String,
    pub location: String,
    pub date: String,
    pub link: String,
    pub img_source: String,
    pub image_alt: String,
    pub caption: String,
}

/// One entry of a project list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectBlock {
    pub title: String,
    pub description: String,
    pub link: String,
    pub img_source: String,
    pub image_alt: String,
}

/// One collapsible section of an accordion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccordionBlock {
    pub title: String,
    pub body: String,
}

/// Free text block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextBlock {
    pub text: String,
}

/// Payload of a record, internally tagged on `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockPayload {
    Event(EventBlock),
    Project(ProjectBlock),
    Accordion(AccordionBlock),
    Text(TextBlock),
}

impl BlockPayload {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockPayload::Event(_) => BlockKind::Event,
            BlockPayload::Project(_) => BlockKind::Project,
            BlockPayload::Accordion(_) => BlockKind::Accordion,
            BlockPayload::Text(_) => BlockKind::Text,
        }
    }

    /// Stored field names that an editor may change for this kind
    pub fn editable_fields(kind: BlockKind) -> &'static [&'static str] {
        match kind {
            BlockKind::Event => &[
                "title",
                "description",
                "location",
                "date",
                "link",
                "imgSource",
                "imageAlt",
                "caption",
            ],
            BlockKind::Project => &["title", "description", "link", "imgSource", "imageAlt"],
            BlockKind::Accordion => &["title", "body"],
            BlockKind::Text => &["text"],
        }
    }

    /// Check that `field` is a payload field of `kind` (and not an order field)
    pub fn validate_field(kind: BlockKind, field: &str) -> Result<(), ValidationError> {
        if field == super::PAGE_ORDER_FIELD || field == super::NESTED_ORDER_FIELD {
            return Err(ValidationError::OrderFieldNotEditable(field.to_string()));
        }
        if Self::editable_fields(kind).contains(&field) {
            Ok(())
        } else {
            Err(ValidationError::UnknownField {
                kind,
                field: field.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_kind_parse_and_display() {
        for kind in BlockKind::ALL {
            assert_eq!(kind.as_str().parse::<BlockKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.as_str());
        }
        assert_eq!(
            "carousel".parse::<BlockKind>(),
            Err(ValidationError::UnknownBlockKind("carousel".to_string()))
        );
    }

    /// The stored payload is flat: the discriminator sits next to the fields
    #[test]
    fn test_event_payload_stored_format() {
        let payload = BlockPayload::Event(EventBlock {
            title: "Open House".to_string(),
            img_source: "imgs/open-house.webp".to_string(),
            ..Default::default()
        });

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["title"], "Open House");
        assert_eq!(value["imgSource"], "imgs/open-house.webp");
        assert!(value.get("event").is_none(), "payload must not be nested");
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let payload: BlockPayload =
            serde_json::from_value(json!({ "type": "project", "title": "Rover" })).unwrap();

        match payload {
            BlockPayload::Project(project) => {
                assert_eq!(project.title, "Rover");
                assert_eq!(project.description, "");
            }
            other => panic!("Expected project payload, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_discriminator_is_rejected() {
        let result: Result<BlockPayload, _> =
            serde_json::from_value(json!({ "type": "faculty", "name": "x" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_field() {
        assert!(BlockPayload::validate_field(BlockKind::Event, "caption").is_ok());
        assert!(matches!(
            BlockPayload::validate_field(BlockKind::Text, "title"),
            Err(ValidationError::UnknownField { .. })
        ));
        assert_eq!(
            BlockPayload::validate_field(BlockKind::Event, "nestedOrder"),
            Err(ValidationError::OrderFieldNotEditable(
                "nestedOrder".to_string()
            ))
        );
    }
}
