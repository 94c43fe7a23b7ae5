//! Payload Templates
//!
//! Default content cloned into every newly added block. The registry maps a
//! `BlockKind` to one payload; a kind without an entry cannot be added.

use super::{
    AccordionBlock, BlockKind, BlockPayload, EventBlock, ProjectBlock, TextBlock, ValidationError,
};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<BlockKind, BlockPayload>,
}

impl TemplateRegistry {
    /// Registry without any template
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with one placeholder template per block kind
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(BlockPayload::Event(EventBlock {
            title: "Event Title".to_string(),
            description: "Event description".to_string(),
            location: "Location".to_string(),
            date: "Date".to_string(),
            link: String::new(),
            img_source: String::new(),
            image_alt: "Event image".to_string(),
            caption: String::new(),
        }));
        registry.register(BlockPayload::Project(ProjectBlock {
            title: "Project Title".to_string(),
            description: "Project description".to_string(),
            link: String::new(),
            img_source: String::new(),
            image_alt: "Project image".to_string(),
        }));
        registry.register(BlockPayload::Accordion(AccordionBlock {
            title: "Section Title".to_string(),
            body: String::new(),
        }));
        registry.register(BlockPayload::Text(TextBlock {
            text: String::new(),
        }));
        registry
    }

    /// Load templates from a JSON object keyed by kind
    ///
    /// ```json
    /// { "event": { "title": "New event", "date": "TBD" } }
    /// ```
    ///
    /// The `type` field inside each template may be omitted; the key decides it.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let document: HashMap<String, Value> =
            serde_json::from_str(json).map_err(|e| ValidationError::MalformedRecord {
                key: "templates".to_string(),
                reason: e.to_string(),
            })?;

        let mut registry = Self::empty();
        for (name, mut fields) in document {
            let kind: BlockKind = name.parse()?;
            if let Value::Object(map) = &mut fields {
                map.insert("type".to_string(), Value::String(kind.as_str().to_string()));
            }
            let payload: BlockPayload =
                serde_json::from_value(fields).map_err(|e| ValidationError::MalformedRecord {
                    key: name.clone(),
                    reason: e.to_string(),
                })?;
            registry.register(payload);
        }
        Ok(registry)
    }

    /// Insert or replace the template for the payload's kind
    pub fn register(&mut self, payload: BlockPayload) {
        self.templates.insert(payload.kind(), payload);
    }

    pub fn get(&self, kind: BlockKind) -> Option<&BlockPayload> {
        self.templates.get(&kind)
    }

    pub fn contains(&self, kind: BlockKind) -> bool {
        self.templates.contains_key(&kind)
    }
}
