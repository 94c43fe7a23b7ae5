//! Editor Configuration
//!
//! Where the published tree, drafts and user profiles live in the store, and
//! how hard the façade retries on revision conflicts. Every field has a
//! default, so an empty JSON object is a valid configuration.
//!
//! ```json
//! {
//!   "publishedRoot": "pages/homepage/components",
//!   "draftsRoot": "drafts",
//!   "maxRetries": 5
//! }
//! ```

use crate::db::{path, DEFAULT_CHANGE_CHANNEL_CAPACITY};
use crate::operations::RetryPolicy;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the mutation façade and the in-process store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Published homepage tree (default: `pages/homepage/components`)
    pub published_root: String,
    /// Parent of every per-user draft (default: `drafts`)
    pub drafts_root: String,
    /// Draft tree below `{drafts_root}/{uid}` (default: `homepage/components`)
    pub draft_suffix: String,
    /// User profiles, the edit whitelist (default: `users`)
    pub users_root: String,
    /// Retries after a revision conflict (default: 3)
    pub max_retries: usize,
    /// Backoff before the first retry, doubled each time (default: 10ms)
    pub retry_base_backoff_ms: u64,
    /// Capacity of the store's change broadcast channel (default: 128)
    pub change_channel_capacity: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            published_root: "pages/homepage/components".to_string(),
            drafts_root: "drafts".to_string(),
            draft_suffix: "homepage/components".to_string(),
            users_root: "users".to_string(),
            max_retries: 3,
            retry_base_backoff_ms: 10,
            change_channel_capacity: DEFAULT_CHANGE_CHANNEL_CAPACITY,
        }
    }
}

impl EditorConfig {
    /// Check paths and limits
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("publishedRoot", &self.published_root),
            ("draftsRoot", &self.drafts_root),
            ("draftSuffix", &self.draft_suffix),
            ("usersRoot", &self.users_root),
        ] {
            path::validate(value, false).map_err(|e| format!("{}: {}", name, e))?;
        }
        if path::is_related(&self.published_root, &self.drafts_root) {
            return Err(format!(
                "publishedRoot '{}' and draftsRoot '{}' must not contain each other",
                self.published_root, self.drafts_root
            ));
        }
        if self.change_channel_capacity == 0 {
            return Err("changeChannelCapacity must be greater than 0".to_string());
        }
        if self.max_retries > 16 {
            return Err(format!(
                "maxRetries must be at most 16, got {}",
                self.max_retries
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: EditorConfig =
            serde_json::from_str(json).context("Failed to parse editor configuration")?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid editor configuration: {}", e))?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_file(file: impl AsRef<Path>) -> anyhow::Result<Self> {
        let file = file.as_ref();
        let json = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read config file {}", file.display()))?;
        Self::from_json_str(&json).with_context(|| format!("In {}", file.display()))
    }

    /// Draft tree of `user_id`
    pub fn draft_root(&self, user_id: &str) -> String {
        path::join(&path::join(&self.drafts_root, user_id), &self.draft_suffix)
    }

    /// Profile location of `user_id`
    pub fn user_path(&self, user_id: &str) -> String {
        path::join(&self.users_root, user_id)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_backoff_ms),
        )
    }
}
