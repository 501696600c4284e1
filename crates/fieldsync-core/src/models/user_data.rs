//! Arbitrary user-data blob model

use serde::{Deserialize, Serialize};

use super::now_millis;

/// An arbitrary structured blob in the user-data store (drafts, settings,
/// cached lookups)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBlob {
    /// Caller-chosen key
    pub id: String,
    /// Arbitrary structured payload
    pub data: serde_json::Value,
    /// Last local write (Unix ms)
    pub updated_at: i64,
}

impl UserBlob {
    #[must_use]
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            data,
            updated_at: now_millis(),
        }
    }
}
