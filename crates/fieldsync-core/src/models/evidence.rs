//! Photo evidence model

use serde::{Deserialize, Serialize};

use super::{local_id, now_millis, SyncStatus};

/// A piece of photo evidence attached to an inspection
///
/// `inspection_id` may reference a temporary local inspection id; the sync
/// engine rewrites it atomically when the parent adopts its server id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Record id; temporary (`local-` prefixed) until synced
    pub id: String,
    /// Parent inspection reference (may be a temporary id)
    pub inspection_id: String,
    /// Original file name, sent with the multipart upload
    pub file_name: String,
    /// Raw image bytes (base64 in JSON contexts)
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
    /// Caption shown alongside the image
    pub caption: String,
    /// Optional evidence category
    pub category: Option<String>,
    /// Optional technician notes
    pub notes: Option<String>,
    /// Server-side storage key, adopted after a successful upload
    pub file_key: Option<String>,
    /// Synchronization state
    pub sync_status: SyncStatus,
    /// Last local write (Unix ms), stamped on every save
    pub updated_at: i64,
}

impl Evidence {
    /// Create a new locally-captured evidence record awaiting sync
    #[must_use]
    pub fn new_local(
        inspection_id: impl Into<String>,
        file_name: impl Into<String>,
        content: Vec<u8>,
        caption: impl Into<String>,
    ) -> Self {
        Self {
            id: local_id(),
            inspection_id: inspection_id.into(),
            file_name: file_name.into(),
            content,
            caption: caption.into(),
            category: None,
            notes: None,
            file_key: None,
            sync_status: SyncStatus::Pending,
            updated_at: now_millis(),
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_local_is_pending() {
        let evidence = Evidence::new_local("local-1700000000000", "roof.jpg", vec![1, 2, 3], "");
        assert_eq!(evidence.sync_status, SyncStatus::Pending);
        assert_eq!(evidence.inspection_id, "local-1700000000000");
        assert!(evidence.file_key.is_none());
    }

    #[test]
    fn test_content_survives_json_roundtrip() {
        let evidence = Evidence::new_local("7", "roof.jpg", vec![0, 255, 128, 7], "crack");
        let json = serde_json::to_string(&evidence).unwrap();
        let back: Evidence = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content, evidence.content);
    }
}
