//! Inspection record model

use serde::{Deserialize, Serialize};

use super::{local_id, now_millis, SyncStatus};

/// Workflow state of an inspection (distinct from its sync state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspectionStatus {
    Draft,
    Pending,
    Completed,
}

impl InspectionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// An inspection record in the durable local store
///
/// Locally-created inspections carry a `local-<millis>` id until the sync
/// engine adopts the server-assigned id. A record with `SyncStatus::Synced`
/// always has a server id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    /// Record id; temporary (`local-` prefixed) until synced
    pub id: String,
    /// Short title shown in listings
    pub title: String,
    /// Client the inspection was performed for
    pub client_name: String,
    /// Site address
    pub address: String,
    /// Workflow state
    pub status: InspectionStatus,
    /// Entity-specific form payload
    pub data: serde_json::Value,
    /// Synchronization state
    pub sync_status: SyncStatus,
    /// Last local write (Unix ms), stamped on every save
    pub updated_at: i64,
}

impl Inspection {
    /// Create a new locally-captured inspection awaiting sync
    #[must_use]
    pub fn new_local(
        title: impl Into<String>,
        client_name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: local_id(),
            title: title.into(),
            client_name: client_name.into(),
            address: address.into(),
            status: InspectionStatus::Draft,
            data: serde_json::Value::Null,
            sync_status: SyncStatus::Pending,
            updated_at: now_millis(),
        }
    }

    /// Whether this record still carries a temporary local id
    #[must_use]
    pub fn has_local_id(&self) -> bool {
        super::is_local_id(&self.id)
    }
}
