//! Domain models shared across the fieldsync runtime

mod evidence;
mod inspection;
mod mutation;
mod user_data;

pub use evidence::Evidence;
pub use inspection::{Inspection, InspectionStatus};
pub use mutation::{PendingMutation, MAX_ATTEMPTS};
pub use user_data::UserBlob;

use serde::{Deserialize, Serialize};

/// Prefix used for locally-created record ids that have not yet been
/// assigned a server id.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Synchronization state of a locally persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Acknowledged by the server; the record carries a server-assigned id
    Synced,
    /// Awaiting sync; eligible for the next cycle
    Pending,
    /// Exceeded the retry ceiling or permanently rejected; excluded from
    /// automatic retries until the user retries it
    Failed,
}

impl SyncStatus {
    /// Database column representation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Failed => "failed",
        }
    }

    /// Parse the database column representation
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "synced" => Some(Self::Synced),
            "pending" => Some(Self::Pending),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Generate a temporary local record id (`local-<millis>`)
#[must_use]
pub fn local_id() -> String {
    format!("{LOCAL_ID_PREFIX}{}", chrono::Utc::now().timestamp_millis())
}

/// Whether an id is a temporary local id awaiting a server assignment
#[must_use]
pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

/// Current wall-clock time in Unix milliseconds
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
