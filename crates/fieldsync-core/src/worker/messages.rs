//! Client/worker message protocol
//!
//! Structured messages are the only channel between the client runtime
//! and the worker; neither side touches the other's storage.

use serde::{Deserialize, Serialize};

/// Messages sent from the client runtime to the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Force an installed-but-waiting worker version to activate now
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    /// Request an immediate mutation-replay cycle
    #[serde(rename = "SYNC_NOW")]
    SyncNow,
}

/// Notifications broadcast from the worker to client contexts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WorkerMessage {
    /// A sync cycle started or finished
    #[serde(rename = "SYNC_STATUS")]
    SyncStatus { syncing: bool },
    /// A new worker version activated
    #[serde(rename = "APP_UPDATE")]
    AppUpdate { version: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_client_message_wire_format() {
        assert_eq!(
            serde_json::to_value(ClientMessage::SkipWaiting).unwrap(),
            json!({"type": "SKIP_WAITING"})
        );
        assert_eq!(
            serde_json::from_value::<ClientMessage>(json!({"type": "SYNC_NOW"})).unwrap(),
            ClientMessage::SyncNow
        );
    }

    #[test]
    fn test_worker_message_wire_format() {
        assert_eq!(
            serde_json::to_value(WorkerMessage::SyncStatus { syncing: true }).unwrap(),
            json!({"type": "SYNC_STATUS", "payload": {"syncing": true}})
        );
        assert_eq!(
            serde_json::to_value(WorkerMessage::AppUpdate {
                version: "2".to_string()
            })
            .unwrap(),
            json!({"type": "APP_UPDATE", "payload": {"version": "2"}})
        );
    }
}
