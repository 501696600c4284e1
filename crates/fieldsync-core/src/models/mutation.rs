//! Pending mutation queue entry model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::now_millis;

/// Maximum replay attempts before a mutation is dropped from the queue and
/// its associated record marked failed
pub const MAX_ATTEMPTS: u32 = 5;

/// A not-yet-acknowledged write operation awaiting network replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    /// Locally generated unique identifier (UUID v7, time-sortable)
    pub id: String,
    /// HTTP method to replay
    pub method: String,
    /// Target endpoint
    pub url: String,
    /// JSON body, if any
    pub body: Option<serde_json::Value>,
    /// Replay attempts so far
    pub attempts: u32,
    /// Enqueue time (Unix ms), used for FIFO ordering
    pub timestamp: i64,
    /// Client-generated idempotency token, stable across retries of this
    /// mutation so the server can dedupe ambiguous-failure replays
    pub idempotency_key: String,
}

impl PendingMutation {
    /// Create a new queue entry for the given HTTP operation
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        body: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            method: method.into(),
            url: url.into(),
            body,
            attempts: 0,
            timestamp: now_millis(),
            idempotency_key: Uuid::now_v7().to_string(),
        }
    }

    /// Whether this entry has exhausted its replay budget
    #[must_use]
    pub const fn exhausted(&self) -> bool {
        self.attempts >= MAX_ATTEMPTS
    }

    /// Record id referenced by the mutation body, if the payload carries one.
    ///
    /// Used to flag the associated record as failed when the entry is
    /// dropped at the retry ceiling.
    #[must_use]
    pub fn record_id(&self) -> Option<&str> {
        self.body.as_ref()?.get("id")?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_mutation_defaults() {
        let mutation = PendingMutation::new("POST", "/api/inspections", None);
        assert_eq!(mutation.attempts, 0);
        assert!(!mutation.exhausted());
        assert!(!mutation.idempotency_key.is_empty());
        assert_ne!(mutation.id, mutation.idempotency_key);
    }

    #[test]
    fn test_exhausted_at_ceiling() {
        let mut mutation = PendingMutation::new("POST", "/api/inspections", None);
        mutation.attempts = MAX_ATTEMPTS;
        assert!(mutation.exhausted());
    }

    #[test]
    fn test_record_id_extraction() {
        let mutation = PendingMutation::new(
            "PUT",
            "/api/inspections/local-17",
            Some(json!({"id": "local-17", "title": "Roof"})),
        );
        assert_eq!(mutation.record_id(), Some("local-17"));

        let bodyless = PendingMutation::new("POST", "/api/inspections", None);
        assert_eq!(bodyless.record_id(), None);
    }
}
