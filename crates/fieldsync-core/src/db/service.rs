//! Shared store service wrapper used across clients.
//!
//! The durable local store is owned exclusively by the main client context.
//! This wrapper serializes conflicting writes behind one async mutex while
//! keeping every operation non-blocking for callers.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    Database, EvidenceStore, InspectionStore, LibSqlEvidenceStore, LibSqlInspectionStore,
    LibSqlMutationQueue, LibSqlUserDataStore, MutationQueue, UserDataStore,
};
use crate::models::{Evidence, Inspection, PendingMutation, SyncStatus, UserBlob};
use crate::Result;

/// Thread-safe service for store and queue operations.
#[derive(Clone)]
pub struct StoreService {
    db: Arc<Mutex<Database>>,
}

impl StoreService {
    /// Open a store service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory store service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// List all inspections, newest first.
    pub async fn list_inspections(&self) -> Result<Vec<Inspection>> {
        let db = self.db.lock().await;
        LibSqlInspectionStore::new(db.connection()).get_all().await
    }

    /// Fetch an inspection by id.
    pub async fn get_inspection(&self, id: &str) -> Result<Option<Inspection>> {
        let db = self.db.lock().await;
        LibSqlInspectionStore::new(db.connection()).get(id).await
    }

    /// Upsert an inspection.
    pub async fn save_inspection(&self, inspection: &Inspection) -> Result<Inspection> {
        let db = self.db.lock().await;
        LibSqlInspectionStore::new(db.connection())
            .save(inspection)
            .await
    }

    /// Delete an inspection.
    pub async fn delete_inspection(&self, id: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlInspectionStore::new(db.connection()).delete(id).await
    }

    /// Inspections awaiting sync.
    pub async fn pending_inspections(&self) -> Result<Vec<Inspection>> {
        let db = self.db.lock().await;
        LibSqlInspectionStore::new(db.connection())
            .pending_sync()
            .await
    }

    /// Adopt a server id for an inspection, rewriting evidence references.
    pub async fn adopt_inspection_id(&self, old_id: &str, new_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlInspectionStore::new(db.connection())
            .adopt_remote_id(old_id, new_id)
            .await
    }

    /// Update an inspection's sync status.
    pub async fn set_inspection_sync_status(&self, id: &str, status: SyncStatus) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlInspectionStore::new(db.connection())
            .set_sync_status(id, status)
            .await
    }

    /// Fetch an evidence record by id.
    pub async fn get_evidence(&self, id: &str) -> Result<Option<Evidence>> {
        let db = self.db.lock().await;
        LibSqlEvidenceStore::new(db.connection()).get(id).await
    }

    /// Evidence attached to an inspection.
    pub async fn evidence_for_inspection(&self, inspection_id: &str) -> Result<Vec<Evidence>> {
        let db = self.db.lock().await;
        LibSqlEvidenceStore::new(db.connection())
            .get_by_inspection(inspection_id)
            .await
    }

    /// Upsert an evidence record.
    pub async fn save_evidence(&self, evidence: &Evidence) -> Result<Evidence> {
        let db = self.db.lock().await;
        LibSqlEvidenceStore::new(db.connection())
            .save(evidence)
            .await
    }

    /// Evidence awaiting sync.
    pub async fn pending_evidence(&self) -> Result<Vec<Evidence>> {
        let db = self.db.lock().await;
        LibSqlEvidenceStore::new(db.connection())
            .pending_sync()
            .await
    }

    /// Adopt a server id and storage key for uploaded evidence.
    pub async fn adopt_evidence_upload(
        &self,
        old_id: &str,
        new_id: &str,
        file_key: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEvidenceStore::new(db.connection())
            .adopt_upload(old_id, new_id, file_key)
            .await
    }

    /// Update an evidence record's sync status.
    pub async fn set_evidence_sync_status(&self, id: &str, status: SyncStatus) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEvidenceStore::new(db.connection())
            .set_sync_status(id, status)
            .await
    }

    /// Fetch a user-data blob.
    pub async fn get_user_data(&self, id: &str) -> Result<Option<UserBlob>> {
        let db = self.db.lock().await;
        LibSqlUserDataStore::new(db.connection()).get(id).await
    }

    /// Upsert a user-data blob.
    pub async fn save_user_data(&self, blob: &UserBlob) -> Result<UserBlob> {
        let db = self.db.lock().await;
        LibSqlUserDataStore::new(db.connection()).save(blob).await
    }

    /// Append a mutation to the replay queue.
    pub async fn enqueue_mutation(
        &self,
        method: &str,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<PendingMutation> {
        let db = self.db.lock().await;
        LibSqlMutationQueue::new(db.connection())
            .enqueue(method, url, body)
            .await
    }

    /// Atomically remove and return the oldest queued mutation.
    pub async fn dequeue_oldest_mutation(&self) -> Result<Option<PendingMutation>> {
        let db = self.db.lock().await;
        LibSqlMutationQueue::new(db.connection())
            .dequeue_oldest()
            .await
    }

    /// Persist a new attempt count for a queued mutation.
    pub async fn update_mutation_attempts(&self, id: &str, attempts: u32) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlMutationQueue::new(db.connection())
            .update_attempts(id, attempts)
            .await
    }

    /// Remove a queued mutation.
    pub async fn remove_mutation(&self, id: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlMutationQueue::new(db.connection()).remove(id).await
    }

    /// List all queued mutations, oldest first.
    pub async fn list_mutations(&self) -> Result<Vec<PendingMutation>> {
        let db = self.db.lock().await;
        LibSqlMutationQueue::new(db.connection()).list_all().await
    }

    /// Number of queued mutations.
    pub async fn queue_len(&self) -> Result<u64> {
        let db = self.db.lock().await;
        LibSqlMutationQueue::new(db.connection()).len().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Inspection;

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_create_and_list_roundtrip() {
        let service = StoreService::open_in_memory().await.unwrap();

        service
            .save_inspection(&Inspection::new_local("Roof survey", "Acme", "1 Main St"))
            .await
            .unwrap();
        let inspections = service.list_inspections().await.unwrap();
        assert_eq!(inspections.len(), 1);
        assert_eq!(inspections[0].title, "Roof survey");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_writes_serialize() {
        let service = StoreService::open_in_memory().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .save_inspection(&Inspection::new_local(
                        format!("Inspection {i}"),
                        "Acme",
                        "1 Main St",
                    ))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(service.list_inspections().await.unwrap().len(), 8);
    }
}
