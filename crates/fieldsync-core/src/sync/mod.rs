//! Sync engine for offline-captured work
//!
//! Drains the pending-mutation queue and the sync-flagged record stores
//! against the REST API once connectivity returns. One cycle runs at a
//! time; per-item failures never abort the rest of the batch.

pub mod api;
pub mod scheduler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::db::StoreService;
use crate::error::Result;
use crate::models::{is_local_id, SyncStatus, MAX_ATTEMPTS};
use crate::net::NetworkMonitor;

pub use api::{HttpInspectionApi, InspectionApi, RemoteEvidence, RemoteRecord};
pub use scheduler::{SchedulerHandle, SyncEvent, SyncScheduler, DEFAULT_SYNC_INTERVAL};

/// Outcome of one sync cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// True when the cycle ran and nothing failed
    pub success: bool,
    /// Human-readable summary for the UI indicator
    pub message: String,
    /// Queued mutations replayed successfully
    pub mutations_replayed: usize,
    /// Inspection records synced
    pub inspections_synced: usize,
    /// Evidence records uploaded
    pub evidence_synced: usize,
    /// Items that failed this cycle (mutations dropped or records marked failed)
    pub failed: usize,
}

impl SyncReport {
    fn skipped(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            mutations_replayed: 0,
            inspections_synced: 0,
            evidence_synced: 0,
            failed: 0,
        }
    }
}

/// Orchestrates replay of pending work against the network.
///
/// Cheap to clone; all clones share the single-flight guard, so concurrent
/// triggers collapse into one in-flight cycle.
#[derive(Clone)]
pub struct SyncEngine<A> {
    service: StoreService,
    api: A,
    monitor: NetworkMonitor,
    syncing: Arc<AtomicBool>,
}

impl<A: InspectionApi> SyncEngine<A> {
    pub fn new(service: StoreService, api: A, monitor: NetworkMonitor) -> Self {
        Self {
            service,
            api,
            monitor,
            syncing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a cycle is currently in flight
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// Run one sync cycle: drain the mutation queue, then pending
    /// inspections, then pending evidence.
    ///
    /// Re-entrant calls while a cycle is in flight are rejected
    /// immediately; starting while offline is refused. The connectivity
    /// hint is not trusted beyond that precondition - every request still
    /// handles its own failure.
    pub async fn sync_all(&self) -> SyncReport {
        if self.syncing.swap(true, Ordering::SeqCst) {
            return SyncReport::skipped("Sync already in progress");
        }

        if !self.monitor.is_online() {
            self.syncing.store(false, Ordering::SeqCst);
            return SyncReport::skipped("No network connection");
        }

        let report = self.run_cycle().await;
        self.syncing.store(false, Ordering::SeqCst);
        report
    }

    async fn run_cycle(&self) -> SyncReport {
        let mut replayed = 0usize;
        let mut inspections = 0usize;
        let mut evidence = 0usize;
        let mut failed = 0usize;

        if let Err(e) = self.drain_queue(&mut replayed, &mut failed).await {
            tracing::error!("Mutation queue drain aborted: {e}");
            failed += 1;
        }
        if let Err(e) = self.sync_inspections(&mut inspections, &mut failed).await {
            tracing::error!("Inspection sync aborted: {e}");
            failed += 1;
        }
        if let Err(e) = self.sync_evidence(&mut evidence, &mut failed).await {
            tracing::error!("Evidence sync aborted: {e}");
            failed += 1;
        }

        let message = if failed == 0 {
            format!(
                "Sync completed: {replayed} queued mutations, {inspections} inspections, {evidence} evidence"
            )
        } else {
            format!(
                "Sync finished with {failed} failures: {replayed} queued mutations, {inspections} inspections, {evidence} evidence synced"
            )
        };

        SyncReport {
            success: failed == 0,
            message,
            mutations_replayed: replayed,
            inspections_synced: inspections,
            evidence_synced: evidence,
            failed,
        }
    }

    /// Replay queued mutations strictly oldest-first, one at a time.
    async fn drain_queue(&self, replayed: &mut usize, failed: &mut usize) -> Result<()> {
        // A snapshot keeps each entry to one attempt per cycle; entries
        // stay durable in the queue until confirmed or exhausted.
        let snapshot = self.service.list_mutations().await?;

        for mutation in snapshot {
            let attempts = mutation.attempts + 1;
            self.service
                .update_mutation_attempts(&mutation.id, attempts)
                .await?;

            match self.api.replay(&mutation).await {
                Ok(()) => {
                    self.service.remove_mutation(&mutation.id).await?;
                    *replayed += 1;
                }
                Err(e) if e.is_permanent_rejection() => {
                    tracing::warn!(id = %mutation.id, url = %mutation.url, "Mutation rejected by server: {e}");
                    self.service.remove_mutation(&mutation.id).await?;
                    self.mark_record_failed(mutation.record_id()).await;
                    *failed += 1;
                }
                Err(e) if attempts >= MAX_ATTEMPTS => {
                    tracing::warn!(
                        id = %mutation.id,
                        url = %mutation.url,
                        attempts,
                        "Mutation exhausted its retry budget, dropping: {e}"
                    );
                    self.service.remove_mutation(&mutation.id).await?;
                    self.mark_record_failed(mutation.record_id()).await;
                    *failed += 1;
                }
                Err(e) => {
                    // Kept in the queue for the next cycle
                    tracing::debug!(id = %mutation.id, attempts, "Mutation replay failed: {e}");
                }
            }
        }

        Ok(())
    }

    async fn sync_inspections(&self, synced: &mut usize, failed: &mut usize) -> Result<()> {
        for inspection in self.service.pending_inspections().await? {
            let outcome = if inspection.has_local_id() {
                match self.api.create_inspection(&inspection).await {
                    Ok(remote) => {
                        // Rewrite the id everywhere it is referenced before
                        // marking synced; evidence follows in the same
                        // transaction.
                        self.service
                            .adopt_inspection_id(&inspection.id, &remote.id)
                            .await
                    }
                    Err(e) => Err(e),
                }
            } else {
                match self.api.update_inspection(&inspection).await {
                    Ok(()) => {
                        self.service
                            .set_inspection_sync_status(&inspection.id, SyncStatus::Synced)
                            .await
                    }
                    Err(e) => Err(e),
                }
            };

            match outcome {
                Ok(()) => *synced += 1,
                Err(e) => {
                    tracing::warn!(id = %inspection.id, "Inspection sync failed: {e}");
                    if let Err(store_err) = self
                        .service
                        .set_inspection_sync_status(&inspection.id, SyncStatus::Failed)
                        .await
                    {
                        tracing::error!(id = %inspection.id, "Could not flag inspection as failed: {store_err}");
                    }
                    *failed += 1;
                }
            }
        }

        Ok(())
    }

    async fn sync_evidence(&self, synced: &mut usize, failed: &mut usize) -> Result<()> {
        for evidence in self.service.pending_evidence().await? {
            if is_local_id(&evidence.inspection_id) {
                // Parent has not adopted a server id (its create failed this
                // cycle); leave the child pending for the next cycle.
                tracing::debug!(
                    id = %evidence.id,
                    parent = %evidence.inspection_id,
                    "Evidence parent still has a local id, deferring upload"
                );
                continue;
            }

            match self.api.upload_evidence(&evidence).await {
                Ok(remote) => {
                    self.service
                        .adopt_evidence_upload(
                            &evidence.id,
                            &remote.id,
                            remote.file_key.as_deref().unwrap_or_default(),
                        )
                        .await?;
                    *synced += 1;
                }
                Err(e) => {
                    tracing::warn!(id = %evidence.id, "Evidence upload failed: {e}");
                    if let Err(store_err) = self
                        .service
                        .set_evidence_sync_status(&evidence.id, SyncStatus::Failed)
                        .await
                    {
                        tracing::error!(id = %evidence.id, "Could not flag evidence as failed: {store_err}");
                    }
                    *failed += 1;
                }
            }
        }

        Ok(())
    }

    /// Flag the record a dropped mutation referenced, if it still exists.
    async fn mark_record_failed(&self, record_id: Option<&str>) {
        let Some(id) = record_id else { return };

        match self.service.get_inspection(id).await {
            Ok(Some(_)) => {
                if let Err(e) = self
                    .service
                    .set_inspection_sync_status(id, SyncStatus::Failed)
                    .await
                {
                    tracing::error!(id, "Could not flag record as failed: {e}");
                }
            }
            Ok(None) => match self.service.get_evidence(id).await {
                Ok(Some(_)) => {
                    if let Err(e) = self
                        .service
                        .set_evidence_sync_status(id, SyncStatus::Failed)
                        .await
                    {
                        tracing::error!(id, "Could not flag evidence as failed: {e}");
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::error!(id, "Record lookup failed: {e}"),
            },
            Err(e) => tracing::error!(id, "Record lookup failed: {e}"),
        }
    }
}
