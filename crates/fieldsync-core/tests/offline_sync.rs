//! End-to-end offline capture and sync scenarios

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;

use fieldsync_core::db::StoreService;
use fieldsync_core::models::{Evidence, Inspection, SyncStatus, MAX_ATTEMPTS};
use fieldsync_core::net::NetworkMonitor;
use fieldsync_core::sync::{InspectionApi, RemoteEvidence, RemoteRecord, SyncEngine};
use fieldsync_core::worker::{CacheWorker, Method, Request, WorkerConfig};
use fieldsync_core::{Error, Result};

/// In-process server double: assigns sequential ids, can be switched to
/// fail every call.
#[derive(Clone)]
struct FakeServer {
    next_id: Arc<AtomicI64>,
    unreachable: Arc<AtomicBool>,
    replayed_urls: Arc<Mutex<Vec<String>>>,
}

impl FakeServer {
    fn new(first_id: i64) -> Self {
        Self {
            next_id: Arc::new(AtomicI64::new(first_id)),
            unreachable: Arc::new(AtomicBool::new(false)),
            replayed_urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn reach(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(Error::Offline)
        } else {
            Ok(())
        }
    }

    fn assign_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

impl InspectionApi for FakeServer {
    async fn create_inspection(&self, _inspection: &Inspection) -> Result<RemoteRecord> {
        self.reach()?;
        Ok(RemoteRecord {
            id: self.assign_id(),
        })
    }

    async fn update_inspection(&self, _inspection: &Inspection) -> Result<()> {
        self.reach()
    }

    async fn upload_evidence(&self, _evidence: &Evidence) -> Result<RemoteEvidence> {
        self.reach()?;
        let id = self.assign_id();
        Ok(RemoteEvidence {
            file_key: Some(format!("uploads/{id}.jpg")),
            id,
        })
    }

    async fn replay(&self, mutation: &fieldsync_core::PendingMutation) -> Result<()> {
        self.reach()?;
        self.replayed_urls.lock().unwrap().push(mutation.url.clone());
        Ok(())
    }
}

struct Harness {
    service: StoreService,
    server: FakeServer,
    monitor: NetworkMonitor,
    engine: SyncEngine<FakeServer>,
}

async fn harness(first_server_id: i64) -> Harness {
    let service = StoreService::open_in_memory().await.unwrap();
    let server = FakeServer::new(first_server_id);
    let monitor = NetworkMonitor::new(true);
    let engine = SyncEngine::new(service.clone(), server.clone(), monitor.clone());
    Harness {
        service,
        server,
        monitor,
        engine,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn create_offline_then_sync_adopts_server_id() {
    let h = harness(42).await;

    // Offline: the record lands locally with a temporary id
    h.monitor.set_online(false);
    let inspection = h
        .service
        .save_inspection(&Inspection::new_local("Roof survey", "Acme", "1 Main St"))
        .await
        .unwrap();
    assert!(inspection.id.starts_with("local-"));
    assert_eq!(inspection.sync_status, SyncStatus::Pending);

    // Sync refuses while offline
    let refused = h.engine.sync_all().await;
    assert!(!refused.success);

    // Back online
    h.monitor.set_online(true);
    let report = h.engine.sync_all().await;
    assert!(report.success, "{}", report.message);

    let all = h.service.list_inspections().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, "42");
    assert_eq!(all[0].sync_status, SyncStatus::Synced);
}

#[tokio::test(flavor = "multi_thread")]
async fn child_evidence_adopts_parent_server_id() {
    let h = harness(7).await;

    let parent = h
        .service
        .save_inspection(&Inspection::new_local("Roof survey", "Acme", "1 Main St"))
        .await
        .unwrap();
    let local_parent_id = parent.id.clone();

    for name in ["crack.jpg", "leak.jpg"] {
        h.service
            .save_evidence(&Evidence::new_local(&local_parent_id, name, vec![0xFF], ""))
            .await
            .unwrap();
    }

    let report = h.engine.sync_all().await;
    assert!(report.success, "{}", report.message);

    // Parent took id 7; both children must reference it, never the
    // temporary id
    let children = h.service.evidence_for_inspection("7").await.unwrap();
    assert_eq!(children.len(), 2);
    for child in children {
        assert_eq!(child.inspection_id, "7");
        assert_eq!(child.sync_status, SyncStatus::Synced);
        assert!(child.file_key.is_some());
    }
    assert!(h
        .service
        .evidence_for_inspection(&local_parent_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn mutation_dropped_after_five_failed_attempts() {
    let h = harness(1).await;
    h.server.set_unreachable(true);

    let inspection = h
        .service
        .save_inspection(&Inspection::new_local("Roof survey", "Acme", "1 Main St"))
        .await
        .unwrap();
    h.service
        .enqueue_mutation(
            "POST",
            "/api/inspections",
            Some(json!({"id": inspection.id})),
        )
        .await
        .unwrap();

    for cycle in 1..=MAX_ATTEMPTS {
        h.engine.sync_all().await;
        let remaining = h.service.queue_len().await.unwrap();
        if cycle < MAX_ATTEMPTS {
            assert_eq!(remaining, 1, "entry dropped early at cycle {cycle}");
        } else {
            assert_eq!(remaining, 0, "entry survived past the ceiling");
        }
    }

    let stored = h
        .service
        .get_inspection(&inspection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Failed);

    // Failed records are excluded from automatic retries
    assert!(h.service.pending_inspections().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn replay_order_matches_enqueue_order() {
    let h = harness(1).await;

    for i in 0..5 {
        h.service
            .enqueue_mutation("POST", &format!("/api/inspections/{i}"), None)
            .await
            .unwrap();
    }

    let report = h.engine.sync_all().await;
    assert!(report.success);

    let order = h.server.replayed_urls.lock().unwrap().clone();
    let expected: Vec<String> = (0..5).map(|i| format!("/api/inspections/{i}")).collect();
    assert_eq!(order, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_queued_mutation_survives_to_sync() {
    // The full pipeline: the worker intercepts an offline POST, queues it
    // through its sink, and the sync engine drains that same queue once
    // connectivity returns.
    let h = harness(1).await;

    #[derive(Clone)]
    struct DownFetch;
    impl fieldsync_core::worker::Fetch for DownFetch {
        fn fetch(
            &self,
            _request: &Request,
        ) -> impl std::future::Future<Output = Result<fieldsync_core::worker::Response>> + Send
        {
            async { Err(Error::Offline) }
        }
    }

    let worker = CacheWorker::new(WorkerConfig::default(), DownFetch, h.service.clone());
    let response = worker
        .handle_fetch(&Request::mutation(
            Method::Post,
            "/api/inspections",
            Some(json!({"title": "Roof survey"})),
        ))
        .await;
    assert_eq!(response.status, 202);
    assert_eq!(h.service.queue_len().await.unwrap(), 1);

    let report = h.engine.sync_all().await;
    assert!(report.success);
    assert_eq!(report.mutations_replayed, 1);
    assert_eq!(h.service.queue_len().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn reconnect_grace_window_reports_was_offline() {
    let monitor = NetworkMonitor::new(true);
    assert!(!monitor.was_offline());

    monitor.set_online(false);
    monitor.set_online(true);
    assert!(monitor.is_online());
    assert!(monitor.was_offline());
}
