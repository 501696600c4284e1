//! Installable cache worker
//!
//! A background task that intercepts outbound requests and serves them
//! under per-resource-class cache policies, queueing failed mutations for
//! later replay. It communicates with the client runtime only through
//! messages and the [`MutationSink`]; it never touches the local store.

mod cache;
mod config;
mod fetch;
mod messages;
mod routes;
mod strategies;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::broadcast;

use crate::db::StoreService;
use crate::error::Result;
use crate::models::PendingMutation;
use crate::sync::SyncEvent;

pub use cache::{Bucket, CacheStorage};
pub use config::WorkerConfig;
pub use fetch::{Destination, Fetch, HttpFetch, Method, Request, Response};
pub use messages::{ClientMessage, WorkerMessage};
pub use routes::{classify, Route, Strategy};

/// Where the worker hands off mutations it could not deliver.
///
/// The queue itself lives in the client runtime's store; this is the
/// worker's only bridge to it.
pub trait MutationSink: Clone + Send + Sync + 'static {
    fn enqueue(
        &self,
        method: &str,
        url: &str,
        body: Option<Value>,
    ) -> impl Future<Output = Result<PendingMutation>> + Send;
}

impl MutationSink for StoreService {
    fn enqueue(
        &self,
        method: &str,
        url: &str,
        body: Option<Value>,
    ) -> impl Future<Output = Result<PendingMutation>> + Send {
        self.enqueue_mutation(method, url, body)
    }
}

/// Worker lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Precaching assets; not yet serving requests
    Installing,
    /// Installed, waiting for prior-version contexts to close or for an
    /// explicit skip-waiting signal
    WaitingToActivate,
    /// Live; owns the cache storage for its version
    Active,
}

/// Actions the client runtime must carry out on the worker's behalf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerAction {
    /// Forward to the sync scheduler for an immediate cycle
    RequestSync,
}

/// The cache worker. Generic over network access and the mutation sink so
/// it can be driven entirely in-process during tests.
pub struct CacheWorker<F, S> {
    config: WorkerConfig,
    state: Mutex<WorkerState>,
    storage: Arc<CacheStorage>,
    fetcher: F,
    sink: S,
    events: broadcast::Sender<WorkerMessage>,
}

impl<F: Fetch, S: MutationSink> CacheWorker<F, S> {
    #[must_use]
    pub fn new(config: WorkerConfig, fetcher: F, sink: S) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            config,
            state: Mutex::new(WorkerState::Installing),
            storage: Arc::new(CacheStorage::new()),
            fetcher,
            sink,
            events,
        }
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: WorkerState) {
        *self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Subscribe to worker-to-client notifications
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerMessage> {
        self.events.subscribe()
    }

    /// Precache the configured static assets, then move to
    /// `WaitingToActivate`.
    ///
    /// Individual precache failures are logged and skipped: offline
    /// capability is a best-effort enhancement, and a missing asset must
    /// not block installation.
    pub async fn install(&self) {
        self.set_state(WorkerState::Installing);
        let bucket = self.config.bucket_name(Bucket::Static);

        for url in self.config.precache.clone() {
            let request = Request::get(&url, Destination::Other);
            match self.fetcher.fetch(&request).await {
                Ok(response) if response.ok() => {
                    self.storage.put(&bucket, &url, response);
                }
                Ok(response) => {
                    tracing::warn!(url, status = response.status, "Precache fetch not cacheable");
                }
                Err(e) => {
                    tracing::warn!(url, "Precache fetch failed: {e}");
                }
            }
        }

        tracing::info!(version = %self.config.version, "Worker installed, waiting to activate");
        self.set_state(WorkerState::WaitingToActivate);
    }

    /// Activate this version: purge buckets from previous versions and
    /// notify clients of the update.
    pub fn activate(&self) {
        let purged = self.storage.purge_except(&self.config.expected_buckets());
        for name in &purged {
            tracing::info!(bucket = %name, "Purged stale cache bucket");
        }

        self.set_state(WorkerState::Active);
        tracing::info!(version = %self.config.version, "Worker activated");
        let _ = self.events.send(WorkerMessage::AppUpdate {
            version: self.config.version.clone(),
        });
    }

    /// Handle a message from a client context.
    ///
    /// Returns the action the runtime should carry out, if any.
    pub fn on_message(&self, message: ClientMessage) -> Option<WorkerAction> {
        match message {
            ClientMessage::SkipWaiting => {
                if self.state() == WorkerState::WaitingToActivate {
                    self.activate();
                } else {
                    tracing::debug!(state = ?self.state(), "Ignoring skip-waiting signal");
                }
                None
            }
            ClientMessage::SyncNow => Some(WorkerAction::RequestSync),
        }
    }

    /// Broadcast sync-cycle state to client contexts.
    pub fn notify_sync_status(&self, syncing: bool) {
        let _ = self.events.send(WorkerMessage::SyncStatus { syncing });
    }

    /// Forward scheduler cycle events to client contexts as `SYNC_STATUS`
    /// notifications.
    ///
    /// Runs until the scheduler's event channel closes; the runtime spawns
    /// this next to the scheduler with a receiver from
    /// [`crate::sync::SchedulerHandle::subscribe`].
    pub async fn relay_sync_events(&self, mut events: broadcast::Receiver<SyncEvent>) {
        loop {
            match events.recv().await {
                Ok(SyncEvent::Started) => self.notify_sync_status(true),
                Ok(SyncEvent::Finished(_)) => self.notify_sync_status(false),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Sync event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::fetch::{Fetch, Request, Response};
    use crate::error::{Error, Result};

    struct Inner {
        responses: Mutex<HashMap<String, Response>>,
        offline: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    /// Scripted network double: serves canned responses by URL, or fails
    /// everything while "offline".
    #[derive(Clone)]
    pub struct StubFetch {
        inner: Arc<Inner>,
    }

    impl StubFetch {
        pub fn new() -> Self {
            Self {
                inner: Arc::new(Inner {
                    responses: Mutex::new(HashMap::new()),
                    offline: AtomicBool::new(false),
                    calls: Mutex::new(Vec::new()),
                }),
            }
        }

        pub fn respond(&self, url: &str, response: Response) {
            self.inner
                .responses
                .lock()
                .unwrap()
                .insert(url.to_string(), response);
        }

        pub fn set_offline(&self, offline: bool) {
            self.inner.offline.store(offline, Ordering::SeqCst);
        }

        /// URLs fetched so far, in call order
        pub fn calls(&self) -> Vec<String> {
            self.inner.calls.lock().unwrap().clone()
        }
    }

    impl Fetch for StubFetch {
        fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send {
            let inner = self.inner.clone();
            let url = request.url.clone();
            async move {
                inner.calls.lock().unwrap().push(url.clone());
                if inner.offline.load(Ordering::SeqCst) {
                    return Err(Error::Offline);
                }
                inner
                    .responses
                    .lock()
                    .unwrap()
                    .get(&url)
                    .cloned()
                    .ok_or(Error::NotFound(url))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::StubFetch;
    use super::*;
    use pretty_assertions::assert_eq;

    async fn worker_with(
        config: WorkerConfig,
        fetcher: &StubFetch,
    ) -> (CacheWorker<StubFetch, StoreService>, StoreService) {
        let service = StoreService::open_in_memory().await.unwrap();
        let worker = CacheWorker::new(config, fetcher.clone(), service.clone());
        (worker, service)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_install_precaches_and_waits() {
        let fetcher = StubFetch::new();
        fetcher.respond("/assets/app.js", Response::html(200, "js"));
        fetcher.respond("/offline.html", Response::html(200, "offline"));

        let config = WorkerConfig {
            precache: vec!["/assets/app.js".to_string(), "/offline.html".to_string()],
            ..WorkerConfig::default()
        };
        let (worker, _service) = worker_with(config.clone(), &fetcher).await;
        assert_eq!(worker.state(), WorkerState::Installing);

        worker.install().await;
        assert_eq!(worker.state(), WorkerState::WaitingToActivate);

        let bucket = config.bucket_name(Bucket::Static);
        assert!(worker.storage.get(&bucket, "/assets/app.js").is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_install_survives_precache_failures() {
        let fetcher = StubFetch::new();
        fetcher.set_offline(true);

        let config = WorkerConfig {
            precache: vec!["/assets/app.js".to_string()],
            ..WorkerConfig::default()
        };
        let (worker, _service) = worker_with(config, &fetcher).await;

        worker.install().await;
        // Degraded, but installed
        assert_eq!(worker.state(), WorkerState::WaitingToActivate);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_activation_purges_stale_buckets() {
        let fetcher = StubFetch::new();
        let config = WorkerConfig {
            version: "2".to_string(),
            ..WorkerConfig::default()
        };
        let (worker, _service) = worker_with(config.clone(), &fetcher).await;

        // Leftovers from a previous version
        worker
            .storage
            .put("fieldsync-1-pages", "/", Response::html(200, "old"));
        worker
            .storage
            .put("fieldsync-1-api", "/api/x", Response::json(200, &serde_json::json!({})));
        let current = config.bucket_name(Bucket::Pages);
        worker.storage.put(&current, "/", Response::html(200, "new"));

        worker.install().await;
        worker.activate();

        let expected = config.expected_buckets();
        for name in worker.storage.bucket_names() {
            assert!(expected.contains(&name), "stale bucket survived: {name}");
        }
        assert!(worker.storage.get(&current, "/").is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_skip_waiting_activates_and_notifies() {
        let fetcher = StubFetch::new();
        let (worker, _service) = worker_with(WorkerConfig::default(), &fetcher).await;
        worker.install().await;

        let mut events = worker.subscribe();
        assert_eq!(worker.on_message(ClientMessage::SkipWaiting), None);
        assert_eq!(worker.state(), WorkerState::Active);

        let Ok(WorkerMessage::AppUpdate { version }) = events.try_recv() else {
            panic!("expected an app-update notification");
        };
        assert_eq!(version, "1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_skip_waiting_ignored_while_installing() {
        let fetcher = StubFetch::new();
        let (worker, _service) = worker_with(WorkerConfig::default(), &fetcher).await;

        worker.on_message(ClientMessage::SkipWaiting);
        assert_eq!(worker.state(), WorkerState::Installing);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sync_now_is_forwarded() {
        let fetcher = StubFetch::new();
        let (worker, _service) = worker_with(WorkerConfig::default(), &fetcher).await;

        assert_eq!(
            worker.on_message(ClientMessage::SyncNow),
            Some(WorkerAction::RequestSync)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sync_status_bracket_around_cycle() {
        let fetcher = StubFetch::new();
        let (worker, _service) = worker_with(WorkerConfig::default(), &fetcher).await;
        let worker = Arc::new(worker);
        let mut client = worker.subscribe();

        let (cycles, _) = broadcast::channel::<SyncEvent>(8);
        let relay = {
            let worker = Arc::clone(&worker);
            let events = cycles.subscribe();
            tokio::spawn(async move { worker.relay_sync_events(events).await })
        };

        cycles.send(SyncEvent::Started).unwrap();
        assert_eq!(
            client.recv().await.unwrap(),
            WorkerMessage::SyncStatus { syncing: true }
        );

        cycles
            .send(SyncEvent::Finished(crate::sync::SyncReport {
                success: true,
                message: "Sync completed".to_string(),
                mutations_replayed: 1,
                inspections_synced: 0,
                evidence_synced: 0,
                failed: 0,
            }))
            .unwrap();
        assert_eq!(
            client.recv().await.unwrap(),
            WorkerMessage::SyncStatus { syncing: false }
        );

        // Relay winds down with the scheduler
        drop(cycles);
        relay.await.unwrap();
    }
}
