//! Background sync scheduling
//!
//! Runs sync cycles on three triggers: a reconnect edge from the network
//! monitor, a periodic interval, and explicit requests from clients (the
//! CLI, or the cache worker forwarding a sync request).

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use super::{InspectionApi, SyncEngine, SyncReport};
use crate::net::NetworkMonitor;

/// Periodic background sync interval
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Lifecycle notifications broadcast around each sync cycle
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A cycle is starting
    Started,
    /// A cycle finished with this outcome
    Finished(SyncReport),
}

enum Command {
    SyncNow,
    Shutdown,
}

/// Handle for talking to a running scheduler from other tasks
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SyncEvent>,
}

impl SchedulerHandle {
    /// Request an immediate sync cycle
    pub async fn sync_now(&self) {
        if self.commands.send(Command::SyncNow).await.is_err() {
            tracing::warn!("Sync scheduler is no longer running");
        }
    }

    /// Ask the scheduler loop to exit after the current cycle
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    /// Subscribe to sync lifecycle events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }
}

/// Drives sync cycles in a background task.
pub struct SyncScheduler<A> {
    engine: SyncEngine<A>,
    monitor: NetworkMonitor,
    interval: Duration,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<SyncEvent>,
}

impl<A: InspectionApi> SyncScheduler<A> {
    /// Create a scheduler and the handle used to drive it.
    #[must_use]
    pub fn new(
        engine: SyncEngine<A>,
        monitor: NetworkMonitor,
        interval: Duration,
    ) -> (Self, SchedulerHandle) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, _) = broadcast::channel(16);

        let handle = SchedulerHandle {
            commands: command_tx,
            events: event_tx.clone(),
        };
        let scheduler = Self {
            engine,
            monitor,
            interval,
            commands: command_rx,
            events: event_tx,
        };
        (scheduler, handle)
    }

    /// Run the scheduling loop until shutdown or all handles drop.
    ///
    /// Connectivity notifications only fire on actual edges, so a reconnect
    /// triggers exactly one cycle no matter how many tasks observe it.
    pub async fn run(mut self) {
        let mut connectivity = self.monitor.subscribe();
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick is immediate; skip it so startup does not sync twice
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.monitor.is_online() {
                        self.run_cycle("interval").await;
                    }
                }
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Network monitor dropped, stopping sync scheduler");
                        return;
                    }
                    if *connectivity.borrow_and_update() {
                        self.run_cycle("reconnect").await;
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        Some(Command::SyncNow) => self.run_cycle("request").await,
                        Some(Command::Shutdown) | None => {
                            tracing::debug!("Sync scheduler shutting down");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn run_cycle(&self, trigger: &str) {
        tracing::info!(trigger, "Starting sync cycle");
        let _ = self.events.send(SyncEvent::Started);

        let report = self.engine.sync_all().await;
        if report.success {
            tracing::info!(trigger, "{}", report.message);
        } else {
            tracing::warn!(trigger, "{}", report.message);
        }

        let _ = self.events.send(SyncEvent::Finished(report));
    }
}
