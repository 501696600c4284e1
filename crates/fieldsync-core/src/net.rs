//! Network availability monitor
//!
//! Tracks connectivity transitions reported by the platform. The signal is
//! a hint only: callers still handle per-request failure, and the sync
//! engine never trusts `is_online` blindly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

/// Grace window after a reconnect during which `was_offline` stays true,
/// for UI transition purposes
const RECONNECT_GRACE: Duration = Duration::from_secs(3);

/// Result of feeding a connectivity observation to the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// offline -> online edge; trigger a sync cycle exactly once
    CameOnline,
    /// online -> offline edge
    WentOffline,
    /// No change
    Unchanged,
}

#[derive(Debug)]
struct Inner {
    online: AtomicBool,
    last_reconnect: std::sync::Mutex<Option<Instant>>,
}

/// Observes connectivity transitions and fans them out to listeners.
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<Inner>,
    tx: watch::Sender<bool>,
}

impl NetworkMonitor {
    /// Create a monitor with the given initial connectivity state
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self {
            inner: Arc::new(Inner {
                online: AtomicBool::new(initially_online),
                last_reconnect: std::sync::Mutex::new(None),
            }),
            tx,
        }
    }

    /// Current connectivity hint
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// True for a short grace window after reconnecting
    #[must_use]
    pub fn was_offline(&self) -> bool {
        let guard = self
            .inner
            .last_reconnect
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.is_some_and(|at| at.elapsed() < RECONNECT_GRACE)
    }

    /// Feed a connectivity observation; returns the edge, if any.
    ///
    /// The offline -> online edge is reported exactly once per transition
    /// regardless of listener count, so sync is triggered once.
    pub fn set_online(&self, online: bool) -> Transition {
        let previous = self.inner.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return Transition::Unchanged;
        }

        if online {
            let mut guard = self
                .inner
                .last_reconnect
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *guard = Some(Instant::now());
        }

        self.tx.send_replace(online);
        if online {
            tracing::info!("Network connection restored");
            Transition::CameOnline
        } else {
            tracing::info!("Network connection lost");
            Transition::WentOffline
        }
    }

    /// Subscribe to connectivity changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Shift the recorded reconnect instant into the past
    #[cfg(test)]
    fn backdate_reconnect(&self, by: Duration) {
        let mut guard = self
            .inner
            .last_reconnect
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = guard.map(|at| at - by);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_edges() {
        let monitor = NetworkMonitor::new(true);
        assert!(monitor.is_online());

        assert_eq!(monitor.set_online(false), Transition::WentOffline);
        assert!(!monitor.is_online());

        // Repeated observations of the same state are not edges
        assert_eq!(monitor.set_online(false), Transition::Unchanged);

        assert_eq!(monitor.set_online(true), Transition::CameOnline);
        assert_eq!(monitor.set_online(true), Transition::Unchanged);
    }

    #[test]
    fn test_was_offline_grace_window() {
        let monitor = NetworkMonitor::new(true);
        assert!(!monitor.was_offline());

        monitor.set_online(false);
        monitor.set_online(true);
        assert!(monitor.was_offline());
    }

    #[test]
    fn test_was_offline_expires_after_grace() {
        let monitor = NetworkMonitor::new(true);
        monitor.set_online(false);
        monitor.set_online(true);
        assert!(monitor.was_offline());

        monitor.backdate_reconnect(RECONNECT_GRACE);
        assert!(!monitor.was_offline());

        // A fresh reconnect edge re-arms the window
        monitor.set_online(false);
        monitor.set_online(true);
        assert!(monitor.was_offline());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_subscribers_observe_changes() {
        let monitor = NetworkMonitor::new(true);
        let mut rx = monitor.subscribe();

        monitor.set_online(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow());
    }
}
