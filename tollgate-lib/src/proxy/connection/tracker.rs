use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::guards::ConnectionGuard;
use crate::telemetry::Metrics;

/// Counts live client connections so shutdown can wait for them.
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    drained_tx: watch::Sender<()>,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (drained_tx, _) = watch::channel(());
        Self { active: Arc::new(AtomicUsize::new(0)), drained_tx }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Register a new connection; it counts as active until the guard drops.
    pub fn track(&self, metrics: Option<&Arc<Metrics>>) -> ConnectionGuard {
        self.active.fetch_add(1, Ordering::AcqRel);
        if let Some(m) = metrics {
            m.connections_active.add(1, &[]);
        }
        ConnectionGuard::new(
            Arc::clone(&self.active),
            self.drained_tx.clone(),
            metrics.map(|m| m.connections_active.clone()),
        )
    }

    /// Wait until no connection is active or `timeout` elapses.
    /// Returns the number of connections still open.
    pub async fn wait_drained(&self, timeout: Duration) -> usize {
        let mut drained = self.drained_tx.subscribe();
        let wait = async {
            while self.active() > 0 {
                if drained.changed().await.is_err() {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(timeout, wait).await;
        self.active()
    }
}
