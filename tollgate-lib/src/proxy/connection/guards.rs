use opentelemetry::metrics::UpDownCounter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Decrements the active connection count when the connection task ends.
/// The last guard to drop wakes anyone waiting for the server to drain.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
    drained: watch::Sender<()>,
    connections_active: Option<UpDownCounter<i64>>,
}

impl ConnectionGuard {
    pub(super) fn new(
        counter: Arc<AtomicUsize>,
        drained: watch::Sender<()>,
        connections_active: Option<UpDownCounter<i64>>,
    ) -> Self {
        Self { counter, drained, connections_active }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let remaining = self.counter.fetch_sub(1, Ordering::AcqRel);
        if let Some(ref gauge) = self.connections_active {
            gauge.add(-1, &[]);
        }
        if remaining == 1 {
            self.drained.send_replace(());
        }
    }
}
