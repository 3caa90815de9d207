//! Background eviction of idle buckets.
//!
//! Refill is lazy, so the sweep is the only periodic work the admission
//! layer does: one task per registry, independent of request traffic.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{AdmissionController, BucketRegistry, RateLimitPolicy};
use crate::telemetry::Metrics;

/// Something that can drop state idle for longer than `max_idle`.
pub trait IdleSweep: Send + Sync {
    /// Returns the number of evicted entries.
    fn sweep_idle(&self, max_idle: Duration) -> usize;
}

impl IdleSweep for BucketRegistry {
    fn sweep_idle(&self, max_idle: Duration) -> usize {
        BucketRegistry::sweep_idle(self, max_idle)
    }
}

/// Periodic idle sweep for one registry.
pub struct IdleSweeper {
    target: Arc<dyn IdleSweep>,
    policy: String,
    interval: Duration,
    max_idle: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl IdleSweeper {
    /// Sweep `target` on the schedule of `policy`.
    pub fn new(target: Arc<dyn IdleSweep>, policy: &RateLimitPolicy) -> Self {
        Self {
            target,
            policy: policy.name().to_string(),
            interval: policy.sweep_interval(),
            max_idle: policy.idle_threshold(),
            metrics: None,
        }
    }

    pub fn for_controller(controller: &AdmissionController) -> Self {
        let registry: Arc<BucketRegistry> = Arc::clone(controller.registry());
        Self::new(registry, controller.policy())
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<Metrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run one sweep now. A panic inside the sweep is caught and logged;
    /// `None` is returned in that case.
    pub fn sweep_once(&self) -> Option<usize> {
        let target = &self.target;
        let max_idle = self.max_idle;
        match catch_unwind(AssertUnwindSafe(|| target.sweep_idle(max_idle))) {
            Ok(evicted) => {
                debug!(policy = %self.policy, evicted, "idle buckets swept");
                if let Some(m) = &self.metrics {
                    m.record_sweep(&self.policy, evicted);
                }
                Some(evicted)
            }
            Err(_) => {
                error!(policy = %self.policy, "idle sweep panicked, keeping schedule");
                if let Some(m) = &self.metrics {
                    m.record_sweep_failure(&self.policy);
                }
                None
            }
        }
    }

    /// Start the schedule on the current tokio runtime.
    ///
    /// The sweeper stops when `parent` is cancelled or when
    /// [`SweeperHandle::stop`] is called. Stop is observed between ticks, so a
    /// sweep in progress always completes.
    pub fn spawn(self, parent: &CancellationToken) -> SweeperHandle {
        let token = parent.child_token();
        let task_token = token.clone();
        let handle = tokio::spawn(async move { self.run(task_token).await });
        SweeperHandle { token, handle }
    }

    async fn run(self, token: CancellationToken) {
        // The first sweep happens one full period after start.
        let Some(start) = Instant::now().checked_add(self.interval) else {
            error!(
                policy = %self.policy,
                interval = ?self.interval,
                "idle sweep interval out of range, sweeper not started"
            );
            return;
        };
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            policy = %self.policy,
            interval_secs = self.interval.as_secs(),
            idle_threshold_secs = self.max_idle.as_secs(),
            "idle sweeper started"
        );

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep_once();
                }
            }
        }

        info!(policy = %self.policy, "idle sweeper stopped");
    }
}

/// Handle to a running [`IdleSweeper`].
pub struct SweeperHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Halt future ticks. An in-flight sweep is not interrupted.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the sweeper task to exit.
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }
}
