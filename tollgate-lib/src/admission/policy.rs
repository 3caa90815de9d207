use std::time::Duration;

use super::bucket::validate_bucket_params;
use crate::config::{RateLimitConfig, SweepConfig};
use crate::error::{Result, TollgateError};

/// Longest accepted sweep interval or idle threshold (one year).
pub const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Validated parameters of one admission policy.
///
/// All four values are required and must be positive; the sweep interval and
/// idle threshold are also capped at [`MAX_SWEEP_PERIOD`]. A policy that
/// cannot be built never starts, so misconfiguration surfaces at construction
/// time instead of on the first request or inside the sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    name: String,
    capacity: u32,
    refill_interval: Duration,
    sweep_interval: Duration,
    idle_threshold: Duration,
}

impl RateLimitPolicy {
    pub fn new(
        name: impl Into<String>,
        capacity: u32,
        refill_interval: Duration,
        sweep_interval: Duration,
        idle_threshold: Duration,
    ) -> Result<Self> {
        validate_bucket_params(capacity, refill_interval)?;
        if sweep_interval.is_zero() || sweep_interval > MAX_SWEEP_PERIOD {
            return Err(TollgateError::InvalidSweepInterval(sweep_interval));
        }
        if idle_threshold.is_zero() || idle_threshold > MAX_SWEEP_PERIOD {
            return Err(TollgateError::InvalidIdleThreshold(idle_threshold));
        }

        Ok(Self { name: name.into(), capacity, refill_interval, sweep_interval, idle_threshold })
    }

    pub fn from_config(
        name: impl Into<String>,
        rate_limit: &RateLimitConfig,
        sweep: &SweepConfig,
    ) -> Result<Self> {
        Self::new(
            name,
            rate_limit.capacity,
            Duration::from_millis(rate_limit.refill_interval_ms),
            Duration::from_secs(sweep.interval_secs),
            Duration::from_secs(sweep.idle_threshold_secs),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Time it takes to earn one token.
    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    pub fn idle_threshold(&self) -> Duration {
        self.idle_threshold
    }
}
