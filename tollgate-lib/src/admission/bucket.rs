//! Token bucket for a single admission key.
//!
//! Refill is computed lazily from elapsed time on every check, so there is no
//! per-bucket timer. Token counts are integers and the number of tokens earned
//! is `elapsed / refill_interval` in integer nanoseconds, which keeps the math
//! free of floating-point drift.

use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use crate::admission::Decision;
use crate::error::{Result, TollgateError};

#[derive(Debug)]
pub(super) struct BucketState {
    tokens: u32,
    last_refill: Instant,
    last_seen: Instant,
}

/// A token bucket holding at most `capacity` tokens and earning one token per
/// `refill_interval`.
///
/// All state transitions of one bucket are serialized by its own mutex, so
/// checks for the same key are totally ordered while unrelated keys never
/// contend.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    refill_interval: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// # Errors
    /// Returns [`TollgateError::InvalidCapacity`] or
    /// [`TollgateError::InvalidRefillInterval`] for zero parameters.
    pub fn new(capacity: u32, refill_interval: Duration) -> Result<Self> {
        validate_bucket_params(capacity, refill_interval)?;
        Ok(Self::full_at(capacity, refill_interval, Instant::now()))
    }

    /// Build a full bucket whose clock starts at `now`. Parameters must already
    /// be validated.
    pub(crate) fn full_at(capacity: u32, refill_interval: Duration, now: Instant) -> Self {
        Self {
            capacity,
            refill_interval,
            state: Mutex::new(BucketState { tokens: capacity, last_refill: now, last_seen: now }),
        }
    }

    /// Take one token if available.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Same as [`allow`](Self::allow) with an explicit clock reading.
    pub fn allow_at(&self, now: Instant) -> bool {
        self.try_acquire_at(now).is_admitted()
    }

    /// Take one token if available and report the full decision.
    pub fn try_acquire(&self) -> Decision {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> Decision {
        let mut state = self.lock();
        if now > state.last_seen {
            state.last_seen = now;
        }

        self.refill(&mut state, now);

        if state.tokens > 0 {
            state.tokens = state.tokens.saturating_sub(1);
            Decision::Admitted { limit: self.capacity, remaining: state.tokens }
        } else {
            let elapsed = now.saturating_duration_since(state.last_refill);
            Decision::Rejected {
                limit: self.capacity,
                retry_after: self.refill_interval.saturating_sub(elapsed),
            }
        }
    }

    /// Refill the bucket to capacity and restart its clock.
    pub fn reset(&self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&self, now: Instant) {
        let mut state = self.lock();
        state.tokens = self.capacity;
        if now > state.last_refill {
            state.last_refill = now;
        }
        if now > state.last_seen {
            state.last_seen = now;
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    /// Current token count, without applying pending refill.
    pub fn tokens(&self) -> u32 {
        self.lock().tokens
    }

    /// Instant of the last refill that added at least one token (or of the last reset).
    pub fn last_refill(&self) -> Instant {
        self.lock().last_refill
    }

    /// Instant of the last check, admitted or rejected.
    pub fn last_seen(&self) -> Instant {
        self.lock().last_seen
    }

    /// How long the bucket has gone without a check, or `None` if another
    /// caller holds its lock right now (the bucket is in use).
    pub(crate) fn idle_for(&self, now: Instant) -> Option<Duration> {
        let last_seen = match self.state.try_lock() {
            Ok(state) => state.last_seen,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().last_seen,
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(now.saturating_duration_since(last_seen))
    }

    // The clock only moves when at least one whole token is earned, so partial
    // progress toward the next token carries over to later checks.
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        let earned = elapsed.as_nanos() / self.refill_interval.as_nanos();
        if earned == 0 {
            return;
        }

        let refilled = u128::from(state.tokens)
            .saturating_add(earned)
            .min(u128::from(self.capacity));
        state.tokens = u32::try_from(refilled).unwrap_or(self.capacity);
        state.last_refill = now;
    }

    // Every mutation leaves the state consistent, so a poisoned lock is safe to reuse.
    pub(super) fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reject parameters that would make a bucket useless or divide by zero.
pub(crate) fn validate_bucket_params(capacity: u32, refill_interval: Duration) -> Result<()> {
    if capacity == 0 {
        return Err(TollgateError::InvalidCapacity);
    }
    if refill_interval.is_zero() {
        return Err(TollgateError::InvalidRefillInterval(refill_interval));
    }
    Ok(())
}
