use ahash::AHashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::debug;

use super::bucket::{validate_bucket_params, TokenBucket};
use super::{Decision, RateLimitPolicy};
use crate::error::Result;

/// Concurrent map from admission key to its [`TokenBucket`].
///
/// Buckets are created lazily on first use with the registry's shared
/// capacity and refill interval. Lookups take the read lock; creation and
/// eviction take the write lock. At most one bucket ever exists per key.
///
/// Distinct policies (per-IP, per-user, per-route...) must use distinct
/// registries so their quotas don't interfere.
#[derive(Debug)]
pub struct BucketRegistry {
    capacity: u32,
    refill_interval: Duration,
    buckets: RwLock<AHashMap<String, Arc<TokenBucket>>>,
}

impl BucketRegistry {
    /// Create an empty registry.
    ///
    /// # Errors
    /// Fails fast on a zero capacity or zero refill interval.
    pub fn new(capacity: u32, refill_interval: Duration) -> Result<Self> {
        validate_bucket_params(capacity, refill_interval)?;
        Ok(Self { capacity, refill_interval, buckets: RwLock::new(AHashMap::new()) })
    }

    /// Create a registry for an already validated policy.
    pub fn for_policy(policy: &RateLimitPolicy) -> Self {
        Self {
            capacity: policy.capacity(),
            refill_interval: policy.refill_interval(),
            buckets: RwLock::new(AHashMap::new()),
        }
    }

    /// Return the bucket for `key`, creating a full one if absent.
    pub fn get_or_create(&self, key: &str) -> Arc<TokenBucket> {
        self.get_or_create_at(key, Instant::now())
    }

    pub fn get_or_create_at(&self, key: &str, now: Instant) -> Arc<TokenBucket> {
        if let Some(bucket) = self.read_buckets().get(key) {
            return Arc::clone(bucket);
        }

        // Another caller may have inserted the key between the two locks;
        // `entry` re-checks under the write lock before constructing.
        let mut buckets = self.write_buckets();
        let bucket = buckets.entry(key.to_owned()).or_insert_with(|| {
            Arc::new(TokenBucket::full_at(self.capacity, self.refill_interval, now))
        });
        Arc::clone(bucket)
    }

    /// Look up a bucket without creating it.
    pub fn get(&self, key: &str) -> Option<Arc<TokenBucket>> {
        self.read_buckets().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read_buckets().contains_key(key)
    }

    /// Take a token from the bucket for `key`.
    pub fn allow(&self, key: &str) -> bool {
        self.check(key).is_admitted()
    }

    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        self.check_at(key, now).is_admitted()
    }

    /// Take a token from the bucket for `key` and report the full decision.
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        self.get_or_create_at(key, now).try_acquire_at(now)
    }

    /// Refill the bucket for `key`. Unknown keys are left alone.
    pub fn reset(&self, key: &str) -> bool {
        match self.get(key) {
            Some(bucket) => {
                bucket.reset();
                true
            }
            None => false,
        }
    }

    /// Remove buckets that have not been checked for longer than `max_idle`.
    ///
    /// Returns the number of evicted buckets.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        self.sweep_idle_at(Instant::now(), max_idle)
    }

    /// Eviction happens under the registry's write lock only. A bucket whose
    /// own lock is held at sweep time is in use and is kept. A caller that
    /// obtained a bucket before its eviction finishes against that bucket; the
    /// next lookup for the key creates a fresh one.
    pub fn sweep_idle_at(&self, now: Instant, max_idle: Duration) -> usize {
        let mut buckets = self.write_buckets();
        let before = buckets.len();
        buckets.retain(|_, bucket| match bucket.idle_for(now) {
            Some(idle) => idle <= max_idle,
            None => true,
        });
        let evicted = before.saturating_sub(buckets.len());
        debug!(evicted, retained = buckets.len(), "idle sweep finished");
        evicted
    }

    pub fn len(&self) -> usize {
        self.read_buckets().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_buckets().is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    fn read_buckets(&self) -> RwLockReadGuard<'_, AHashMap<String, Arc<TokenBucket>>> {
        self.buckets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_buckets(&self) -> RwLockWriteGuard<'_, AHashMap<String, Arc<TokenBucket>>> {
        self.buckets.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_created_lazily() -> Result<()> {
        let registry = BucketRegistry::new(2, Duration::from_secs(1))?;
        assert!(registry.is_empty());
        assert!(registry.get("10.0.0.1").is_none());

        assert!(registry.allow("10.0.0.1"));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("10.0.0.1"));
        Ok(())
    }

    #[test]
    fn same_key_returns_same_bucket() -> Result<()> {
        let registry = BucketRegistry::new(2, Duration::from_secs(1))?;
        let first = registry.get_or_create("k");
        let second = registry.get_or_create("k");
        assert!(Arc::ptr_eq(&first, &second));
        Ok(())
    }

    #[test]
    fn sweep_keeps_a_bucket_locked_by_another_thread() -> Result<()> {
        use std::sync::Barrier;
        use std::thread;

        let registry = BucketRegistry::new(1, Duration::from_secs(1))?;
        let t0 = Instant::now();
        assert!(registry.allow_at("busy", t0));
        assert!(registry.allow_at("idle", t0));

        let busy = registry.get_or_create_at("busy", t0);
        let held = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let holder = {
            let held = Arc::clone(&held);
            let release = Arc::clone(&release);
            thread::spawn(move || {
                let _guard = busy.lock();
                held.wait();
                release.wait();
            })
        };

        held.wait();
        let later = t0 + Duration::from_secs(7200);
        let evicted = registry.sweep_idle_at(later, Duration::from_secs(3600));
        release.wait();
        assert!(holder.join().is_ok());

        assert_eq!(evicted, 1);
        assert!(registry.contains("busy"));
        assert!(!registry.contains("idle"));

        // Once released, the same bucket is idle and goes on the next sweep.
        assert_eq!(registry.sweep_idle_at(later, Duration::from_secs(3600)), 1);
        assert!(registry.is_empty());
        Ok(())
    }

    #[test]
    fn reset_of_unknown_key_creates_nothing() -> Result<()> {
        let registry = BucketRegistry::new(1, Duration::from_secs(1))?;
        assert!(!registry.reset("ghost"));
        assert!(registry.is_empty());
        Ok(())
    }
}
