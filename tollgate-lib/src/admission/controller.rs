use std::sync::Arc;
use tracing::debug;

use super::{BucketRegistry, Decision, KeyExtractor, RateLimitPolicy, RequestIdentity};
use crate::config::{RateLimitConfig, SweepConfig};
use crate::error::Result;

/// Admission decision point for one policy.
///
/// Holds no state of its own beyond the shared registry, so one controller
/// can serve any number of concurrent requests.
///
/// # Example
/// ```ignore
/// use std::time::Duration;
/// use tollgate_lib::admission::{AdmissionController, KeyExtractor, RateLimitPolicy};
///
/// let policy = RateLimitPolicy::new(
///     "login",
///     5,
///     Duration::from_secs(12),
///     Duration::from_secs(600),
///     Duration::from_secs(3600),
/// )?;
/// let controller = AdmissionController::new(policy, KeyExtractor::client_addr());
///
/// if controller.admit(&identity).is_rejected() {
///     // answer 429 Too Many Requests, skip the handler
/// }
/// ```
#[derive(Debug)]
pub struct AdmissionController {
    policy: RateLimitPolicy,
    registry: Arc<BucketRegistry>,
    extractor: KeyExtractor,
}

impl AdmissionController {
    /// Create a controller backed by a fresh registry for `policy`.
    pub fn new(policy: RateLimitPolicy, extractor: KeyExtractor) -> Self {
        let registry = Arc::new(BucketRegistry::for_policy(&policy));
        Self { policy, registry, extractor }
    }

    /// Build and validate a controller from a configuration section.
    pub fn from_config(
        name: impl Into<String>,
        rate_limit: &RateLimitConfig,
        sweep: &SweepConfig,
    ) -> Result<Self> {
        let policy = RateLimitPolicy::from_config(name, rate_limit, sweep)?;
        let extractor = KeyExtractor::from_config(rate_limit)?;
        Ok(Self::new(policy, extractor))
    }

    /// Extract the request's key and take a token from its bucket.
    pub fn admit(&self, identity: &RequestIdentity<'_>) -> Decision {
        let key = self.extractor.extract(identity);
        let decision = self.registry.check(&key);
        if decision.is_rejected() {
            debug!(policy = %self.policy.name(), strategy = self.strategy(), "admission rejected");
        }
        decision
    }

    /// Admission check for a key the caller already computed.
    pub fn admit_key(&self, key: &str) -> Decision {
        self.registry.check(key)
    }

    /// Refill the bucket for `key`. Returns false if the key has no bucket.
    pub fn reset(&self, key: &str) -> bool {
        self.registry.reset(key)
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &Arc<BucketRegistry> {
        &self.registry
    }

    pub fn extractor(&self) -> &KeyExtractor {
        &self.extractor
    }

    pub fn strategy(&self) -> &'static str {
        self.extractor.strategy()
    }
}
