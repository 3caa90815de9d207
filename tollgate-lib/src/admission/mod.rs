//! Keyed token-bucket admission control.
//!
//! Every request is mapped to a key (client address, authenticated user,
//! API key, or one shared global key) and must take one token from that
//! key's bucket to be admitted. Buckets refill lazily at check time, so an
//! idle key costs nothing but memory; a background sweeper evicts buckets
//! that have not been checked for a configurable period.
//!
//! # Architecture
//!
//! 1. **TokenBucket** (`bucket.rs`): capacity, refill interval and a mutex
//!    protected token count. Integer tokens only, partial progress towards
//!    the next token is never lost.
//!
//! 2. **BucketRegistry** (`registry.rs`): key to bucket map of one policy.
//!    Creates each bucket exactly once under concurrency.
//!
//! 3. **KeyExtractor** (`key.rs`): strategies for deriving a key from a
//!    request, with fallback to the client address.
//!
//! 4. **AdmissionController** / **AdmissionManager** (`controller.rs`,
//!    `manager.rs`): one controller per policy, routed by path prefix.
//!
//! 5. **IdleSweeper** (`sweeper.rs`): periodic eviction task per registry.
//!
//! # Example Usage
//!
//! ```ignore
//! use std::time::Duration;
//! use tollgate_lib::admission::BucketRegistry;
//!
//! // 5 requests burst, one more every 12 seconds
//! let registry = BucketRegistry::new(5, Duration::from_secs(12))?;
//!
//! if !registry.allow("192.168.1.1") {
//!     // Return 429 Too Many Requests
//! }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [rate_limit]
//! capacity = 200
//! refill_interval_ms = 10
//! limit_by = "ip"
//!
//! [sweep]
//! interval_secs = 600
//! idle_threshold_secs = 3600
//!
//! [[routes]]
//! prefix = "/login"
//! rate_limit = { name = "login", capacity = 5, refill_interval_ms = 12000 }
//! ```

mod bucket;
mod controller;
mod decision;
mod key;
mod manager;
mod policy;
mod registry;
mod sweeper;

pub use bucket::TokenBucket;
pub use controller::AdmissionController;
pub use decision::Decision;
pub use key::{AuthenticatedPrincipal, KeyExtractor, RequestIdentity, GLOBAL_KEY};
pub use manager::{AdmissionManager, GLOBAL_POLICY};
pub use policy::{RateLimitPolicy, MAX_SWEEP_PERIOD};
pub use registry::BucketRegistry;
pub use sweeper::{IdleSweep, IdleSweeper, SweeperHandle};
