#![forbid(unsafe_code)]

pub mod admission;
pub mod config;
pub mod error;
pub mod proxy;
pub mod telemetry;

pub use admission::{
    AdmissionController, AdmissionManager, BucketRegistry, Decision, KeyExtractor,
    RateLimitPolicy, TokenBucket,
};
pub use config::{load_from_path, Config, RateLimitConfig, Route};
pub use error::{Result, TollgateError};
pub use proxy::run;
