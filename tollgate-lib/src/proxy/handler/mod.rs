pub mod admission;
pub mod request;

pub use admission::{
    apply_rate_limit_headers, check_admission, too_many_requests, AdmissionOutcome,
    X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING,
};
pub use request::{handle_request, GateContext};
