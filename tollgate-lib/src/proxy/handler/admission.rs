use http::header::{HeaderName, HeaderValue, RETRY_AFTER};
use http::{HeaderMap, Request, StatusCode};
use hyper::Response;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::admission::{AdmissionManager, Decision, RequestIdentity};
use crate::proxy::synthetic_response::{synthetic_response, RespBody};
use crate::telemetry::Metrics;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Result of running a request through the admission gate.
#[derive(Debug)]
pub enum AdmissionOutcome {
    /// No policy covers the request path.
    Unlimited,
    /// A token was taken; the request proceeds.
    Admitted { limit: u32, remaining: u32 },
    /// Ready-made 429 response; the downstream handler must not run.
    Rejected(Response<RespBody>),
}

impl AdmissionOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, AdmissionOutcome::Rejected(_))
    }
}

/// Check the admission policy responsible for the request path.
pub fn check_admission<B>(
    manager: &AdmissionManager,
    req: &Request<B>,
    peer: SocketAddr,
    metrics: Option<&Arc<Metrics>>,
) -> AdmissionOutcome {
    let Some(controller) = manager.controller_for(req.uri().path()) else {
        return AdmissionOutcome::Unlimited;
    };

    let identity = RequestIdentity::from_request(req, peer);
    let decision = controller.admit(&identity);

    if let Some(m) = metrics {
        m.record_admission(controller.policy().name(), controller.strategy(), decision.is_admitted());
    }

    match decision {
        Decision::Admitted { limit, remaining } => AdmissionOutcome::Admitted { limit, remaining },
        Decision::Rejected { limit, retry_after } => {
            AdmissionOutcome::Rejected(too_many_requests(limit, retry_after))
        }
    }
}

/// 429 response. Never carries the admission key.
pub fn too_many_requests(limit: u32, retry_after: Duration) -> Response<RespBody> {
    let mut resp = synthetic_response(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests");
    apply_rate_limit_headers(resp.headers_mut(), limit, 0);
    resp.headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
    resp
}

pub fn apply_rate_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
}

/// Whole seconds, rounded up, at least 1.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after
        .as_secs()
        .saturating_add(u64::from(retry_after.subsec_nanos() > 0));
    secs.max(1)
}
