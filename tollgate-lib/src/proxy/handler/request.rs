use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

use crate::admission::AdmissionManager;
use crate::proxy::forwarding::Upstream;
use crate::proxy::handler::admission::{apply_rate_limit_headers, check_admission, AdmissionOutcome};
use crate::proxy::synthetic_response::{synthetic_error_response, RespBody};
use crate::telemetry::Metrics;

/// Everything a connection needs to serve requests.
#[derive(Clone)]
pub struct GateContext {
    pub manager: Arc<AdmissionManager>,
    pub upstream: Upstream,
    pub metrics: Option<Arc<Metrics>>,
}

/// Gate one request: reject with 429, or forward upstream and tag the
/// response with the caller's remaining quota.
pub async fn handle_request(
    req: Request<Incoming>,
    peer: SocketAddr,
    ctx: &GateContext,
) -> Response<RespBody> {
    let quota = match check_admission(&ctx.manager, &req, peer, ctx.metrics.as_ref()) {
        AdmissionOutcome::Rejected(resp) => return resp,
        AdmissionOutcome::Admitted { limit, remaining } => Some((limit, remaining)),
        AdmissionOutcome::Unlimited => None,
    };

    let mut resp = match ctx.upstream.forward(req, ctx.metrics.as_ref()).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(upstream = %ctx.upstream.authority(), error = %e, "forwarding failed");
            synthetic_error_response(StatusCode::from(e))
        }
    };

    if let Some((limit, remaining)) = quota {
        apply_rate_limit_headers(resp.headers_mut(), limit, remaining);
    }
    resp
}
