use http::{Request, Response, Uri};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::TimeoutConfig;
use crate::proxy::http_result::{HttpError, HttpResult};
use crate::proxy::synthetic_response::RespBody;
use crate::telemetry::Metrics;

pub type HttpClient = Client<HttpConnector, Incoming>;

/// Pooled HTTP/1.1 client bound to the single upstream service.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct Upstream {
    authority: Arc<str>,
    client: HttpClient,
}

impl Upstream {
    /// `authority` is the upstream `host:port`.
    pub fn new(authority: &str, timeout: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(timeout.connect_ms)));
        connector.set_nodelay(true);

        let mut builder = Client::builder(TokioExecutor::new());
        builder.pool_idle_timeout(Duration::from_secs(timeout.upstream_idle_secs));

        Self { authority: Arc::from(authority), client: builder.build(connector) }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Send an admitted request upstream, keeping path, query, method,
    /// headers and body.
    pub async fn forward(
        &self,
        req: Request<Incoming>,
        metrics: Option<&Arc<Metrics>>,
    ) -> HttpResult<Response<RespBody>> {
        let start = Instant::now();
        let method = req.method().clone();

        let pq = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let uri = format!("http://{}{}", self.authority, pq)
            .parse::<Uri>()
            .map_err(|e| HttpError::InvalidUri(e.to_string()))?;

        let (mut parts, body) = req.into_parts();
        parts.uri = uri;
        // The pooled client speaks HTTP/1.1 upstream regardless of the client's version.
        parts.version = http::Version::HTTP_11;
        let out_req = Request::from_parts(parts, body);

        let result = self.client.request(out_req).await;
        let duration = start.elapsed().as_secs_f64();

        match result {
            Ok(resp) => {
                if let Some(m) = metrics {
                    m.record_upstream_request(method.as_str(), resp.status().as_u16(), duration);
                }
                Ok(resp.map(|b| b.boxed()))
            }
            Err(e) => {
                let error = if e.is_connect() {
                    HttpError::UpstreamConnect(e.to_string())
                } else {
                    HttpError::FailedToGetResponseFromUpstream(e.to_string())
                };
                debug!(upstream = %self.authority, error = %error, "upstream request failed");
                if let Some(m) = metrics {
                    m.record_upstream_error(error.error_type());
                }
                Err(error)
            }
        }
    }
}
