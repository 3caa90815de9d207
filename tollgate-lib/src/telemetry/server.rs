use http::{Method, StatusCode};
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::admission::AdmissionManager;
use crate::error::Result;
use crate::proxy::synthetic_response::{synthetic_error_response, RespBody};
use crate::telemetry::admin::{bad_request, reset_response, MAX_ADMIN_BODY};
use crate::telemetry::{handle_metrics, health_check_response, live_check_response};

struct ObservabilityState {
    registry: Registry,
    manager: Arc<AdmissionManager>,
    admin_reset: bool,
}

/// Start the observability server on `addr`.
///
/// Routes:
/// - `GET /metrics` - Prometheus metrics
/// - `GET /health` - Health check endpoint
/// - `GET /live` - Liveness check endpoint
/// - `POST /admin/reset` - refill one bucket, body `{"policy": .., "key": ..}`;
///   only served when `admin_reset` is set
pub async fn start_observability_server(
    addr: SocketAddr,
    registry: Registry,
    manager: Arc<AdmissionManager>,
    admin_reset: bool,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_observability(listener, registry, manager, admin_reset, shutdown).await
}

/// Serve observability routes on an already bound listener until `shutdown`
/// is cancelled.
pub async fn serve_observability(
    listener: TcpListener,
    registry: Registry,
    manager: Arc<AdmissionManager>,
    admin_reset: bool,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    if admin_reset && !addr.ip().is_loopback() {
        warn!(?addr, "admin reset is enabled on a non-loopback address");
    }
    let state = Arc::new(ObservabilityState { registry, manager, admin_reset });
    let builder = ConnBuilder::new(TokioExecutor::new());

    info!(?addr, admin_reset, "Observability server started (metrics + health checks)");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Observability server: shutting down");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "Observability server: accept error");
                        continue;
                    }
                };

                let state = Arc::clone(&state);
                let builder = builder.clone();
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let state = Arc::clone(&state);
                        async move { Ok::<_, hyper::Error>(route(req, &state).await) }
                    });

                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "Observability server: serve_connection error");
                    }
                });
            }
        }
    }

    info!("Observability server stopped");
    Ok(())
}

async fn route(req: Request<Incoming>, state: &ObservabilityState) -> Response<RespBody> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let result = match (&method, path.as_str()) {
        (&Method::GET, "/health") => health_check_response(state.manager.controllers().count()),
        (&Method::GET, "/live") => live_check_response(),
        (&Method::GET, "/metrics") => handle_metrics(&state.registry),
        (_, "/admin/reset") if !state.admin_reset => {
            return synthetic_error_response(StatusCode::NOT_FOUND);
        }
        (&Method::POST, "/admin/reset") => {
            match Limited::new(req.into_body(), MAX_ADMIN_BODY).collect().await {
                Ok(collected) => reset_response(&state.manager, &collected.to_bytes()),
                Err(e) => bad_request(&format!("unreadable body: {e}")),
            }
        }
        (_, "/health" | "/live" | "/metrics" | "/admin/reset") => {
            return synthetic_error_response(StatusCode::METHOD_NOT_ALLOWED);
        }
        _ => return synthetic_error_response(StatusCode::NOT_FOUND),
    };

    result.unwrap_or_else(|e| {
        warn!(error = %e, "Observability server: failed to build response");
        synthetic_error_response(StatusCode::INTERNAL_SERVER_ERROR)
    })
}
