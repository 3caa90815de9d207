use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::admission::AdmissionManager;
use crate::config::Config;
use crate::error::Result;
use crate::proxy::connection::ConnectionTracker;
use crate::proxy::forwarding::Upstream;
use crate::proxy::handler::{handle_request, GateContext};
use crate::telemetry::Metrics;

/// Bind `config.listen` and serve until `shutdown` is cancelled.
pub async fn run(
    config: Arc<Config>,
    manager: Arc<AdmissionManager>,
    metrics: Option<Arc<Metrics>>,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(config.listen).await?;
    serve(listener, config, manager, metrics, shutdown).await
}

/// Serve on an already bound listener.
///
/// On cancellation the listener is closed, open connections are asked to
/// finish their in-flight requests, and the call returns once they are gone
/// or `timeout.shutdown_secs` has elapsed.
pub async fn serve(
    listener: TcpListener,
    config: Arc<Config>,
    manager: Arc<AdmissionManager>,
    metrics: Option<Arc<Metrics>>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    let builder = ConnBuilder::new(TokioExecutor::new());
    let ctx = Arc::new(GateContext {
        manager,
        upstream: Upstream::new(&config.backend, &config.timeout),
        metrics,
    });
    let tracker = ConnectionTracker::new();

    info!(?addr, upstream = %config.backend, "admission gate listening (h1/h2)");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };

                let guard = tracker.track(ctx.metrics.as_ref());
                let builder = builder.clone();
                let ctx = Arc::clone(&ctx);
                let shutdown = shutdown.clone();

                tokio::spawn(async move {
                    let _guard = guard;
                    serve_connection(builder, stream, peer, ctx, shutdown).await;
                });
            }
        }
    }
    drop(listener);

    let shutdown_timeout = Duration::from_secs(config.timeout.shutdown_secs);
    info!(
        active_connections = tracker.active(),
        timeout_secs = shutdown_timeout.as_secs(),
        "Waiting for active connections to finish"
    );
    let remaining = tracker.wait_drained(shutdown_timeout).await;
    if remaining > 0 {
        warn!(active_connections = remaining, "Shutdown timeout reached with connections still open");
    } else {
        info!("All connections closed");
    }

    info!("Admission gate stopped");
    Ok(())
}

async fn serve_connection(
    builder: ConnBuilder<TokioExecutor>,
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    ctx: Arc<GateContext>,
    shutdown: CancellationToken,
) {
    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
        let ctx = Arc::clone(&ctx);
        async move { Ok::<_, hyper::Error>(handle_request(req, peer, &ctx).await) }
    });

    let conn = builder.serve_connection(TokioIo::new(stream), svc);
    tokio::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };
    if let Err(e) = result {
        warn!(?peer, error = %e, "serve_connection error");
    }
}
