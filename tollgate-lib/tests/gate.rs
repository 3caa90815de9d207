use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use reqwest::StatusCode;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tollgate_lib::admission::AdmissionManager;
use tollgate_lib::config::parse_config;
use tollgate_lib::proxy::serve;
use tollgate_lib::TollgateError;

type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Minimal upstream answering `upstream saw <path>`.
async fn spawn_backend() -> Result<SocketAddr, Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let svc = service_fn(|req: Request<Incoming>| async move {
                    let body = format!("upstream saw {}", req.uri().path());
                    Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(body))))
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), svc)
                    .await;
            });
        }
    });
    Ok(addr)
}

/// Address nothing listens on.
async fn closed_port() -> Result<SocketAddr, Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?)
}

struct Gate {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<Result<(), TollgateError>>,
}

async fn spawn_gate(backend: SocketAddr) -> Result<Gate, Box<dyn std::error::Error + Send + Sync>> {
    let cfg = parse_config(&format!(
        r#"
listen = "127.0.0.1:0"
backend = "{backend}"

[rate_limit]
enabled = false

[[routes]]
prefix = "/login"
rate_limit = {{ name = "login", enabled = true, capacity = 2, refill_interval_ms = 60000 }}

[timeout]
connect_ms = 500
shutdown_secs = 2
"#
    ))?;
    let manager = Arc::new(AdmissionManager::from_config(&cfg)?);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(serve(listener, Arc::new(cfg), manager, None, shutdown.clone()));
    Ok(Gate { addr, shutdown, task })
}

fn client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().no_proxy().build()
}

#[tokio::test]
async fn admitted_requests_reach_upstream_until_bucket_is_empty() -> TestResult {
    let backend = spawn_backend().await?;
    let gate = spawn_gate(backend).await?;
    let client = client()?;
    let url = format!("http://{}/login", gate.addr);

    for expected_remaining in ["1", "0"] {
        let resp = client.get(&url).send().await?;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-ratelimit-limit"], "2");
        assert_eq!(resp.headers()["x-ratelimit-remaining"], expected_remaining);
        assert_eq!(resp.text().await?, "upstream saw /login");
    }

    let resp = client.get(&url).send().await?;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "0");
    let retry_after: u64 = resp.headers()["retry-after"].to_str()?.parse()?;
    assert!((1..=60).contains(&retry_after));
    let body = resp.text().await?;
    assert_eq!(body, "Too Many Requests");
    assert!(!body.contains("127.0.0.1"));

    gate.shutdown.cancel();
    gate.task.await??;
    Ok(())
}

#[tokio::test]
async fn unlimited_paths_are_forwarded_without_quota_headers() -> TestResult {
    let backend = spawn_backend().await?;
    let gate = spawn_gate(backend).await?;
    let client = client()?;

    for _ in 0..5 {
        let resp = client.get(format!("http://{}/public/page", gate.addr)).send().await?;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get("x-ratelimit-limit").is_none());
        assert_eq!(resp.text().await?, "upstream saw /public/page");
    }

    gate.shutdown.cancel();
    gate.task.await??;
    Ok(())
}

#[tokio::test]
async fn unreachable_upstream_returns_bad_gateway() -> TestResult {
    let backend = closed_port().await?;
    let gate = spawn_gate(backend).await?;
    let client = client()?;

    let resp = client.get(format!("http://{}/login", gate.addr)).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    // The token was still spent on the admitted request.
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "1");

    gate.shutdown.cancel();
    gate.task.await??;
    Ok(())
}

#[tokio::test]
async fn shutdown_stops_accepting_connections() -> TestResult {
    let backend = spawn_backend().await?;
    let gate = spawn_gate(backend).await?;
    let client = client()?;

    let resp = client.get(format!("http://{}/public", gate.addr)).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);

    gate.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), gate.task).await???;

    let fresh = self::client()?;
    assert!(fresh.get(format!("http://{}/public", gate.addr)).send().await.is_err());
    Ok(())
}
