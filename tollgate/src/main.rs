#![forbid(unsafe_code)]

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tollgate_lib::admission::AdmissionManager;
use tollgate_lib::config::{load_from_path, Config};
use tollgate_lib::telemetry::{init_metrics, init_tracing, start_observability_server};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Token-bucket admission gate in front of one HTTP service")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", env = "TOLLGATE_CONFIG", default_value = "config/tollgate.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration {}: {err}", cli.config.display());
            std::process::exit(1);
        }
    };

    if let Err(err) =
        init_tracing(&cfg.logging.level, cfg.logging.show_target, &cfg.telemetry.otel_log_level)
    {
        eprintln!("failed to initialise logging: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(cfg).await {
        error!(%err, "tollgate exited with error");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = Arc::new(cfg);
    let manager = Arc::new(AdmissionManager::from_config(&cfg)?);
    info!(
        listen = ?cfg.listen,
        backend = %cfg.backend,
        policies = manager.controllers().count(),
        "configuration loaded"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let (metrics, registry) = match init_metrics() {
        Ok((metrics, registry)) => (Some(metrics), Some(registry)),
        Err(err) => {
            warn!(%err, "metrics disabled");
            (None, None)
        }
    };

    let sweepers = manager.spawn_sweepers(&shutdown, metrics.clone());

    let observability = match (cfg.telemetry.observability_addr(), registry) {
        (Some(addr), Some(registry)) => Some(tokio::spawn(start_observability_server(
            addr,
            registry,
            Arc::clone(&manager),
            cfg.telemetry.admin_reset,
            shutdown.clone(),
        ))),
        _ => None,
    };

    let result = tollgate_lib::proxy::run(Arc::clone(&cfg), manager, metrics, shutdown.clone()).await;
    shutdown.cancel();

    for sweeper in sweepers {
        if let Err(err) = sweeper.join().await {
            warn!(%err, "idle sweeper task failed");
        }
    }
    if let Some(handle) = observability {
        match handle.await {
            Ok(Err(err)) => warn!(%err, "observability server exited with error"),
            Err(err) => warn!(%err, "observability server task failed"),
            Ok(Ok(())) => {}
        }
    }

    result?;
    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
        _ = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}
