use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Telemetry configuration
/// Controls metrics and the observability server
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Observability server port (optional)
    /// If provided, starts a separate HTTP server on this port serving
    /// `/metrics`, `/health`, `/live` and, when enabled, `/admin/reset`
    /// Default: None (observability server disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,
    /// Address the observability server binds to
    /// Default: "127.0.0.1"
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    /// Serve `POST /admin/reset`
    /// The route refills buckets without authentication; keep it on a
    /// loopback or otherwise private `bind` address.
    /// Default: false
    #[serde(default)]
    pub admin_reset: bool,
    /// OpenTelemetry internal log level
    /// Controls verbosity of OpenTelemetry SDK internal logs (not application logs)
    /// Default: "warn"
    #[serde(default = "default_otel_log_level")]
    pub otel_log_level: String,
}

impl TelemetryConfig {
    /// Socket address of the observability server, if one is configured.
    pub fn observability_addr(&self) -> Option<SocketAddr> {
        self.metrics_port.map(|port| SocketAddr::new(self.bind, port))
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: None,
            bind: default_bind(),
            admin_reset: false,
            otel_log_level: default_otel_log_level(),
        }
    }
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_otel_log_level() -> String {
    "warn".to_string()
}

/// Logging configuration
/// Controls application-level structured logging (stdout/stderr)
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    /// Default: "info"
    /// Can be overridden at runtime via RUST_LOG environment variable
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Show module path (target) in log messages
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
