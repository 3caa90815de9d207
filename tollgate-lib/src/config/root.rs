use serde::Deserialize;
use std::net::SocketAddr;

use super::rate_limit::{RateLimitConfig, RouteRateLimitConfig, SweepConfig};
use super::telemetry::{LoggingConfig, TelemetryConfig};
use super::timeout::TimeoutConfig;

/// Route configuration for path-based admission policies
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Route {
    /// URL path prefix to match (e.g., "/api", "/login")
    /// Routes are matched in order, first match wins
    pub prefix: String,
    /// Rate limit override for this route (optional)
    /// If not provided, the global policy applies
    #[serde(default)]
    pub rate_limit: Option<RouteRateLimitConfig>,
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port to listen on
    /// Example: "0.0.0.0:7000" or "127.0.0.1:8080"
    pub listen: SocketAddr,
    /// Upstream service admitted requests are forwarded to (host:port)
    /// Example: "127.0.0.1:9000"
    pub backend: String,
    /// Global admission policy
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Idle bucket sweep schedule
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Per-route admission policies (optional)
    /// Default: empty (only the global policy applies)
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Telemetry configuration
    /// Controls metrics and the observability server
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Timeout configuration
    #[serde(default)]
    pub timeout: TimeoutConfig,
}
