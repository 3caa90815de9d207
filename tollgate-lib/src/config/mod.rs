mod loader;
mod rate_limit;
mod root;
mod telemetry;
mod timeout;

pub use loader::{load_from_path, parse_config};
pub use rate_limit::{LimitBy, RateLimitConfig, RouteRateLimitConfig, SweepConfig};
pub use root::{Config, Route};
pub use telemetry::{LoggingConfig, TelemetryConfig};
pub use timeout::TimeoutConfig;
