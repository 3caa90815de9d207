use serde::Deserialize;

/// Rate limiting configuration for one admission policy
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Bucket capacity: maximum burst of requests admitted for one key
    /// Must be > 0
    /// Default: 200
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    /// Time it takes to earn one token, in milliseconds
    /// Must be > 0
    /// Default: 10 (100 requests per second)
    #[serde(default = "default_refill_interval_ms")]
    pub refill_interval_ms: u64,
    /// Key extraction strategy
    /// Default: "ip"
    #[serde(default = "default_limit_by")]
    pub limit_by: LimitBy,
    /// Header carrying the API key for limit_by = "api_key"
    /// Default: "x-api-key"
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// Use the first X-Forwarded-For hop as client address
    /// Only enable behind a proxy that sets this header itself
    /// Default: false
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_capacity(),
            refill_interval_ms: default_refill_interval_ms(),
            limit_by: default_limit_by(),
            api_key_header: default_api_key_header(),
            trust_forwarded_for: false,
        }
    }
}

/// Per-route rate limiting configuration
///
/// Unspecified fields inherit from the global `[rate_limit]` section. Each
/// enabled route gets its own bucket registry.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct RouteRateLimitConfig {
    /// Policy name used in metrics and admin resets
    /// If not specified, the route prefix is used
    pub name: Option<String>,
    /// Enable rate limiting for this route
    /// If not specified, inherits from global config
    pub enabled: Option<bool>,
    /// Bucket capacity for this route
    pub capacity: Option<u32>,
    /// Refill interval for this route, in milliseconds
    pub refill_interval_ms: Option<u64>,
    /// Key extraction strategy for this route
    pub limit_by: Option<LimitBy>,
    /// API key header for this route
    pub api_key_header: Option<String>,
    /// Trust X-Forwarded-For for this route
    pub trust_forwarded_for: Option<bool>,
}

impl RouteRateLimitConfig {
    /// Merge with the global section, route values winning.
    pub fn resolve(&self, global: &RateLimitConfig) -> RateLimitConfig {
        RateLimitConfig {
            enabled: self.enabled.unwrap_or(global.enabled),
            capacity: self.capacity.unwrap_or(global.capacity),
            refill_interval_ms: self.refill_interval_ms.unwrap_or(global.refill_interval_ms),
            limit_by: self.limit_by.unwrap_or(global.limit_by),
            api_key_header: self
                .api_key_header
                .clone()
                .unwrap_or_else(|| global.api_key_header.clone()),
            trust_forwarded_for: self.trust_forwarded_for.unwrap_or(global.trust_forwarded_for),
        }
    }
}

/// Rate limiting key extraction strategy
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LimitBy {
    /// One bucket shared by all traffic
    Global,
    /// Rate limit by client IP address
    Ip,
    /// Rate limit by authenticated principal
    /// Falls back to client IP for anonymous requests
    User,
    /// Rate limit by API key header
    /// Falls back to client IP when the header is missing
    ApiKey,
}

impl LimitBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitBy::Global => "global",
            LimitBy::Ip => "ip",
            LimitBy::User => "user",
            LimitBy::ApiKey => "api_key",
        }
    }
}

/// Idle-sweep configuration shared by every policy
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    /// How often idle buckets are swept, in seconds
    /// Default: 600 (10 minutes)
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
    /// Buckets not checked for longer than this are evicted, in seconds
    /// Default: 3600 (1 hour)
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
            idle_threshold_secs: default_idle_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_capacity() -> u32 {
    200
}

fn default_refill_interval_ms() -> u64 {
    10
}

fn default_limit_by() -> LimitBy {
    LimitBy::Ip
}

fn default_api_key_header() -> String {
    "x-api-key".to_string()
}

fn default_sweep_interval() -> u64 {
    600
}

fn default_idle_threshold() -> u64 {
    3600
}
