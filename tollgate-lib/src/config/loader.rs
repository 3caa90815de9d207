use ahash::AHashSet;
use http::HeaderName;
use std::fs;
use std::path::Path;

use crate::admission::MAX_SWEEP_PERIOD;
use crate::config::{Config, LimitBy, RateLimitConfig};
use crate::error::{Result, TollgateError};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| TollgateError::Config(format!("Failed to read config file: {e}")))?;
    parse_config(&txt)
}

/// Parse and validate a TOML configuration document.
pub fn parse_config(txt: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(txt)
        .map_err(|e| TollgateError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.backend.trim().is_empty() {
        return Err(TollgateError::Config("backend address cannot be empty".to_string()));
    }

    let max_secs = MAX_SWEEP_PERIOD.as_secs();
    if cfg.sweep.interval_secs == 0 || cfg.sweep.interval_secs > max_secs {
        return Err(TollgateError::Config(format!(
            "sweep.interval_secs must be in 1..={max_secs}"
        )));
    }
    if cfg.sweep.idle_threshold_secs == 0 || cfg.sweep.idle_threshold_secs > max_secs {
        return Err(TollgateError::Config(format!(
            "sweep.idle_threshold_secs must be in 1..={max_secs}"
        )));
    }

    validate_rate_limit("rate_limit", &cfg.rate_limit)?;

    let mut prefixes = AHashSet::new();
    let mut names = AHashSet::new();
    for route in &cfg.routes {
        if !route.prefix.starts_with('/') {
            return Err(TollgateError::Config(format!(
                "Route prefix must start with '/': {}",
                route.prefix
            )));
        }
        if !prefixes.insert(route.prefix.as_str()) {
            return Err(TollgateError::Config(format!("Duplicate route prefix: {}", route.prefix)));
        }

        if let Some(route_rate_limit) = &route.rate_limit {
            let name = route_rate_limit.name.as_deref().unwrap_or(&route.prefix);
            if name == "global" || !names.insert(name) {
                return Err(TollgateError::Config(format!("Duplicate policy name: {name}")));
            }
            let resolved = route_rate_limit.resolve(&cfg.rate_limit);
            validate_rate_limit(&format!("routes[{}].rate_limit", route.prefix), &resolved)?;
        }
    }

    Ok(())
}

fn validate_rate_limit(section: &str, rate_limit: &RateLimitConfig) -> Result<()> {
    if !rate_limit.enabled {
        return Ok(());
    }
    if rate_limit.capacity == 0 {
        return Err(TollgateError::Config(format!("{section}.capacity must be > 0")));
    }
    if rate_limit.refill_interval_ms == 0 {
        return Err(TollgateError::Config(format!("{section}.refill_interval_ms must be > 0")));
    }
    if rate_limit.limit_by == LimitBy::ApiKey
        && HeaderName::from_bytes(rate_limit.api_key_header.as_bytes()).is_err()
    {
        return Err(TollgateError::Config(format!(
            "{section}.api_key_header is not a valid header name: {}",
            rate_limit.api_key_header
        )));
    }
    Ok(())
}
