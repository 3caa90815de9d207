use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{AdmissionController, IdleSweeper, SweeperHandle};
use crate::config::Config;
use crate::error::{Result, TollgateError};
use crate::telemetry::Metrics;

/// Name of the policy built from the top-level `[rate_limit]` section.
pub const GLOBAL_POLICY: &str = "global";

/// What a matched route does with its requests.
#[derive(Debug)]
enum RouteAdmission {
    /// No override: the global policy applies.
    Inherit,
    /// Override with `enabled = false`: the route is not limited.
    Exempt,
    /// Dedicated policy with its own registry.
    Own(Arc<AdmissionController>),
}

#[derive(Debug)]
struct RouteEntry {
    prefix: String,
    admission: RouteAdmission,
}

/// Holds the global controller and every per-route controller.
///
/// Routes are matched by path prefix in declaration order; the first match
/// decides which controller (if any) sees the request.
#[derive(Debug, Default)]
pub struct AdmissionManager {
    global: Option<Arc<AdmissionController>>,
    routes: Vec<RouteEntry>,
}

impl AdmissionManager {
    /// Manager with only a global controller (or none).
    pub fn new(global: Option<AdmissionController>) -> Self {
        Self { global: global.map(Arc::new), routes: Vec::new() }
    }

    /// Add a route that uses its own controller.
    pub fn with_route(mut self, prefix: impl Into<String>, controller: AdmissionController) -> Self {
        self.routes.push(RouteEntry {
            prefix: prefix.into(),
            admission: RouteAdmission::Own(Arc::new(controller)),
        });
        self
    }

    /// Add a route that bypasses admission entirely.
    pub fn with_exempt_route(mut self, prefix: impl Into<String>) -> Self {
        self.routes.push(RouteEntry { prefix: prefix.into(), admission: RouteAdmission::Exempt });
        self
    }

    /// Build every controller described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let global = if config.rate_limit.enabled {
            Some(Arc::new(AdmissionController::from_config(
                GLOBAL_POLICY,
                &config.rate_limit,
                &config.sweep,
            )?))
        } else {
            None
        };

        let mut routes = Vec::with_capacity(config.routes.len());
        for route in &config.routes {
            let admission = match &route.rate_limit {
                None => RouteAdmission::Inherit,
                Some(route_rate_limit) => {
                    let resolved = route_rate_limit.resolve(&config.rate_limit);
                    if resolved.enabled {
                        let name = route_rate_limit.name.as_deref().unwrap_or(&route.prefix);
                        RouteAdmission::Own(Arc::new(AdmissionController::from_config(
                            name,
                            &resolved,
                            &config.sweep,
                        )?))
                    } else {
                        RouteAdmission::Exempt
                    }
                }
            };
            routes.push(RouteEntry { prefix: route.prefix.clone(), admission });
        }

        Ok(Self { global, routes })
    }

    /// Controller responsible for `path`, or `None` when the path is not limited.
    pub fn controller_for(&self, path: &str) -> Option<&Arc<AdmissionController>> {
        let matched = self.routes.iter().find(|r| path.starts_with(&r.prefix));
        match matched.map(|r| &r.admission) {
            Some(RouteAdmission::Own(controller)) => Some(controller),
            Some(RouteAdmission::Exempt) => None,
            Some(RouteAdmission::Inherit) | None => self.global.as_ref(),
        }
    }

    /// Look up a controller by policy name.
    pub fn controller(&self, policy: &str) -> Option<&Arc<AdmissionController>> {
        self.controllers().find(|c| c.policy().name() == policy)
    }

    /// All controllers, global first.
    pub fn controllers(&self) -> impl Iterator<Item = &Arc<AdmissionController>> {
        self.global.iter().chain(self.routes.iter().filter_map(|r| match &r.admission {
            RouteAdmission::Own(controller) => Some(controller),
            _ => None,
        }))
    }

    /// Refill the bucket for `key` under `policy`.
    ///
    /// Returns `Ok(false)` when the policy exists but has no bucket for the
    /// key, and an error when the policy is unknown.
    pub fn reset(&self, policy: &str, key: &str) -> Result<bool> {
        self.controller(policy)
            .map(|c| c.reset(key))
            .ok_or_else(|| TollgateError::UnknownPolicy(policy.to_string()))
    }

    pub fn is_enabled(&self) -> bool {
        self.controllers().next().is_some()
    }

    /// Start one idle sweeper per controller. All of them stop when `token`
    /// is cancelled.
    pub fn spawn_sweepers(
        &self,
        token: &CancellationToken,
        metrics: Option<Arc<Metrics>>,
    ) -> Vec<SweeperHandle> {
        self.controllers()
            .map(|c| IdleSweeper::for_controller(c).with_metrics(metrics.clone()).spawn(token))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const CONFIG: &str = r#"
listen = "127.0.0.1:7000"
backend = "127.0.0.1:9000"

[rate_limit]
capacity = 100

[[routes]]
prefix = "/login"
rate_limit = { name = "login", capacity = 5, refill_interval_ms = 12000 }

[[routes]]
prefix = "/health"
rate_limit = { enabled = false }

[[routes]]
prefix = "/api"
"#;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

    #[test]
    fn routes_resolve_to_expected_controllers() -> TestResult {
        let config = parse_config(CONFIG)?;
        let manager = AdmissionManager::from_config(&config)?;

        let login = manager.controller_for("/login/form").ok_or("no login controller")?;
        assert_eq!(login.policy().name(), "login");
        assert_eq!(login.policy().capacity(), 5);

        assert!(manager.controller_for("/health").is_none());

        let api = manager.controller_for("/api/users").ok_or("no controller for /api")?;
        assert_eq!(api.policy().name(), GLOBAL_POLICY);
        assert_eq!(api.policy().capacity(), 100);

        let other = manager.controller_for("/").ok_or("no global controller")?;
        assert!(Arc::ptr_eq(api, other));
        Ok(())
    }

    #[test]
    fn reset_of_unknown_policy_is_an_error() -> TestResult {
        let config = parse_config(CONFIG)?;
        let manager = AdmissionManager::from_config(&config)?;

        assert!(matches!(
            manager.reset("nope", "10.0.0.1"),
            Err(TollgateError::UnknownPolicy(name)) if name == "nope"
        ));
        assert!(!manager.reset("login", "10.0.0.1")?);
        Ok(())
    }

    #[test]
    fn disabled_global_policy_leaves_unmatched_paths_unlimited() -> TestResult {
        let config = parse_config(
            r#"
listen = "127.0.0.1:7000"
backend = "127.0.0.1:9000"

[rate_limit]
enabled = false
"#,
        )?;
        let manager = AdmissionManager::from_config(&config)?;
        assert!(!manager.is_enabled());
        assert!(manager.controller_for("/anything").is_none());
        Ok(())
    }
}
