//! Admission key extraction.
//!
//! A key identifies the principal being rate limited. Whenever a strategy
//! cannot determine its key (anonymous request, missing API key header,
//! custom function returning `None`) it falls back to the client address, so
//! a misconfigured policy still limits traffic instead of letting it through.

use http::{HeaderMap, HeaderName, Request};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{LimitBy, RateLimitConfig};
use crate::error::{Result, TollgateError};

/// Key used by the `Global` strategy: a single bucket shared by all traffic.
pub const GLOBAL_KEY: &str = "global";

/// Identity of an authenticated caller.
///
/// An authentication layer running before the gate inserts this into the
/// request extensions; the `User` strategy reads it from there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal(pub String);

/// The parts of a request a key strategy may look at.
#[derive(Debug, Clone, Copy)]
pub struct RequestIdentity<'a> {
    pub peer: SocketAddr,
    pub headers: &'a HeaderMap,
    pub principal: Option<&'a str>,
}

impl<'a> RequestIdentity<'a> {
    pub fn new(peer: SocketAddr, headers: &'a HeaderMap) -> Self {
        Self { peer, headers, principal: None }
    }

    pub fn with_principal(mut self, principal: &'a str) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn from_request<B>(req: &'a Request<B>, peer: SocketAddr) -> Self {
        Self {
            peer,
            headers: req.headers(),
            principal: req
                .extensions()
                .get::<AuthenticatedPrincipal>()
                .map(|p| p.0.as_str()),
        }
    }
}

type CustomKeyFn = dyn Fn(&RequestIdentity<'_>) -> Option<String> + Send + Sync;

#[derive(Clone)]
enum Strategy {
    Global,
    ClientAddr,
    Principal,
    ApiKey(HeaderName),
    Custom(Arc<CustomKeyFn>),
}

/// Computes the admission key of a request.
#[derive(Clone)]
pub struct KeyExtractor {
    strategy: Strategy,
    trust_forwarded_for: bool,
}

impl KeyExtractor {
    pub fn global() -> Self {
        Self { strategy: Strategy::Global, trust_forwarded_for: false }
    }

    pub fn client_addr() -> Self {
        Self { strategy: Strategy::ClientAddr, trust_forwarded_for: false }
    }

    pub fn principal() -> Self {
        Self { strategy: Strategy::Principal, trust_forwarded_for: false }
    }

    pub fn api_key(header: HeaderName) -> Self {
        Self { strategy: Strategy::ApiKey(header), trust_forwarded_for: false }
    }

    /// Caller-supplied strategy. Returning `None` falls back to the client address.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&RequestIdentity<'_>) -> Option<String> + Send + Sync + 'static,
    {
        Self { strategy: Strategy::Custom(Arc::new(f)), trust_forwarded_for: false }
    }

    /// Take the client address from the first `X-Forwarded-For` hop when present.
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub fn from_config(config: &RateLimitConfig) -> Result<Self> {
        let extractor = match config.limit_by {
            LimitBy::Global => Self::global(),
            LimitBy::Ip => Self::client_addr(),
            LimitBy::User => Self::principal(),
            LimitBy::ApiKey => {
                let header = HeaderName::from_bytes(config.api_key_header.as_bytes()).map_err(|e| {
                    TollgateError::Config(format!(
                        "Invalid api_key_header '{}': {e}",
                        config.api_key_header
                    ))
                })?;
                Self::api_key(header)
            }
        };
        Ok(extractor.trust_forwarded_for(config.trust_forwarded_for))
    }

    /// Strategy name for logs and metric labels.
    pub fn strategy(&self) -> &'static str {
        match self.strategy {
            Strategy::Global => LimitBy::Global.as_str(),
            Strategy::ClientAddr => LimitBy::Ip.as_str(),
            Strategy::Principal => LimitBy::User.as_str(),
            Strategy::ApiKey(_) => LimitBy::ApiKey.as_str(),
            Strategy::Custom(_) => "custom",
        }
    }

    pub fn extract(&self, identity: &RequestIdentity<'_>) -> String {
        let key = match &self.strategy {
            Strategy::Global => return GLOBAL_KEY.to_string(),
            Strategy::ClientAddr => None,
            Strategy::Principal => identity
                .principal
                .filter(|p| !p.is_empty())
                .map(|p| format!("user:{p}")),
            Strategy::ApiKey(header) => identity
                .headers
                .get(header)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| format!("api:{v}")),
            Strategy::Custom(f) => f(identity).filter(|k| !k.is_empty()),
        };
        key.unwrap_or_else(|| self.client_addr_key(identity))
    }

    fn client_addr_key(&self, identity: &RequestIdentity<'_>) -> String {
        if self.trust_forwarded_for {
            let first_hop = identity
                .headers
                .get("x-forwarded-for")
                .and_then(|xff| xff.to_str().ok())
                .and_then(|s| s.split(',').next())
                .map(str::trim)
                .filter(|ip| !ip.is_empty());
            if let Some(ip) = first_hop {
                return ip.to_string();
            }
        }
        identity.peer.ip().to_string()
    }
}

impl fmt::Debug for KeyExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyExtractor")
            .field("strategy", &self.strategy())
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish()
    }
}
