//! Outcome of a single admission check.

use std::time::Duration;

/// Result of an admission check.
///
/// A rejection is a normal negative outcome, not an error: callers short-circuit
/// the request and answer with "too many requests".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request is admitted and may proceed downstream.
    Admitted {
        /// Bucket capacity of the policy that admitted the request
        limit: u32,
        /// Tokens left in the bucket after this request
        remaining: u32,
    },
    /// Request is rejected and must not reach downstream processing.
    Rejected {
        /// Bucket capacity of the policy that rejected the request
        limit: u32,
        /// Time until the bucket earns its next token
        retry_after: Duration,
    },
}

impl Decision {
    /// Returns true if the request is admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }

    /// Returns true if the request is rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Decision::Rejected { .. })
    }

    pub fn limit(&self) -> u32 {
        match self {
            Decision::Admitted { limit, .. } => *limit,
            Decision::Rejected { limit, .. } => *limit,
        }
    }

    /// Tokens left after the check (always 0 when rejected).
    pub fn remaining(&self) -> u32 {
        match self {
            Decision::Admitted { remaining, .. } => *remaining,
            Decision::Rejected { .. } => 0,
        }
    }

    /// Time until a retry can succeed, if rejected.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Rejected { retry_after, .. } => Some(*retry_after),
            Decision::Admitted { .. } => None,
        }
    }
}

impl From<Decision> for bool {
    fn from(decision: Decision) -> bool {
        decision.is_admitted()
    }
}
