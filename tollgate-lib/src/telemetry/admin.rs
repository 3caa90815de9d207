use http::StatusCode;
use hyper::Response;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::health::json_response;
use crate::admission::AdmissionManager;
use crate::error::{Result, TollgateError};
use crate::proxy::synthetic_response::{full_body, RespBody};

/// Largest accepted `/admin/reset` request body.
pub const MAX_ADMIN_BODY: usize = 4 * 1024;

/// Body of `POST /admin/reset`.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub policy: String,
    pub key: String,
}

/// Refill one bucket on behalf of an operator.
///
/// 204 when the policy exists (whether or not the key had a bucket), 404 for
/// an unknown policy, 400 for a malformed body.
pub fn reset_response(manager: &AdmissionManager, body: &[u8]) -> Result<Response<RespBody>> {
    let request: ResetRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => return bad_request(&format!("invalid reset request: {e}")),
    };
    if request.policy.is_empty() || request.key.is_empty() {
        return bad_request("policy and key must not be empty");
    }

    match manager.reset(&request.policy, &request.key) {
        Ok(found) => {
            info!(policy = %request.policy, found, "admin reset");
            Response::builder()
                .status(StatusCode::NO_CONTENT)
                .body(full_body(""))
                .map_err(|e| TollgateError::Http(format!("Failed to build response: {e}")))
        }
        Err(TollgateError::UnknownPolicy(policy)) => json_response(
            StatusCode::NOT_FOUND,
            &json!({"error": "unknown_policy", "policy": policy}),
        ),
        Err(e) => Err(e),
    }
}

pub(crate) fn bad_request(reason: &str) -> Result<Response<RespBody>> {
    json_response(StatusCode::BAD_REQUEST, &json!({"error": "bad_request", "reason": reason}))
}
