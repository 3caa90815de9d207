use http::StatusCode;
use hyper::body::Bytes;
use hyper::Response;
use serde_json::{json, Value};

use crate::error::{Result, TollgateError};
use crate::proxy::synthetic_response::{full_body, RespBody};

/// Serialize `body` as a JSON response with the given status.
pub(crate) fn json_response(status: StatusCode, body: &Value) -> Result<Response<RespBody>> {
    let body_bytes = serde_json::to_vec(body)
        .map_err(|e| TollgateError::Http(format!("Failed to serialize response: {e}")))?;

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(full_body(Bytes::from(body_bytes)))
        .map_err(|e| TollgateError::Http(format!("Failed to build response: {e}")))
}

/// Health check response - always returns 200 if process is running
pub fn health_check_response(policies: usize) -> Result<Response<RespBody>> {
    json_response(StatusCode::OK, &json!({"status": "healthy", "policies": policies}))
}

/// Liveness check - always returns 200 if process is running
pub fn live_check_response() -> Result<Response<RespBody>> {
    json_response(StatusCode::OK, &json!({"status": "alive"}))
}
