use http::StatusCode;
use thiserror::Error;

use crate::telemetry::metrics::values;

/// HTTP result type, T is typically a hyper::Response
/// HttpError is turned into a synthetic error response
pub(crate) type HttpResult<T> = std::result::Result<T, HttpError>;

/// Describes things that can go wrong while forwarding an admitted request
#[derive(Debug, Error, Clone)]
pub enum HttpError {
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Failed to connect to upstream: {0}")]
    UpstreamConnect(String),

    #[error("Failed to get response from upstream: {0}")]
    FailedToGetResponseFromUpstream(String),
}

impl HttpError {
    /// Label value for `tollgate_upstream_errors_total`.
    pub fn error_type(&self) -> &'static str {
        match self {
            HttpError::InvalidUri(_) => values::ERROR_REQUEST,
            HttpError::UpstreamConnect(_) => values::ERROR_CONNECT,
            HttpError::FailedToGetResponseFromUpstream(_) => values::ERROR_REQUEST,
        }
    }
}

impl From<HttpError> for StatusCode {
    fn from(e: HttpError) -> StatusCode {
        match e {
            HttpError::InvalidUri(_) => StatusCode::BAD_REQUEST,
            HttpError::UpstreamConnect(_) => StatusCode::BAD_GATEWAY,
            HttpError::FailedToGetResponseFromUpstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}
