use http::StatusCode;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::Response;

pub type RespBody = BoxBody<Bytes, hyper::Error>;

pub fn full_body(bytes: impl Into<Bytes>) -> RespBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Plain-text response generated by the gate itself (4xx and 5xx).
pub fn synthetic_response(status: StatusCode, text: &'static str) -> Response<RespBody> {
    let mut resp = Response::new(full_body(text));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

/// Error response whose body is the canonical reason phrase of `status`.
pub fn synthetic_error_response(status: StatusCode) -> Response<RespBody> {
    synthetic_response(status, status.canonical_reason().unwrap_or("Error"))
}
