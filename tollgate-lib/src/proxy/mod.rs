pub mod connection;
pub mod forwarding;
pub mod handler;
pub mod http_result;
pub mod server;
pub mod synthetic_response;

pub use forwarding::Upstream;
pub use handler::{check_admission, AdmissionOutcome};
pub use http_result::HttpError;
pub use server::{run, serve};
pub use synthetic_response::RespBody;
