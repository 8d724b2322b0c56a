pub mod api;
pub mod http;

pub use api::{ResourceClient, ME};
pub use http::{HttpRequest, HttpTransport, Method, ReqwestTransport, USER_AGENT};
