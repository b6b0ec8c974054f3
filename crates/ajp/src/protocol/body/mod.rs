//! Channel-backed body streams connecting callers to the connection task.

mod request_body;
mod response_body;

pub use request_body::RequestBodySender;
pub use response_body::ResponseBody;

pub(crate) use response_body::BodySender;
