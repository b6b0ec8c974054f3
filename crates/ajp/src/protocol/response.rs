//! Response head types.
//!
//! The decoded response head reuses `http::Response<()>`; the AJP reason
//! phrase, which the `http` types have no slot for, travels as a
//! [`ReasonPhrase`] extension.

use http::Response;

/// Type alias for a decoded response head, before the body is attached.
pub type ResponseHead = Response<()>;

/// The reason phrase of a response status line.
///
/// Stored in the response extensions by the decoder, since `http::Response`
/// only carries the numeric status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonPhrase(pub String);

impl ReasonPhrase {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReasonPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
