//! Core AJP protocol abstractions.
//!
//! This module provides the value types the codec and connection layers
//! exchange: request/response descriptions, decoded frame events, body
//! streams and error types.
//!
//! # Architecture
//!
//! - **Messages** ([`message`]): [`ResponseFrame`] decoder events and
//!   [`PayloadSize`] body-transfer selection
//! - **Requests** ([`request`]): [`AjpRequest`] and its proxy
//!   [`ForwardAttributes`]
//! - **Responses** ([`response`]): [`ResponseHead`] and the [`ReasonPhrase`]
//!   extension
//! - **Bodies** ([`body`]): [`body::ResponseBody`] consumer stream and
//!   [`body::RequestBodySender`] producer handle
//! - **Errors** ([`error`]): [`AjpError`] and its per-layer sources

mod message;
pub use message::PayloadSize;
pub use message::ResponseFrame;

mod request;
pub use request::AjpRequest;
pub use request::ForwardAttributes;

mod response;
pub use response::ReasonPhrase;
pub use response::ResponseHead;

mod error;
pub use error::AjpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::SubmitError;

pub mod body;
