//! AJP connection handling module
//!
//! This module drives full AJP13 client connections: submitting requests,
//! pumping flow-controlled request bodies, and dispatching decoded response
//! frames back to callers.
//!
//! # Components
//!
//! - [`AjpConnection`]: the driver owning both socket halves; runs queued
//!   exchanges strictly one at a time in submission order
//! - [`AjpHandle`]: the cloneable submission side; rejects synchronously
//!   when the connection is closing, closed, or its queue is full
//! - [`ResponseHandle`]: per-exchange future for the final response and the
//!   optional interim 100 Continue head
//! - [`AjpConfig`]: packet size and queue bound tunables
//!
//! # Features
//!
//! - Single-flight exchange processing over a persistent connection
//! - Backend-paced request body streaming (GET_BODY_CHUNK grants)
//! - Connection reuse until a close is requested or the backend declines
//! - Idle peer-close detection between exchanges

mod channel;
mod connection;
mod exchange;
mod packet_writer;

pub use connection::AjpConfig;
pub use connection::AjpConnection;
pub use connection::AjpHandle;
pub use exchange::ResponseHandle;
