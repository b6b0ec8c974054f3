//! AJP codec module for encoding and decoding packets.
//!
//! This module owns everything that touches raw wire bytes:
//!
//! - Request handling:
//!   - [`RequestEncoder`]: forward-request and body data packets
//!   - Head serialization via [`forward_encoder`]
//!   - Flow-controlled body packets via [`body_encoder`]
//!
//! - Response handling:
//!   - [`ResponseDecoder`]: incremental, resumable packet parser producing
//!     typed frame events
//!
//! - Shared pieces:
//!   - [`primitives`]: resumable u16 / wire-string readers and writers
//!   - [`tables`]: the protocol's fixed code tables
//!
//! The decoder plugs into `tokio_util::codec::FramedRead`; the encoder is
//! driven directly by the connection's packet writer because body packets
//! are paced by backend grants rather than by sink readiness.

mod body_encoder;
mod forward_encoder;
mod primitives;
mod request_encoder;
mod response_decoder;
mod tables;

pub use request_encoder::RequestEncoder;
pub use response_decoder::ResponseDecoder;

pub(crate) use tables::DEFAULT_PACKET_SIZE;
