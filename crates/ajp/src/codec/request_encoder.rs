//! Request encoding entry point.
//!
//! Composes the one-shot [`ForwardEncoder`] with the per-exchange
//! [`BodyEncoder`], in the same two-phase shape as the decoder side: head
//! first, then body data under backend flow control. At most one exchange
//! may be encoding at a time; AJP13 multiplexes nothing.

use std::io;
use std::io::ErrorKind;

use bytes::{Bytes, BytesMut};
use tracing::error;

use crate::codec::body_encoder::BodyEncoder;
use crate::codec::forward_encoder::ForwardEncoder;
use crate::protocol::{AjpRequest, PayloadSize, SendError};

/// Encoder for the client-to-server half of one connection.
#[derive(Debug)]
pub struct RequestEncoder {
    forward_encoder: ForwardEncoder,
    body_encoder: Option<BodyEncoder>,
    max_packet_size: usize,
}

impl RequestEncoder {
    pub fn new(max_packet_size: usize) -> Self {
        Self { forward_encoder: ForwardEncoder::new(max_packet_size), body_encoder: None, max_packet_size }
    }

    /// Encodes the forward-request packet and arms the body encoder for the
    /// exchange. For a bodyless request the terminal zero-length data packet
    /// follows immediately.
    ///
    /// Starting a second exchange while one is in flight is a usage error.
    pub fn encode_head(
        &mut self,
        request: &AjpRequest,
        payload_size: PayloadSize,
        dst: &mut BytesMut,
    ) -> Result<(), SendError> {
        if self.body_encoder.is_some() {
            error!("attempted to start an exchange while another is in flight");
            return Err(io::Error::from(ErrorKind::InvalidInput).into());
        }

        self.forward_encoder.encode(request, payload_size, dst)?;

        let mut body_encoder = match payload_size {
            PayloadSize::Length(n) => BodyEncoder::length(n, self.max_packet_size),
            PayloadSize::Chunked => BodyEncoder::chunked(self.max_packet_size),
            PayloadSize::Empty => BodyEncoder::empty(self.max_packet_size),
        };
        if payload_size.is_empty() {
            body_encoder.encode_eof(dst)?;
        }

        self.body_encoder = Some(body_encoder);
        Ok(())
    }

    /// Encodes one body data packet; see [`BodyEncoder::encode_data`].
    pub fn encode_data(&mut self, data: &mut Bytes, dst: &mut BytesMut) -> Result<usize, SendError> {
        match &mut self.body_encoder {
            Some(encoder) => encoder.encode_data(data, dst),
            None => {
                error!("expected an active exchange but none is encoding");
                Err(io::Error::from(ErrorKind::InvalidInput).into())
            }
        }
    }

    /// Marks the end of the request body; see [`BodyEncoder::encode_eof`].
    pub fn encode_eof(&mut self, dst: &mut BytesMut) -> Result<(), SendError> {
        match &mut self.body_encoder {
            Some(encoder) => encoder.encode_eof(dst),
            None => {
                error!("expected an active exchange but none is encoding");
                Err(io::Error::from(ErrorKind::InvalidInput).into())
            }
        }
    }

    /// Applies a GET_BODY_CHUNK grant to the active body encoder.
    pub fn grant(&mut self, size: u16) {
        if let Some(encoder) = &mut self.body_encoder {
            encoder.grant(size);
        }
    }

    /// Whether a body data packet may be emitted right now.
    pub fn ready(&self) -> bool {
        self.body_encoder.as_ref().is_some_and(BodyEncoder::ready)
    }

    /// Whether the active exchange's request side is complete on the wire.
    pub fn body_finished(&self) -> bool {
        self.body_encoder.as_ref().is_none_or(BodyEncoder::is_finished)
    }

    /// Releases the encoder for the next exchange.
    pub fn finish_exchange(&mut self) {
        self.body_encoder = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn empty_body_appends_terminal_packet_to_the_head() {
        let mut encoder = RequestEncoder::new(8192);
        let mut dst = BytesMut::new();
        let request = AjpRequest::new(Method::GET, "/");
        encoder.encode_head(&request, PayloadSize::Empty, &mut dst).unwrap();

        assert!(encoder.body_finished());
        // head packet followed by the zero-length data packet
        assert_eq!(&dst[dst.len() - 4..], &[0x12, 0x34, 0x00, 0x00]);
    }

    #[test]
    fn second_exchange_before_finish_is_rejected() {
        let mut encoder = RequestEncoder::new(8192);
        let mut dst = BytesMut::new();
        let request = AjpRequest::new(Method::GET, "/");
        encoder.encode_head(&request, PayloadSize::Empty, &mut dst).unwrap();

        assert!(matches!(encoder.encode_head(&request, PayloadSize::Empty, &mut dst), Err(SendError::Io { .. })));

        encoder.finish_exchange();
        encoder.encode_head(&request, PayloadSize::Empty, &mut dst).unwrap();
    }

    #[test]
    fn grants_flow_through_to_the_body_encoder() {
        let mut encoder = RequestEncoder::new(8192);
        let mut dst = BytesMut::new();
        let request = AjpRequest::new(Method::POST, "/upload");
        encoder.encode_head(&request, PayloadSize::Chunked, &mut dst).unwrap();

        assert!(!encoder.ready());
        encoder.grant(64);
        assert!(encoder.ready());

        let mut data = Bytes::from_static(b"hello");
        assert_eq!(encoder.encode_data(&mut data, &mut dst).unwrap(), 5);
        assert!(!encoder.ready());
    }
}
