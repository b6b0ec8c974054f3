//! Flow-controlled encoder for request body data packets.
//!
//! Body bytes travel client-to-server as `0x12 0x34 <len+2:u16> <len:u16>
//! <data>` packets with no trailing NUL (the NUL padding exists only on the
//! server-to-client body framing). The backend paces the transfer: each
//! GET_BODY_CHUNK packet grants exactly one data packet of at most the
//! requested size. A fixed-length body may send its first packet
//! immediately; an unbounded (chunked) body may not send anything before
//! the first grant.

use std::cmp;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::codec::tables::{CLIENT_MAGIC, DATA_PACKET_OVERHEAD};
use crate::protocol::SendError;

/// Encoder for one request body, created per exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyEncoder {
    kind: Kind,
    /// Bytes permitted in the next data packet; 0 means a grant is needed.
    window: usize,
    /// Largest data payload a single packet can carry.
    max_payload: usize,
    finished: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// Content-Length body: `remaining` bytes still owed to the backend.
    Length { remaining: u64 },

    /// Unbounded body; ends with a zero-length packet.
    Chunked,

    /// No body; a zero-length packet is emitted right after the head.
    Empty,
}

impl BodyEncoder {
    /// Creates an encoder for a body of known length.
    ///
    /// The first packet needs no grant, so the window starts open.
    pub fn length(remaining: u64, max_packet_size: usize) -> Self {
        let max_payload = max_packet_size - DATA_PACKET_OVERHEAD;
        Self { kind: Kind::Length { remaining }, window: max_payload, max_payload, finished: remaining == 0 }
    }

    /// Creates an encoder for an unbounded body; nothing may be sent before
    /// the backend grants the first chunk.
    pub fn chunked(max_packet_size: usize) -> Self {
        Self { kind: Kind::Chunked, window: 0, max_payload: max_packet_size - DATA_PACKET_OVERHEAD, finished: false }
    }

    /// Creates an encoder for a bodyless request.
    pub fn empty(max_packet_size: usize) -> Self {
        Self { kind: Kind::Empty, window: 0, max_payload: max_packet_size - DATA_PACKET_OVERHEAD, finished: false }
    }

    /// Records a GET_BODY_CHUNK grant: one packet of at most `size` bytes.
    pub fn grant(&mut self, size: u16) {
        self.window = cmp::min(size as usize, self.max_payload);
        trace!(window = self.window, "body chunk granted");
    }

    /// Whether a data packet may be emitted right now.
    pub fn ready(&self) -> bool {
        self.window > 0 && !self.finished
    }

    /// Whether the body is complete on the wire (terminal packet included).
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Encodes one data packet from the front of `data`, consuming at most
    /// the granted window. Returns the number of payload bytes taken.
    ///
    /// # Errors
    ///
    /// - [`SendError::NotReady`] when no grant is outstanding; waiting for
    ///   one is the caller's job, encoding without one is a programming
    ///   error.
    /// - [`SendError::BodyOverrun`] when a fixed-length body tries to send
    ///   past its declared length.
    pub fn encode_data(&mut self, data: &mut Bytes, dst: &mut BytesMut) -> Result<usize, SendError> {
        if self.window == 0 || self.finished {
            return Err(SendError::NotReady);
        }

        let take = cmp::min(data.len(), self.window);
        // a zero-length packet is the end-of-body marker, never data
        if take == 0 {
            return Ok(0);
        }
        match &mut self.kind {
            Kind::Length { remaining } => {
                if take as u64 > *remaining {
                    return Err(SendError::BodyOverrun { excess: take as u64 - *remaining });
                }
                *remaining -= take as u64;
                if *remaining == 0 {
                    self.finished = true;
                }
            }
            Kind::Chunked => {}
            Kind::Empty => {
                return Err(SendError::BodyOverrun { excess: take as u64 });
            }
        }

        let chunk = data.split_to(take);
        dst.reserve(take + DATA_PACKET_OVERHEAD);
        dst.put_slice(&CLIENT_MAGIC);
        dst.put_u16((take + 2) as u16);
        dst.put_u16(take as u16);
        dst.put_slice(&chunk);

        self.window = 0;
        trace!(len = take, "encoded body data packet");
        Ok(take)
    }

    /// Marks the end of the body, emitting the terminal zero-length packet
    /// where the transfer mode calls for one.
    ///
    /// # Errors
    ///
    /// [`SendError::BodyUnderrun`] when a fixed-length body ends short of
    /// its declared length.
    pub fn encode_eof(&mut self, dst: &mut BytesMut) -> Result<(), SendError> {
        if self.finished {
            return Ok(());
        }

        match &self.kind {
            Kind::Length { remaining } => {
                if *remaining > 0 {
                    return Err(SendError::BodyUnderrun { missing: *remaining });
                }
            }
            Kind::Chunked | Kind::Empty => {
                dst.put_slice(&CLIENT_MAGIC);
                dst.put_u16(0);
            }
        }

        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_sends_nothing_before_a_grant() {
        let mut encoder = BodyEncoder::chunked(8192);
        let mut data = Bytes::from_static(b"payload");
        let mut dst = BytesMut::new();

        assert!(!encoder.ready());
        assert!(matches!(encoder.encode_data(&mut data, &mut dst), Err(SendError::NotReady)));
        assert!(dst.is_empty());
    }

    #[test]
    fn chunked_never_exceeds_the_granted_size() {
        let mut encoder = BodyEncoder::chunked(8192);
        let mut data = Bytes::from(vec![0x55; 300]);
        let mut dst = BytesMut::new();

        encoder.grant(100);
        assert!(encoder.ready());
        assert_eq!(encoder.encode_data(&mut data, &mut dst).unwrap(), 100);

        // one packet per grant
        assert!(!encoder.ready());
        assert!(matches!(encoder.encode_data(&mut data, &mut dst), Err(SendError::NotReady)));

        // 0x12 0x34, packet length 102, data length 100
        assert_eq!(&dst[..6], &[0x12, 0x34, 0x00, 0x66, 0x00, 0x64]);
        assert_eq!(dst.len(), 106);
        assert_eq!(data.len(), 200);
    }

    #[test]
    fn grant_is_capped_at_the_packet_payload_limit() {
        let mut encoder = BodyEncoder::chunked(8192);
        encoder.grant(u16::MAX);
        let mut data = Bytes::from(vec![1; 10_000]);
        let mut dst = BytesMut::new();
        assert_eq!(encoder.encode_data(&mut data, &mut dst).unwrap(), 8186);
    }

    #[test]
    fn empty_chunk_is_not_an_end_of_body_marker() {
        let mut encoder = BodyEncoder::chunked(8192);
        encoder.grant(100);
        let mut data = Bytes::new();
        let mut dst = BytesMut::new();

        assert_eq!(encoder.encode_data(&mut data, &mut dst).unwrap(), 0);
        assert!(dst.is_empty());
        assert!(!encoder.is_finished());
        // the grant is still open for real data
        assert!(encoder.ready());
    }

    #[test]
    fn chunked_ends_with_a_zero_length_packet() {
        let mut encoder = BodyEncoder::chunked(8192);
        let mut dst = BytesMut::new();
        encoder.encode_eof(&mut dst).unwrap();
        assert_eq!(&dst[..], &[0x12, 0x34, 0x00, 0x00]);
        assert!(encoder.is_finished());

        // idempotent
        encoder.encode_eof(&mut dst).unwrap();
        assert_eq!(dst.len(), 4);
    }

    #[test]
    fn fixed_length_may_send_the_first_packet_immediately() {
        let mut encoder = BodyEncoder::length(4, 8192);
        let mut data = Bytes::from_static(b"abcd");
        let mut dst = BytesMut::new();

        assert!(encoder.ready());
        assert_eq!(encoder.encode_data(&mut data, &mut dst).unwrap(), 4);
        assert!(encoder.is_finished());

        // no terminal packet in fixed mode
        encoder.encode_eof(&mut dst).unwrap();
        assert_eq!(&dst[..], &[0x12, 0x34, 0x00, 0x06, 0x00, 0x04, b'a', b'b', b'c', b'd']);
    }

    #[test]
    fn fixed_length_overrun_is_fatal() {
        let mut encoder = BodyEncoder::length(2, 8192);
        let mut data = Bytes::from_static(b"toolong");
        let mut dst = BytesMut::new();
        assert!(matches!(encoder.encode_data(&mut data, &mut dst), Err(SendError::BodyOverrun { excess: 5 })));
    }

    #[test]
    fn fixed_length_underrun_is_fatal() {
        let mut encoder = BodyEncoder::length(10, 8192);
        let mut data = Bytes::from_static(b"abc");
        let mut dst = BytesMut::new();
        encoder.encode_data(&mut data, &mut dst).unwrap();

        assert!(matches!(encoder.encode_eof(&mut dst), Err(SendError::BodyUnderrun { missing: 7 })));
    }

    #[test]
    fn empty_body_emits_only_the_terminal_packet() {
        let mut encoder = BodyEncoder::empty(8192);
        let mut dst = BytesMut::new();
        encoder.encode_eof(&mut dst).unwrap();
        assert_eq!(&dst[..], &[0x12, 0x34, 0x00, 0x00]);
        assert!(encoder.is_finished());
    }
}
