use bytes::Bytes;

use crate::protocol::ResponseHead;

/// A decoded unit of the backend's response stream.
///
/// The response decoder turns raw packet bytes into these events; the
/// connection layer routes them to the active exchange (or, for
/// [`ResponseFrame::BodyRequested`], back into the request encoder's flow
/// control).
#[derive(Debug)]
pub enum ResponseFrame {
    /// A complete SEND_HEADERS packet: status, reason phrase and headers.
    ///
    /// A head with status 100 is an interim continue response, not the final
    /// response of the exchange.
    Headers(ResponseHead),

    /// A slice of response body payload from a SEND_BODY_CHUNK packet.
    ///
    /// One wire packet may surface as several of these when the packet
    /// arrives fragmented.
    BodyChunk(Bytes),

    /// GET_BODY_CHUNK: the backend grants one request-body packet of at most
    /// this many bytes.
    BodyRequested(u16),

    /// END_RESPONSE. `reusable` is false when the backend refuses to keep the
    /// connection open for further exchanges.
    End { reusable: bool },
}

impl ResponseFrame {
    #[inline]
    pub fn is_headers(&self) -> bool {
        matches!(self, ResponseFrame::Headers(_))
    }

    #[inline]
    pub fn is_body_chunk(&self) -> bool {
        matches!(self, ResponseFrame::BodyChunk(_))
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        matches!(self, ResponseFrame::End { .. })
    }
}

/// Size information for a request body.
///
/// Selected once per exchange, at submission time, and never changed: it
/// decides both the synthesized length header and the body transfer mode on
/// the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Body with a known length in bytes (`Content-Length` present).
    Length(u64),
    /// Body of unknown length, sent chunk by chunk as the backend grants.
    Chunked,
    /// No body at all.
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}
