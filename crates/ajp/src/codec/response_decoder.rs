//! Decoder implementation for server-to-client AJP packets.
//!
//! This module turns the backend's byte stream into typed
//! [`ResponseFrame`] events through an incremental state machine. Every
//! state is resumable: the decoder may be invoked with any fragmentation of
//! the wire bytes, down to one byte at a time, and produces the same events
//! as a single contiguous buffer would.
//!
//! Packets are framed as `'A' 'B' <length:u16> <body>` where the body's
//! first byte is a prefix code selecting the packet type. Framing errors
//! (bad magic, unknown prefix) are fatal for the connection; unknown
//! control packets (ping/pong/shutdown family) are drained and ignored.

use std::cmp;

use bytes::{Buf, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::primitives::{IntReader, Text, TextReader, latin1};
use crate::codec::tables::{SERVER_MAGIC, prefix, response_header_name};
use crate::protocol::{ParseError, ReasonPhrase, ResponseFrame};
use crate::ensure;

/// A resumable decoder for the server-to-client half of the protocol.
///
/// One decoder instance lives for the whole life of a connection; the state
/// machine returns to [`DecodeState::MagicHigh`] after every packet, so
/// consecutive responses are decoded without any explicit reset.
#[derive(Debug)]
pub struct ResponseDecoder {
    state: DecodeState,
    /// Declared length of the current packet body, used to drain control packets.
    packet_length: usize,
    int_reader: IntReader,
    text_reader: TextReader,
    status: u16,
    reason: Option<String>,
    headers: HeaderMap,
    remaining_headers: u16,
    pending_name: Option<HeaderName>,
    /// Bytes left of the current body chunk, trailing NUL included.
    chunk_remaining: usize,
    drain_remaining: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Expect `'A'`.
    MagicHigh,
    /// Expect `'B'`.
    MagicLow,
    /// 2-byte packet body length.
    PacketLength,
    /// 1-byte packet type code.
    Prefix,
    /// SEND_HEADERS: status code.
    Status,
    /// SEND_HEADERS: reason phrase string.
    Reason,
    /// SEND_HEADERS: number of headers.
    HeaderCount,
    /// SEND_HEADERS: header name or well-known name code.
    Name,
    /// SEND_HEADERS: header value.
    Value,
    /// SEND_BODY_CHUNK: declared chunk length.
    ChunkLength,
    /// SEND_BODY_CHUNK: streaming payload bytes.
    ChunkData,
    /// SEND_BODY_CHUNK: trailing NUL after the payload.
    ChunkTerminator,
    /// GET_BODY_CHUNK: requested size.
    GrantLength,
    /// END_RESPONSE: persistence flag byte.
    Persistent,
    /// Discarding the body of an uninterpreted control packet.
    Drain,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    fn begin_headers(&mut self) {
        self.status = 0;
        self.reason = None;
        self.headers = HeaderMap::new();
        self.remaining_headers = 0;
        self.pending_name = None;
    }

    fn finish_headers(&mut self) -> Result<ResponseFrame, ParseError> {
        let status = StatusCode::from_u16(self.status).map_err(|_| ParseError::InvalidStatus(self.status))?;

        let mut head = Response::new(());
        *head.status_mut() = status;
        *head.headers_mut() = std::mem::take(&mut self.headers);
        if let Some(reason) = self.reason.take() {
            head.extensions_mut().insert(ReasonPhrase(reason));
        }

        trace!(status = %status, "decoded response head");
        Ok(ResponseFrame::Headers(head))
    }
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self {
            state: DecodeState::MagicHigh,
            packet_length: 0,
            int_reader: IntReader::default(),
            text_reader: TextReader::default(),
            status: 0,
            reason: None,
            headers: HeaderMap::new(),
            remaining_headers: 0,
            pending_name: None,
            chunk_remaining: 0,
            drain_remaining: 0,
        }
    }
}

impl Decoder for ResponseDecoder {
    type Item = ResponseFrame;
    type Error = ParseError;

    /// Decodes the next frame event out of `src`.
    ///
    /// # Returns
    /// - `Ok(Some(frame))` when an event is complete
    /// - `Ok(None)` when more input is needed
    /// - `Err(ParseError)` on a protocol violation; the decoder must not be
    ///   used again afterwards
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                DecodeState::MagicHigh => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let byte = src.get_u8();
                    ensure!(byte == SERVER_MAGIC[0], ParseError::bad_magic(byte));
                    self.state = DecodeState::MagicLow;
                }

                DecodeState::MagicLow => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let byte = src.get_u8();
                    ensure!(byte == SERVER_MAGIC[1], ParseError::bad_magic(byte));
                    self.state = DecodeState::PacketLength;
                }

                DecodeState::PacketLength => {
                    let Some(length) = self.int_reader.read(src) else {
                        return Ok(None);
                    };
                    self.packet_length = length as usize;
                    self.state = DecodeState::Prefix;
                }

                DecodeState::Prefix => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let code = src.get_u8();
                    trace!(code, packet_length = self.packet_length, "read packet prefix");
                    match code {
                        prefix::SEND_HEADERS => {
                            self.begin_headers();
                            self.state = DecodeState::Status;
                        }
                        prefix::SEND_BODY_CHUNK => self.state = DecodeState::ChunkLength,
                        prefix::END_RESPONSE => self.state = DecodeState::Persistent,
                        prefix::GET_BODY_CHUNK => self.state = DecodeState::GrantLength,
                        prefix::SHUTDOWN | prefix::PING | prefix::CPONG | prefix::CPING => {
                            self.drain_remaining = self.packet_length.saturating_sub(1);
                            self.state = DecodeState::Drain;
                        }
                        other => return Err(ParseError::UnknownPrefix(other)),
                    }
                }

                DecodeState::Status => {
                    let Some(status) = self.int_reader.read(src) else {
                        return Ok(None);
                    };
                    self.status = status;
                    self.state = DecodeState::Reason;
                }

                DecodeState::Reason => match self.text_reader.read(src, false) {
                    None => return Ok(None),
                    Some(Text::Value(bytes)) => {
                        self.reason = Some(latin1(&bytes));
                        self.state = DecodeState::HeaderCount;
                    }
                    Some(_) => {
                        self.reason = None;
                        self.state = DecodeState::HeaderCount;
                    }
                },

                DecodeState::HeaderCount => {
                    let Some(count) = self.int_reader.read(src) else {
                        return Ok(None);
                    };
                    self.remaining_headers = count;
                    if count == 0 {
                        self.state = DecodeState::MagicHigh;
                        return Ok(Some(self.finish_headers()?));
                    }
                    self.state = DecodeState::Name;
                }

                DecodeState::Name => match self.text_reader.read(src, true) {
                    None => return Ok(None),
                    Some(Text::HeaderCode(code)) => {
                        let name = response_header_name(code).ok_or(ParseError::UnknownHeaderCode(code))?;
                        self.pending_name = Some(name);
                        self.state = DecodeState::Value;
                    }
                    Some(Text::Value(bytes)) => {
                        let name =
                            HeaderName::from_bytes(&bytes).map_err(|_| ParseError::invalid_header(latin1(&bytes)))?;
                        self.pending_name = Some(name);
                        self.state = DecodeState::Value;
                    }
                    Some(Text::Null) => return Err(ParseError::invalid_header("null header name")),
                },

                DecodeState::Value => {
                    let value = match self.text_reader.read(src, false) {
                        None => return Ok(None),
                        Some(Text::Value(bytes)) => {
                            HeaderValue::from_bytes(&bytes).map_err(|_| ParseError::invalid_header(latin1(&bytes)))?
                        }
                        Some(_) => HeaderValue::from_static(""),
                    };

                    // the name state always runs before this one
                    if let Some(name) = self.pending_name.take() {
                        self.headers.append(name, value);
                    }

                    self.remaining_headers -= 1;
                    if self.remaining_headers == 0 {
                        self.state = DecodeState::MagicHigh;
                        return Ok(Some(self.finish_headers()?));
                    }
                    self.state = DecodeState::Name;
                }

                DecodeState::ChunkLength => {
                    let Some(declared) = self.int_reader.read(src) else {
                        return Ok(None);
                    };
                    trace!(declared, "read body chunk length");
                    if declared == 0 {
                        self.state = DecodeState::MagicHigh;
                        continue;
                    }
                    self.chunk_remaining = declared as usize;
                    self.state = DecodeState::ChunkData;
                }

                DecodeState::ChunkData => {
                    // the final declared byte is a NUL, not payload
                    if self.chunk_remaining == 1 {
                        self.state = DecodeState::ChunkTerminator;
                        continue;
                    }
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let take = cmp::min(self.chunk_remaining - 1, src.len());
                    let bytes = src.split_to(take).freeze();
                    self.chunk_remaining -= take;
                    if self.chunk_remaining == 1 {
                        self.state = DecodeState::ChunkTerminator;
                    }
                    trace!(len = bytes.len(), "read body chunk bytes");
                    return Ok(Some(ResponseFrame::BodyChunk(bytes)));
                }

                DecodeState::ChunkTerminator => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    src.advance(1);
                    self.chunk_remaining = 0;
                    self.state = DecodeState::MagicHigh;
                }

                DecodeState::GrantLength => {
                    let Some(size) = self.int_reader.read(src) else {
                        return Ok(None);
                    };
                    trace!(size, "backend requested a body chunk");
                    self.state = DecodeState::MagicHigh;
                    return Ok(Some(ResponseFrame::BodyRequested(size)));
                }

                DecodeState::Persistent => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let reusable = src.get_u8() != 0;
                    trace!(reusable, "response ended");
                    self.state = DecodeState::MagicHigh;
                    return Ok(Some(ResponseFrame::End { reusable }));
                }

                DecodeState::Drain => {
                    if self.drain_remaining == 0 {
                        self.state = DecodeState::MagicHigh;
                        continue;
                    }
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let take = cmp::min(self.drain_remaining, src.len());
                    src.advance(take);
                    self.drain_remaining -= take;
                }
            }
        }
    }
}
