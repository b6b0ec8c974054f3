//! Socket-facing frame channel.

use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedRead;

use crate::codec::ResponseDecoder;
use crate::connection::packet_writer::PacketWriter;
use crate::protocol::{AjpRequest, ParseError, PayloadSize, ResponseFrame, SendError};

/// One AJP connection's two wire directions, seen as typed frames.
///
/// Inbound, a `FramedRead` drives the resumable [`ResponseDecoder`];
/// outbound, a [`PacketWriter`] buffers encoded request packets. The
/// single-exchange-in-flight rule is enforced by the encoder underneath.
pub(crate) struct AjpChannel<R, W> {
    framed_read: FramedRead<R, ResponseDecoder>,
    packet_writer: PacketWriter<W>,
}

impl<R, W> AjpChannel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub(crate) fn new(reader: R, writer: W, max_packet_size: usize) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, ResponseDecoder::new(), 8 * 1024),
            packet_writer: PacketWriter::new(writer, max_packet_size),
        }
    }

    /// Next decoded frame from the backend, `None` on a clean peer close.
    pub(crate) async fn next_frame(&mut self) -> Option<Result<ResponseFrame, ParseError>> {
        self.framed_read.next().await
    }

    pub(crate) fn write_forward(&mut self, request: &AjpRequest, payload_size: PayloadSize) -> Result<(), SendError> {
        self.packet_writer.encode_forward(request, payload_size)
    }

    pub(crate) fn write_data(&mut self, data: &mut Bytes) -> Result<usize, SendError> {
        self.packet_writer.encode_data(data)
    }

    pub(crate) fn finish_body(&mut self) -> Result<(), SendError> {
        self.packet_writer.encode_eof()
    }

    pub(crate) fn grant(&mut self, size: u16) {
        self.packet_writer.grant(size);
    }

    pub(crate) fn ready(&self) -> bool {
        self.packet_writer.ready()
    }

    pub(crate) fn body_finished(&self) -> bool {
        self.packet_writer.body_finished()
    }

    pub(crate) fn finish_exchange(&mut self) {
        self.packet_writer.finish_exchange();
    }

    pub(crate) async fn flush(&mut self) -> Result<(), SendError> {
        self.packet_writer.flush().await
    }

    pub(crate) async fn shutdown(&mut self) {
        self.packet_writer.shutdown().await;
    }
}
