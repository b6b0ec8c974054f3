//! Buffered outbound packet path.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::codec::RequestEncoder;
use crate::protocol::{AjpRequest, PayloadSize, SendError};

/// Writes encoded request packets to the socket.
///
/// Encoding goes through an in-memory buffer so that a forward-request
/// packet and its immediate body terminator, or several flow-control
/// granted data packets, reach the socket in one write. Body packets are
/// paced by backend grants, not by sink readiness, which is why this is a
/// plain buffered writer rather than a `FramedWrite` sink.
pub(crate) struct PacketWriter<W> {
    writer: W,
    encoder: RequestEncoder,
    buffer: BytesMut,
}

impl<W> PacketWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub(crate) fn new(writer: W, max_packet_size: usize) -> Self {
        Self { writer, encoder: RequestEncoder::new(max_packet_size), buffer: BytesMut::with_capacity(max_packet_size) }
    }

    /// Buffers the forward-request packet, starting a new exchange.
    pub(crate) fn encode_forward(&mut self, request: &AjpRequest, payload_size: PayloadSize) -> Result<(), SendError> {
        self.encoder.encode_head(request, payload_size, &mut self.buffer)
    }

    /// Buffers one body data packet under the current flow-control window.
    pub(crate) fn encode_data(&mut self, data: &mut Bytes) -> Result<usize, SendError> {
        self.encoder.encode_data(data, &mut self.buffer)
    }

    /// Buffers the end-of-body marker for the active exchange.
    pub(crate) fn encode_eof(&mut self) -> Result<(), SendError> {
        self.encoder.encode_eof(&mut self.buffer)
    }

    pub(crate) fn grant(&mut self, size: u16) {
        self.encoder.grant(size);
    }

    pub(crate) fn ready(&self) -> bool {
        self.encoder.ready()
    }

    pub(crate) fn body_finished(&self) -> bool {
        self.encoder.body_finished()
    }

    pub(crate) fn finish_exchange(&mut self) {
        self.encoder.finish_exchange();
    }

    /// Pushes everything buffered so far down to the socket.
    pub(crate) async fn flush(&mut self) -> Result<(), SendError> {
        if !self.buffer.is_empty() {
            trace!("flushing {} buffered bytes", self.buffer.len());
            self.writer.write_all_buf(&mut self.buffer).await.map_err(SendError::io)?;
        }
        self.writer.flush().await.map_err(SendError::io)
    }

    /// Shuts the write half down, swallowing errors on the close path.
    pub(crate) async fn shutdown(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[tokio::test]
    async fn flush_writes_buffered_packets_in_one_pass() {
        let mut sink = Vec::new();
        {
            let mut writer = PacketWriter::new(&mut sink, 8192);
            let request = AjpRequest::new(Method::GET, "/");
            writer.encode_forward(&request, PayloadSize::Empty).unwrap();
            writer.flush().await.unwrap();
        }

        assert_eq!(&sink[..2], &[0x12, 0x34]);
        // terminal zero-length data packet trails the head
        assert_eq!(&sink[sink.len() - 4..], &[0x12, 0x34, 0x00, 0x00]);
    }
}
