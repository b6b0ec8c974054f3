//! Consumer side of the response body stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use tokio::sync::{mpsc, oneshot};

use crate::protocol::AjpError;

/// Streaming response body implementing `http_body::Body`.
///
/// The connection feeds decoded SEND_BODY_CHUNK payloads into the chunk
/// channel; the stream ends when the END_RESPONSE packet arrives (the
/// sender side is dropped), which is also the moment the exchange's
/// response side counts as terminated.
///
/// A connection failure travels through a separate one-shot slot rather
/// than in-band: the chunk channel is bounded and may be full at failure
/// time, and a lost error would make a truncated body look complete. The
/// slot is checked once the chunk channel drains.
#[derive(Debug)]
pub struct ResponseBody {
    chunks: mpsc::Receiver<Bytes>,
    error: Option<oneshot::Receiver<AjpError>>,
}

impl ResponseBody {
    pub(crate) fn channel(capacity: usize) -> (BodySender, Self) {
        let (chunk_sender, chunks) = mpsc::channel(capacity);
        let (error_sender, error) = oneshot::channel();
        let sender = BodySender { chunks: chunk_sender, error: Some(error_sender) };
        (sender, Self { chunks, error: Some(error) })
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = AjpError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match this.chunks.poll_recv(cx) {
            Poll::Ready(Some(bytes)) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
            Poll::Ready(None) => {
                // sender gone: either a clean END_RESPONSE or a failure
                match this.error.take() {
                    Some(mut slot) => match slot.try_recv() {
                        Ok(error) => Poll::Ready(Some(Err(error))),
                        Err(_) => Poll::Ready(None),
                    },
                    None => Poll::Ready(None),
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::new()
    }
}

/// Connection-side producer for one response body.
#[derive(Debug)]
pub(crate) struct BodySender {
    chunks: mpsc::Sender<Bytes>,
    error: Option<oneshot::Sender<AjpError>>,
}

impl BodySender {
    /// Forwards one chunk, waiting for channel capacity. A closed channel
    /// means the caller dropped the body; the chunk is discarded.
    pub(crate) async fn send(&self, chunk: Bytes) {
        let _ = self.chunks.send(chunk).await;
    }

    /// Ends the stream with an error instead of a clean close.
    ///
    /// The error is parked in the one-shot slot before the chunk channel
    /// closes, so it is visible no matter how many chunks are still
    /// buffered.
    pub(crate) fn fail(mut self, error: AjpError) {
        if let Some(slot) = self.error.take() {
            let _ = slot.send(error);
        }
    }
}
