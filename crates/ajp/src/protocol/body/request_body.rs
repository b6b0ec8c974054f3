//! Producer side of a streamed request body.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::protocol::AjpError;

/// Handle for pushing request body data into an in-flight exchange.
///
/// Each chunk is forwarded to the container under its flow-control grants;
/// a chunk larger than the negotiated packet payload is split across as
/// many data packets as needed. Dropping the sender marks the end of the
/// body, which for chunked transfers emits the zero-length terminator.
#[derive(Debug)]
pub struct RequestBodySender {
    sender: mpsc::Sender<Bytes>,
}

impl RequestBodySender {
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Sends one chunk of body data, waiting for channel capacity.
    ///
    /// An error means the exchange is no longer accepting data, either
    /// because it completed early or the connection failed.
    pub async fn send(&self, data: Bytes) -> Result<(), AjpError> {
        self.sender
            .send(data)
            .await
            .map_err(|_| AjpError::closed("exchange no longer accepts body data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_fails_after_receiver_drops() {
        let (sender, receiver) = RequestBodySender::channel(1);
        drop(receiver);
        assert!(sender.send(Bytes::from_static(b"x")).await.is_err());
    }

    #[tokio::test]
    async fn drop_closes_the_stream() {
        let (sender, mut receiver) = RequestBodySender::channel(1);
        sender.send(Bytes::from_static(b"chunk")).await.unwrap();
        drop(sender);
        assert_eq!(receiver.recv().await, Some(Bytes::from_static(b"chunk")));
        assert_eq!(receiver.recv().await, None);
    }
}
