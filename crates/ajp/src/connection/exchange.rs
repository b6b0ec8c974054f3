//! One queued request/response pair and its caller-facing handle.

use bytes::Bytes;
use http::{Response, StatusCode};
use tokio::sync::{mpsc, oneshot};
use tracing::error;

use crate::protocol::body::{BodySender, ResponseBody};
use crate::protocol::{AjpError, AjpRequest, PayloadSize, ResponseHead};

/// Capacity of the per-exchange body chunk channels.
pub(crate) const BODY_CHANNEL_CAPACITY: usize = 16;

/// A submitted request travelling through the connection's FIFO queue.
///
/// The request and response directions terminate independently: the request
/// side when its last body packet is on the wire, the response side when
/// END_RESPONSE arrives. The driver releases the exchange only once both
/// flags are set.
///
/// Results reach the caller through one-shot notification slots instead of
/// callbacks: one for the final response, one for an interim 100 Continue
/// head, plus a bounded channel carrying body chunks. Each slot fires at
/// most once; on failure the pending error goes to whichever slot is still
/// open.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub(crate) request: AjpRequest,
    pub(crate) payload_size: PayloadSize,
    pub(crate) body_receiver: Option<mpsc::Receiver<Bytes>>,
    response_slot: Option<oneshot::Sender<Result<Response<ResponseBody>, AjpError>>>,
    continue_slot: Option<oneshot::Sender<ResponseHead>>,
    chunk_sender: Option<BodySender>,
    pub(crate) request_terminated: bool,
    pub(crate) response_terminated: bool,
    connection_reusable: bool,
}

impl Exchange {
    pub(crate) fn new(
        request: AjpRequest,
        payload_size: PayloadSize,
        body_receiver: Option<mpsc::Receiver<Bytes>>,
    ) -> (Self, ResponseHandle) {
        let (response_slot, response_receiver) = oneshot::channel();
        let (continue_slot, continue_receiver) = oneshot::channel();

        let exchange = Self {
            request,
            payload_size,
            body_receiver,
            response_slot: Some(response_slot),
            continue_slot: Some(continue_slot),
            chunk_sender: None,
            request_terminated: false,
            response_terminated: false,
            connection_reusable: true,
        };
        let handle = ResponseHandle { response: response_receiver, interim: Some(continue_receiver) };
        (exchange, handle)
    }

    /// Routes a decoded response head to the caller.
    ///
    /// A 100 Continue head fills the interim slot and leaves the exchange
    /// running; anything else becomes the final response, with a fresh body
    /// stream wired up for the chunks that follow.
    pub(crate) fn deliver_headers(&mut self, head: ResponseHead) {
        if head.status() == StatusCode::CONTINUE {
            if let Some(slot) = self.continue_slot.take() {
                let _ = slot.send(head);
            }
            return;
        }

        let (chunk_sender, body) = ResponseBody::channel(BODY_CHANNEL_CAPACITY);
        self.chunk_sender = Some(chunk_sender);

        let (parts, ()) = head.into_parts();
        match self.response_slot.take() {
            Some(slot) => {
                // the caller may have dropped the handle, keep draining anyway
                let _ = slot.send(Ok(Response::from_parts(parts, body)));
            }
            None => error!("received a second response head for the same exchange"),
        }
    }

    /// Forwards one decoded body chunk, applying caller backpressure.
    pub(crate) async fn deliver_chunk(&mut self, chunk: Bytes) {
        match &self.chunk_sender {
            Some(sender) => sender.send(chunk).await,
            None => error!("received a body chunk before the response head"),
        }
    }

    /// Marks the response side terminated on END_RESPONSE.
    pub(crate) fn finish_response(&mut self, reusable: bool) {
        self.response_terminated = true;
        self.connection_reusable = reusable;
        // dropping the sender ends the body stream
        self.chunk_sender = None;
        if let Some(slot) = self.response_slot.take() {
            let _ = slot.send(Err(AjpError::closed("backend ended the exchange without a response head")));
        }
    }

    pub(crate) fn connection_reusable(&self) -> bool {
        self.connection_reusable
    }

    /// Delivers a failure to whichever notification slot is still open.
    pub(crate) fn fail(&mut self, error: AjpError) {
        self.continue_slot = None;
        if let Some(slot) = self.response_slot.take() {
            let _ = slot.send(Err(error));
        } else if let Some(sender) = self.chunk_sender.take() {
            sender.fail(error);
        }
    }
}

/// Caller-side view of a submitted exchange.
#[derive(Debug)]
pub struct ResponseHandle {
    response: oneshot::Receiver<Result<Response<ResponseBody>, AjpError>>,
    interim: Option<oneshot::Receiver<ResponseHead>>,
}

impl ResponseHandle {
    /// Waits for the final response head; its body streams afterwards.
    pub async fn response(self) -> Result<Response<ResponseBody>, AjpError> {
        match self.response.await {
            Ok(result) => result,
            Err(_) => Err(AjpError::closed("connection task dropped the exchange")),
        }
    }

    /// Waits for an interim 100 Continue head, if the backend sends one.
    ///
    /// Resolves to `None` once the exchange finishes without one; later
    /// calls return `None` immediately.
    pub async fn interim(&mut self) -> Option<ResponseHead> {
        match self.interim.take() {
            Some(receiver) => receiver.await.ok(),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use http_body_util::BodyExt;

    fn new_exchange() -> (Exchange, ResponseHandle) {
        Exchange::new(AjpRequest::new(Method::GET, "/"), PayloadSize::Empty, None)
    }

    fn head(status: StatusCode) -> ResponseHead {
        let mut head = ResponseHead::new(());
        *head.status_mut() = status;
        head
    }

    #[tokio::test]
    async fn response_head_and_chunks_reach_the_handle() {
        let (mut exchange, handle) = new_exchange();

        exchange.deliver_headers(head(StatusCode::OK));
        exchange.deliver_chunk(Bytes::from_static(b"payload")).await;
        exchange.finish_response(true);

        assert!(exchange.response_terminated);
        assert!(exchange.connection_reusable());

        let response = handle.response().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap();
        assert_eq!(body.to_bytes(), Bytes::from_static(b"payload"));
    }

    #[tokio::test]
    async fn continue_head_fills_the_interim_slot_only() {
        let (mut exchange, mut handle) = new_exchange();

        exchange.deliver_headers(head(StatusCode::CONTINUE));
        assert_eq!(handle.interim().await.unwrap().status(), StatusCode::CONTINUE);
        assert!(handle.interim().await.is_none());

        // the final response still arrives afterwards
        exchange.deliver_headers(head(StatusCode::NO_CONTENT));
        exchange.finish_response(true);
        assert_eq!(handle.response().await.unwrap().status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn failure_is_delivered_once_to_the_open_slot() {
        let (mut exchange, handle) = new_exchange();
        exchange.fail(AjpError::closed("broken pipe"));
        assert!(handle.response().await.is_err());

        // after the head was delivered, the failure flows into the body
        let (mut exchange, handle) = new_exchange();
        exchange.deliver_headers(head(StatusCode::OK));
        exchange.fail(AjpError::closed("broken pipe"));
        let response = handle.response().await.unwrap();
        assert!(response.into_body().collect().await.is_err());
    }

    #[tokio::test]
    async fn failure_with_a_full_body_channel_still_reaches_the_caller() {
        let (mut exchange, handle) = new_exchange();
        exchange.deliver_headers(head(StatusCode::OK));
        for _ in 0..BODY_CHANNEL_CAPACITY {
            exchange.deliver_chunk(Bytes::from_static(b"x")).await;
        }
        exchange.fail(AjpError::closed("connection reset mid-body"));

        // buffered chunks must not turn the failure into a clean, short body
        let response = handle.response().await.unwrap();
        assert!(response.into_body().collect().await.is_err());
    }

    #[tokio::test]
    async fn end_without_head_fails_the_response_slot() {
        let (mut exchange, handle) = new_exchange();
        exchange.finish_response(false);
        assert!(!exchange.connection_reusable());
        assert!(handle.response().await.is_err());
    }
}
