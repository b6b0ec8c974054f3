//! Connection driver and request submission handle.

use std::fmt;
use std::future::pending;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, trace};

use crate::codec::DEFAULT_PACKET_SIZE;
use crate::connection::channel::AjpChannel;
use crate::connection::exchange::{BODY_CHANNEL_CAPACITY, Exchange, ResponseHandle};
use crate::protocol::body::RequestBodySender;
use crate::protocol::{AjpError, AjpRequest, ParseError, PayloadSize, ResponseFrame, SubmitError};

/// Tunables for one connection.
#[derive(Debug, Clone, Copy)]
pub struct AjpConfig {
    /// Largest packet either side may send, header size included.
    pub max_packet_size: usize,
    /// Bound of the pending exchange queue; submissions beyond it are
    /// rejected synchronously.
    pub queue_capacity: usize,
}

impl Default for AjpConfig {
    fn default() -> Self {
        Self { max_packet_size: DEFAULT_PACKET_SIZE, queue_capacity: 16 }
    }
}

/// Driver for one AJP connection.
///
/// Owns both socket halves and runs every exchange submitted through the
/// paired [`AjpHandle`], strictly one at a time in submission order. The
/// connection stays reusable across exchanges until a request asks to close
/// it, a request asks for an upgrade (which AJP cannot do), or the backend
/// flags END_RESPONSE as non-reusable.
///
/// ```ignore
/// let (handle, connection) = AjpConnection::new(read_half, write_half);
/// tokio::spawn(connection.run());
/// let response = handle.send(AjpRequest::new(Method::GET, "/"))?.response().await?;
/// ```
pub struct AjpConnection<R, W> {
    channel: AjpChannel<R, W>,
    queue: mpsc::Receiver<Exchange>,
    closing: Arc<AtomicBool>,
}

impl<R, W> AjpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> (AjpHandle, Self) {
        Self::with_config(reader, writer, AjpConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: AjpConfig) -> (AjpHandle, Self) {
        let (sender, queue) = mpsc::channel(config.queue_capacity);
        let closing = Arc::new(AtomicBool::new(false));
        let handle = AjpHandle { sender, closing: Arc::clone(&closing) };
        let connection = Self { channel: AjpChannel::new(reader, writer, config.max_packet_size), queue, closing };
        (handle, connection)
    }

    /// Runs the connection until it closes.
    ///
    /// On any failure the active exchange and everything still queued are
    /// rejected, the socket is shut down best-effort and the error is
    /// returned.
    pub async fn run(mut self) -> Result<(), AjpError> {
        let result = self.process().await;
        self.closing.store(true, Ordering::Release);
        self.reject_queued().await;
        self.channel.shutdown().await;
        if let Err(e) = &result {
            error!("connection failed, cause {e}");
        }
        result
    }

    async fn process(&mut self) -> Result<(), AjpError> {
        loop {
            select! {
                biased;

                exchange = self.queue.recv() => match exchange {
                    Some(mut exchange) => {
                        let reuse = match self.drive_exchange(&mut exchange).await {
                            Ok(reuse) => reuse,
                            Err(e) => {
                                exchange.fail(AjpError::closed(format!("connection failed: {e}")));
                                return Err(e);
                            }
                        };
                        if !reuse {
                            info!("closing connection after a non-reusable exchange");
                            return Ok(());
                        }
                    }
                    None => {
                        debug!("all handles dropped, closing connection");
                        return Ok(());
                    }
                },

                frame = self.channel.next_frame() => match frame {
                    Some(Ok(frame)) => {
                        error!("received {frame:?} outside an exchange");
                        return Err(AjpError::closed("backend sent a frame outside an exchange"));
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        info!("backend closed the idle connection");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Runs one exchange to completion, returning whether the connection
    /// may be reused for the next one.
    async fn drive_exchange(&mut self, exchange: &mut Exchange) -> Result<bool, AjpError> {
        trace!("starting exchange {} {}", exchange.request.method(), exchange.request.target());
        // a pre-1.1 protocol token implies no keep-alive
        let close_requested =
            exchange.request.wants_close() || !exchange.request.protocol().eq_ignore_ascii_case("HTTP/1.1");
        let upgrade_requested = exchange.request.wants_upgrade();
        if upgrade_requested {
            debug!("upgrade requested, the connection will close after this exchange");
        }
        if close_requested || upgrade_requested {
            // stop accepting submissions right away, not only once the socket closes
            self.closing.store(true, Ordering::Release);
        }

        self.channel.write_forward(&exchange.request, exchange.payload_size)?;
        if self.channel.body_finished() {
            exchange.request_terminated = true;
        }

        let mut body_receiver = exchange.body_receiver.take();
        let mut pending_data: Option<Bytes> = None;

        while !(exchange.request_terminated && exchange.response_terminated) {
            if let Some(data) = pending_data.as_mut()
                && self.channel.ready()
            {
                self.channel.write_data(data)?;
                if data.is_empty() {
                    pending_data = None;
                }
                if self.channel.body_finished() {
                    exchange.request_terminated = true;
                }
            }
            if pending_data.is_none() && body_receiver.is_none() && !exchange.request_terminated {
                self.channel.finish_body()?;
                exchange.request_terminated = true;
            }
            self.channel.flush().await?;

            if exchange.request_terminated && exchange.response_terminated {
                break;
            }

            let awaiting_data = pending_data.is_none() && body_receiver.is_some() && !exchange.request_terminated;
            select! {
                biased;

                frame = self.channel.next_frame() => {
                    self.handle_frame(exchange, frame).await?;
                }

                data = recv_body(&mut body_receiver), if awaiting_data => match data {
                    Some(bytes) => pending_data = Some(bytes),
                    None => body_receiver = None,
                },
            }
        }

        self.channel.finish_exchange();
        Ok(exchange.connection_reusable() && !close_requested && !upgrade_requested)
    }

    async fn handle_frame(
        &mut self,
        exchange: &mut Exchange,
        frame: Option<Result<ResponseFrame, ParseError>>,
    ) -> Result<(), AjpError> {
        match frame {
            Some(Ok(ResponseFrame::Headers(head))) => {
                trace!("received response head, status {}", head.status());
                exchange.deliver_headers(head);
            }
            Some(Ok(ResponseFrame::BodyChunk(chunk))) => exchange.deliver_chunk(chunk).await,
            Some(Ok(ResponseFrame::BodyRequested(size))) => {
                trace!("backend granted a body chunk of {size} bytes");
                self.channel.grant(size);
            }
            Some(Ok(ResponseFrame::End { reusable })) => {
                trace!("exchange finished, connection reusable: {reusable}");
                exchange.finish_response(reusable);
                if !exchange.request_terminated {
                    debug!("backend finished before the request body was fully sent");
                    exchange.request_terminated = true;
                }
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Err(AjpError::closed("backend closed the connection mid-exchange")),
        }
        Ok(())
    }

    async fn reject_queued(&mut self) {
        self.queue.close();
        while let Some(mut exchange) = self.queue.recv().await {
            exchange.fail(SubmitError::Closed.into());
        }
    }
}

impl<R, W> fmt::Debug for AjpConnection<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AjpConnection").field("closing", &self.closing.load(Ordering::Relaxed)).finish_non_exhaustive()
    }
}

async fn recv_body(receiver: &mut Option<mpsc::Receiver<Bytes>>) -> Option<Bytes> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => pending().await,
    }
}

/// Cloneable submission side of a connection.
#[derive(Debug, Clone)]
pub struct AjpHandle {
    sender: mpsc::Sender<Exchange>,
    closing: Arc<AtomicBool>,
}

impl AjpHandle {
    /// Submits a bodyless request, returning a handle to await the
    /// response on. Rejection is synchronous and leaves the connection
    /// untouched.
    pub fn send(&self, request: AjpRequest) -> Result<ResponseHandle, SubmitError> {
        self.submit(request, PayloadSize::Empty, None)
    }

    /// Submits a request with a streamed body.
    ///
    /// A `Content-Length` header selects fixed-length transfer of exactly
    /// that many bytes; without one the body is sent chunked until the
    /// returned sender is dropped.
    pub fn send_stream(&self, request: AjpRequest) -> Result<(RequestBodySender, ResponseHandle), SubmitError> {
        let payload_size = match content_length(&request) {
            Some(0) => PayloadSize::Empty,
            Some(length) => PayloadSize::Length(length),
            None => PayloadSize::Chunked,
        };
        let (body_sender, body_receiver) = RequestBodySender::channel(BODY_CHANNEL_CAPACITY);
        let handle = self.submit(request, payload_size, Some(body_receiver))?;
        Ok((body_sender, handle))
    }

    fn submit(
        &self,
        request: AjpRequest,
        payload_size: PayloadSize,
        body_receiver: Option<mpsc::Receiver<Bytes>>,
    ) -> Result<ResponseHandle, SubmitError> {
        if self.closing.load(Ordering::Acquire) {
            return Err(SubmitError::Closing);
        }
        let (exchange, handle) = Exchange::new(request, payload_size, body_receiver);
        self.sender.try_send(exchange).map_err(|e| match e {
            TrySendError::Full(_) => SubmitError::QueueFull,
            TrySendError::Closed(_) => SubmitError::Closed,
        })?;
        Ok(handle)
    }
}

fn content_length(request: &AjpRequest) -> Option<u64> {
    request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}
