//! An asynchronous AJP13 client implementation
//!
//! This crate speaks the Apache JServ Protocol version 1.3 from the client
//! (reverse proxy) side, forwarding HTTP requests to servlet containers such
//! as Tomcat over persistent connections. It is built on top of tokio and
//! focuses on a clean API with careful buffer management and fully
//! incremental parsing.
//!
//! # Features
//!
//! - Full AJP13 forward-request encoding, including the method, header and
//!   attribute code tables
//! - Resumable response decoding that tolerates arbitrary read
//!   fragmentation
//! - Backend-paced request body streaming via GET_BODY_CHUNK grants
//! - Streaming response bodies through the `http_body::Body` trait
//! - Persistent connections with strict one-at-a-time exchange processing
//! - Clean error handling
//!
//! # Example
//!
//! ```no_run
//! use http::Method;
//! use http_body_util::BodyExt;
//! use micro_ajp::connection::AjpConnection;
//! use micro_ajp::protocol::AjpRequest;
//! use tokio::net::TcpStream;
//! use tracing::{error, info};
//!
//! #[tokio::main]
//! async fn main() {
//!     tracing_subscriber::fmt().init();
//!
//!     let stream = match TcpStream::connect("127.0.0.1:8009").await {
//!         Ok(stream) => stream,
//!         Err(e) => {
//!             error!("connect to backend error, cause {}", e);
//!             return;
//!         }
//!     };
//!
//!     let (reader, writer) = stream.into_split();
//!     let (handle, connection) = AjpConnection::new(reader, writer);
//!     tokio::spawn(async move {
//!         if let Err(e) = connection.run().await {
//!             error!("connection has error, cause {}, connection shutdown", e);
//!         }
//!     });
//!
//!     let request = AjpRequest::new(Method::GET, "/index.jsp?lang=en");
//!     let response = handle.send(request).unwrap().response().await.unwrap();
//!     info!("response status {}", response.status());
//!
//!     let body = response.into_body().collect().await.unwrap().to_bytes();
//!     info!("response body {} bytes", body.len());
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`connection`]: Connection driver, request submission and lifecycle
//! - [`protocol`]: Protocol types and abstractions
//! - [`codec`]: Packet encoding/decoding implementation
//!
//! # Core Components
//!
//! ## Connection Handling
//!
//! [`connection::AjpConnection`] is the driver for one backend connection;
//! the paired [`connection::AjpHandle`] submits requests onto its bounded
//! FIFO queue. AJP13 multiplexes nothing, so the driver runs exactly one
//! exchange at a time and keeps the connection alive between exchanges
//! until either side asks otherwise.
//!
//! ## Body Streaming
//!
//! Request bodies are pushed through a [`protocol::body::RequestBodySender`]
//! and leave the client only under backend flow-control grants. Response
//! bodies arrive as a [`protocol::body::ResponseBody`] implementing
//! `http_body::Body`, so the `http_body_util` combinators apply.
//!
//! ## Error Handling
//!
//! The crate uses custom error types that implement `std::error::Error`:
//!
//! - [`protocol::AjpError`]: Top-level error type
//! - [`protocol::ParseError`]: Response decoding errors
//! - [`protocol::SendError`]: Request encoding errors
//! - [`protocol::SubmitError`]: Synchronous submission rejections
//!
//! # Limitations
//!
//! - AJP protocol version 1.3 only
//! - Client side only; this crate does not implement a servlet container
//! - Maximum packet size: 8KB (the protocol's own ceiling)
//! - No protocol upgrades; an upgrade request closes the connection after
//!   its exchange completes

pub mod codec;
pub mod connection;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
