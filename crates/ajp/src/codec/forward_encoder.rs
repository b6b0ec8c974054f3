//! Serialization of the FORWARD_REQUEST packet.
//!
//! The whole HTTP request head travels in a single packet: method code,
//! protocol token, path, proxy-context strings, headers (with the well-known
//! name code substitution) and tagged optional attributes. The packet is
//! built in a scratch buffer and framed once the body length is known; a
//! head too large for the packet limit is a fatal, non-recoverable error.

use bytes::{BufMut, BytesMut};
use http::header;

use crate::codec::primitives::put_text;
use crate::codec::tables::{CLIENT_MAGIC, UNKNOWN_METHOD, attribute, method_code, prefix, request_header_code};
use crate::protocol::{AjpRequest, PayloadSize, SendError};
use crate::ensure;

/// One-shot encoder for the request head.
#[derive(Debug, Clone, Copy)]
pub struct ForwardEncoder {
    max_packet_size: usize,
}

impl ForwardEncoder {
    pub fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }

    /// Encodes the complete forward-request packet into `dst`.
    ///
    /// `payload_size` decides which length header is synthesized when the
    /// request carries none: `Content-Length` for fixed-length bodies,
    /// `Transfer-Encoding: chunked` for unbounded ones.
    ///
    /// # Errors
    ///
    /// [`SendError::HeaderOverflow`] when the encoded packet would exceed
    /// the packet limit. This error is fatal for the connection.
    pub fn encode(&self, request: &AjpRequest, payload_size: PayloadSize, dst: &mut BytesMut) -> Result<(), SendError> {
        let mut body = BytesMut::with_capacity(self.max_packet_size);

        body.put_u8(prefix::FORWARD_REQUEST);

        let code = method_code(request.method());
        body.put_u8(code.unwrap_or(UNKNOWN_METHOD));

        put_text(&mut body, request.protocol().as_bytes());
        put_text(&mut body, request.path().as_bytes());

        let attributes = request.attributes();
        put_text(&mut body, attributes.remote_addr.as_deref().unwrap_or("").as_bytes());
        put_text(&mut body, attributes.remote_host.as_deref().unwrap_or("").as_bytes());
        put_text(&mut body, attributes.server_name.as_deref().unwrap_or("").as_bytes());
        body.put_u16(attributes.server_port);
        body.put_u8(u8::from(attributes.is_ssl));

        self.encode_headers(request, payload_size, &mut body);
        self.encode_attributes(request, code.is_none(), &mut body);

        let packet_size = body.len() + 4;
        ensure!(packet_size <= self.max_packet_size, SendError::header_overflow(packet_size, self.max_packet_size));

        dst.reserve(packet_size);
        dst.put_slice(&CLIENT_MAGIC);
        dst.put_u16(body.len() as u16);
        dst.put_slice(&body);
        Ok(())
    }

    fn encode_headers(&self, request: &AjpRequest, payload_size: PayloadSize, body: &mut BytesMut) {
        let headers = request.headers();

        let synthesized: Option<(u16, String)> = match payload_size {
            PayloadSize::Length(n) if !headers.contains_key(header::CONTENT_LENGTH) => Some((0xA008, n.to_string())),
            PayloadSize::Chunked if !headers.contains_key(header::TRANSFER_ENCODING) => {
                // transfer-encoding has no name code; encoded literally below
                Some((0, "chunked".to_string()))
            }
            _ => None,
        };

        let count = headers.len() + usize::from(synthesized.is_some());
        body.put_u16(count as u16);

        for (name, value) in headers.iter() {
            match request_header_code(name) {
                Some(code) => body.put_u16(code),
                None => put_text(body, name.as_str().as_bytes()),
            }
            put_text(body, value.as_bytes());
        }

        if let Some((code, value)) = synthesized {
            if code != 0 {
                body.put_u16(code);
            } else {
                put_text(body, header::TRANSFER_ENCODING.as_str().as_bytes());
            }
            put_text(body, value.as_bytes());
        }
    }

    fn encode_attributes(&self, request: &AjpRequest, stored_method: bool, body: &mut BytesMut) {
        let attributes = request.attributes();

        if let Some(query) = request.query() {
            body.put_u8(attribute::QUERY_STRING);
            put_text(body, query.as_bytes());
        }
        if let Some(remote_user) = &attributes.remote_user {
            body.put_u8(attribute::REMOTE_USER);
            put_text(body, remote_user.as_bytes());
        }
        if let Some(auth_type) = &attributes.auth_type {
            body.put_u8(attribute::AUTH_TYPE);
            put_text(body, auth_type.as_bytes());
        }
        if let Some(route) = &attributes.route {
            body.put_u8(attribute::ROUTE);
            put_text(body, route.as_bytes());
        }
        if let Some(cert) = &attributes.ssl_cert {
            body.put_u8(attribute::SSL_CERT);
            put_text(body, cert.as_bytes());
        }
        if let Some(cipher) = &attributes.ssl_cipher {
            body.put_u8(attribute::SSL_CIPHER);
            put_text(body, cipher.as_bytes());
        }
        if let Some(session) = &attributes.ssl_session {
            body.put_u8(attribute::SSL_SESSION);
            put_text(body, hex(session).as_bytes());
        }
        if let Some(key_size) = attributes.ssl_key_size {
            body.put_u8(attribute::SSL_KEY_SIZE);
            put_text(body, key_size.to_string().as_bytes());
        }
        if let Some(secret) = &attributes.secret {
            body.put_u8(attribute::SECRET);
            put_text(body, secret.as_bytes());
        }
        if stored_method {
            body.put_u8(attribute::STORED_METHOD);
            put_text(body, request.method().as_str().as_bytes());
        }

        body.put_u8(attribute::DONE);
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ForwardAttributes;
    use http::{HeaderName, HeaderValue, Method};

    /// Minimal independent walk over an encoded forward-request packet,
    /// returning (method code, path, attributes, coded headers).
    struct Parsed {
        method: u8,
        protocol: String,
        path: String,
        headers: Vec<(String, String)>,
        attributes: Vec<(u8, String)>,
    }

    struct Cursor<'a> {
        wire: &'a [u8],
        pos: usize,
    }

    impl<'a> Cursor<'a> {
        fn u8(&mut self) -> u8 {
            let v = self.wire[self.pos];
            self.pos += 1;
            v
        }

        fn u16(&mut self) -> u16 {
            let v = u16::from_be_bytes([self.wire[self.pos], self.wire[self.pos + 1]]);
            self.pos += 2;
            v
        }

        fn text(&mut self) -> String {
            let len = self.u16() as usize;
            let s = String::from_utf8(self.wire[self.pos..self.pos + len].to_vec()).unwrap();
            self.pos += len;
            assert_eq!(self.wire[self.pos], 0, "missing NUL terminator");
            self.pos += 1;
            s
        }
    }

    fn parse_forward(wire: &[u8]) -> Parsed {
        assert_eq!(&wire[..2], &CLIENT_MAGIC);
        let mut cursor = Cursor { wire, pos: 2 };
        let body_len = cursor.u16() as usize;
        assert_eq!(body_len + 4, wire.len());

        assert_eq!(cursor.u8(), prefix::FORWARD_REQUEST);
        let method = cursor.u8();
        let protocol = cursor.text();
        let path = cursor.text();
        let _remote_addr = cursor.text();
        let _remote_host = cursor.text();
        let _server_name = cursor.text();
        let _server_port = cursor.u16();
        let _is_ssl = cursor.u8();

        let count = cursor.u16();
        let mut headers = Vec::new();
        for _ in 0..count {
            let peek = u16::from_be_bytes([wire[cursor.pos], wire[cursor.pos + 1]]);
            let name = if peek & 0xFF00 == 0xA000 {
                cursor.pos += 2;
                format!("{peek:#06x}")
            } else {
                cursor.text()
            };
            let value = cursor.text();
            headers.push((name, value));
        }

        let mut attributes = Vec::new();
        loop {
            let tag = cursor.u8();
            if tag == attribute::DONE {
                break;
            }
            let value = cursor.text();
            attributes.push((tag, value));
        }
        assert_eq!(cursor.pos, wire.len());

        Parsed { method, protocol, path, headers, attributes }
    }

    #[test]
    fn get_with_query_and_host_header() {
        let request = AjpRequest::new(Method::GET, "/foo?x=1")
            .header(header::HOST, HeaderValue::from_static("example.com"));

        let mut dst = BytesMut::new();
        ForwardEncoder::new(8192).encode(&request, PayloadSize::Empty, &mut dst).unwrap();

        let parsed = parse_forward(&dst);
        assert_eq!(parsed.method, 2);
        assert_eq!(parsed.protocol, "HTTP/1.1");
        assert_eq!(parsed.path, "/foo");
        assert_eq!(parsed.headers, vec![("0xa00b".to_string(), "example.com".to_string())]);
        assert_eq!(parsed.attributes, vec![(attribute::QUERY_STRING, "x=1".to_string())]);
    }

    #[test]
    fn proxy_context_defaults_to_empty_and_zero() {
        let request = AjpRequest::new(Method::GET, "/");
        let mut dst = BytesMut::new();
        ForwardEncoder::new(8192).encode(&request, PayloadSize::Empty, &mut dst).unwrap();

        // prefix, method, protocol "HTTP/1.1" (2+8+1), path "/" (2+1+1)
        let ctx = &dst[4 + 2 + 11 + 4..];
        // three empty strings (3 bytes each), port 0 (2 bytes), ssl 0 (1 byte)
        assert_eq!(&ctx[..12], &[0u8; 12]);
    }

    #[test]
    fn synthesizes_content_length_for_fixed_bodies() {
        let request = AjpRequest::new(Method::POST, "/upload");
        let mut dst = BytesMut::new();
        ForwardEncoder::new(8192).encode(&request, PayloadSize::Length(42), &mut dst).unwrap();

        let parsed = parse_forward(&dst);
        assert_eq!(parsed.headers, vec![("0xa008".to_string(), "42".to_string())]);
    }

    #[test]
    fn synthesizes_transfer_encoding_for_chunked_bodies() {
        let request = AjpRequest::new(Method::POST, "/upload");
        let mut dst = BytesMut::new();
        ForwardEncoder::new(8192).encode(&request, PayloadSize::Chunked, &mut dst).unwrap();

        let parsed = parse_forward(&dst);
        assert_eq!(parsed.headers, vec![("transfer-encoding".to_string(), "chunked".to_string())]);
    }

    #[test]
    fn non_standard_method_gets_stored_method_attribute() {
        let request = AjpRequest::new(Method::from_bytes(b"BREW").unwrap(), "/pot");
        let mut dst = BytesMut::new();
        ForwardEncoder::new(8192).encode(&request, PayloadSize::Empty, &mut dst).unwrap();

        let parsed = parse_forward(&dst);
        assert_eq!(parsed.method, UNKNOWN_METHOD);
        assert_eq!(parsed.attributes, vec![(attribute::STORED_METHOD, "BREW".to_string())]);
    }

    #[test]
    fn optional_attributes_are_tagged_in_order() {
        let mut request = AjpRequest::new(Method::GET, "/secure?a=b");
        *request.attributes_mut() = ForwardAttributes {
            remote_addr: Some("10.0.0.1".to_string()),
            server_port: 443,
            is_ssl: true,
            remote_user: Some("alice".to_string()),
            route: Some("worker1".to_string()),
            ssl_session: Some(vec![0xDE, 0xAD]),
            ssl_key_size: Some(256),
            secret: Some("hush".to_string()),
            ..Default::default()
        };

        let mut dst = BytesMut::new();
        ForwardEncoder::new(8192).encode(&request, PayloadSize::Empty, &mut dst).unwrap();

        let parsed = parse_forward(&dst);
        assert_eq!(
            parsed.attributes,
            vec![
                (attribute::QUERY_STRING, "a=b".to_string()),
                (attribute::REMOTE_USER, "alice".to_string()),
                (attribute::ROUTE, "worker1".to_string()),
                (attribute::SSL_SESSION, "dead".to_string()),
                (attribute::SSL_KEY_SIZE, "256".to_string()),
                (attribute::SECRET, "hush".to_string()),
            ]
        );
    }

    #[test]
    fn oversized_head_is_a_fatal_overflow() {
        let huge = "v".repeat(4096);
        let request = AjpRequest::new(Method::GET, "/")
            .header(HeaderName::from_static("x-a"), HeaderValue::from_str(&huge).unwrap())
            .header(HeaderName::from_static("x-b"), HeaderValue::from_str(&huge).unwrap());

        let mut dst = BytesMut::new();
        let result = ForwardEncoder::new(8192).encode(&request, PayloadSize::Empty, &mut dst);
        assert!(matches!(result, Err(SendError::HeaderOverflow { .. })));
        assert!(dst.is_empty(), "nothing is written on overflow");
    }
}
