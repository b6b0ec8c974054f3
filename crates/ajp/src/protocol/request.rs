//! Outbound request description.
//!
//! An [`AjpRequest`] carries everything the forward-request packet needs:
//! the HTTP method, the target (path with optional embedded query), the
//! protocol token, an ordered multi-valued header collection and the
//! out-of-band proxy attributes a front-end forwards on behalf of the real
//! client (remote address, server name, TLS details and so on).

use http::header::{CONNECTION, UPGRADE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};

/// An HTTP request to be forwarded to an AJP backend.
#[derive(Debug, Clone)]
pub struct AjpRequest {
    method: Method,
    target: String,
    protocol: String,
    headers: HeaderMap,
    attributes: ForwardAttributes,
}

/// Proxy-context values carried out-of-band next to the HTTP headers.
///
/// Absent strings are encoded as empty on the wire, absent numbers as zero;
/// the optional values become tagged attributes at the end of the forward
/// request packet and are skipped entirely when unset.
#[derive(Debug, Clone, Default)]
pub struct ForwardAttributes {
    pub remote_addr: Option<String>,
    pub remote_host: Option<String>,
    pub server_name: Option<String>,
    pub server_port: u16,
    pub is_ssl: bool,
    pub remote_user: Option<String>,
    pub auth_type: Option<String>,
    pub route: Option<String>,
    pub ssl_cert: Option<String>,
    pub ssl_cipher: Option<String>,
    pub ssl_session: Option<Vec<u8>>,
    pub ssl_key_size: Option<u16>,
    pub secret: Option<String>,
}

impl AjpRequest {
    /// Creates a request with the given method and target.
    ///
    /// The target keeps its query string embedded; the encoder splits it at
    /// the first `?` when building the packet.
    pub fn new<T: Into<String>>(method: Method, target: T) -> Self {
        Self {
            method,
            target: target.into(),
            protocol: "HTTP/1.1".to_string(),
            headers: HeaderMap::new(),
            attributes: ForwardAttributes::default(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The full request target, query string included.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The path portion of the target, up to the first `?`.
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// The query portion of the target, without the `?`.
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn set_protocol<S: Into<String>>(&mut self, protocol: S) {
        self.protocol = protocol.into();
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Appends a header, keeping any existing values for the same name.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn attributes(&self) -> &ForwardAttributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut ForwardAttributes {
        &mut self.attributes
    }

    pub fn with_attributes(mut self, attributes: ForwardAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Whether the request asks the connection to be closed afterwards.
    pub fn wants_close(&self) -> bool {
        connection_contains(&self.headers, "close")
    }

    /// Whether the request asks for a protocol upgrade.
    ///
    /// AJP has no upgrade mechanism, so such a request forces the connection
    /// to close once its exchange completes.
    pub fn wants_upgrade(&self) -> bool {
        self.headers.contains_key(UPGRADE) || connection_contains(&self.headers, "upgrade")
    }
}

fn connection_contains(headers: &HeaderMap, token: &str) -> bool {
    headers.get_all(CONNECTION).iter().any(|value| {
        value
            .to_str()
            .map(|s| s.split(',').any(|part| part.trim().eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    })
}
