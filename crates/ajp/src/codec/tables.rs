//! Fixed wire tables of the AJP13 protocol.
//!
//! Packet magic values, prefix codes, the method code table, the two
//! well-known header-name code tables (one per direction) and the request
//! attribute tags. These values are protocol constants; an unmodified
//! backend parses against exactly these numbers.

use http::{HeaderName, Method, header};

/// Client-to-server packet magic.
pub(crate) const CLIENT_MAGIC: [u8; 2] = [0x12, 0x34];

/// Server-to-client packet magic.
pub(crate) const SERVER_MAGIC: [u8; 2] = [b'A', b'B'];

/// Default maximum packet size, header included.
pub(crate) const DEFAULT_PACKET_SIZE: usize = 8192;

/// Per-packet framing overhead for a body data packet: 2 bytes magic,
/// 2 bytes packet length, 2 bytes data length.
pub(crate) const DATA_PACKET_OVERHEAD: usize = 6;

/// Method code emitted for methods outside the fixed table; the literal
/// method string then travels in a stored-method attribute.
pub(crate) const UNKNOWN_METHOD: u8 = 0xFF;

pub(crate) mod prefix {
    /// Client → server: forward an HTTP request.
    pub(crate) const FORWARD_REQUEST: u8 = 2;
    /// Server → client: response body payload.
    pub(crate) const SEND_BODY_CHUNK: u8 = 3;
    /// Server → client: response status line and headers.
    pub(crate) const SEND_HEADERS: u8 = 4;
    /// Server → client: terminal packet of a response.
    pub(crate) const END_RESPONSE: u8 = 5;
    /// Server → client: grant for one request-body packet.
    pub(crate) const GET_BODY_CHUNK: u8 = 6;
    /// Control codes drained without interpretation.
    pub(crate) const SHUTDOWN: u8 = 7;
    pub(crate) const PING: u8 = 8;
    pub(crate) const CPONG: u8 = 9;
    pub(crate) const CPING: u8 = 10;
}

pub(crate) mod attribute {
    pub(crate) const REMOTE_USER: u8 = 0x03;
    pub(crate) const AUTH_TYPE: u8 = 0x04;
    pub(crate) const QUERY_STRING: u8 = 0x05;
    pub(crate) const ROUTE: u8 = 0x06;
    pub(crate) const SSL_CERT: u8 = 0x07;
    pub(crate) const SSL_CIPHER: u8 = 0x08;
    pub(crate) const SSL_SESSION: u8 = 0x09;
    pub(crate) const SSL_KEY_SIZE: u8 = 0x0B;
    pub(crate) const SECRET: u8 = 0x0C;
    pub(crate) const STORED_METHOD: u8 = 0x0D;
    pub(crate) const DONE: u8 = 0xFF;
}

/// Numeric code of an HTTP method, if it is one of the 27 the protocol
/// assigns a code to.
pub(crate) fn method_code(method: &Method) -> Option<u8> {
    let code = match method.as_str() {
        "OPTIONS" => 1,
        "GET" => 2,
        "HEAD" => 3,
        "POST" => 4,
        "PUT" => 5,
        "DELETE" => 6,
        "TRACE" => 7,
        "PROPFIND" => 8,
        "PROPPATCH" => 9,
        "MKCOL" => 10,
        "COPY" => 11,
        "MOVE" => 12,
        "LOCK" => 13,
        "UNLOCK" => 14,
        "ACL" => 15,
        "REPORT" => 16,
        "VERSION-CONTROL" => 17,
        "CHECKIN" => 18,
        "CHECKOUT" => 19,
        "UNCHECKOUT" => 20,
        "SEARCH" => 21,
        "MKWORKSPACE" => 22,
        "UPDATE" => 23,
        "LABEL" => 24,
        "MERGE" => 25,
        "BASELINE-CONTROL" => 26,
        "MKACTIVITY" => 27,
        _ => return None,
    };
    Some(code)
}

/// 2-byte code substituted for frequently used request header names.
pub(crate) fn request_header_code(name: &HeaderName) -> Option<u16> {
    let code = match name.as_str() {
        "accept" => 0xA001,
        "accept-charset" => 0xA002,
        "accept-encoding" => 0xA003,
        "accept-language" => 0xA004,
        "authorization" => 0xA005,
        "connection" => 0xA006,
        "content-type" => 0xA007,
        "content-length" => 0xA008,
        "cookie" => 0xA009,
        "cookie2" => 0xA00A,
        "host" => 0xA00B,
        "pragma" => 0xA00C,
        "referer" => 0xA00D,
        "user-agent" => 0xA00E,
        _ => return None,
    };
    Some(code)
}

/// Well-known response header name for an interned name code.
pub(crate) fn response_header_name(code: u8) -> Option<HeaderName> {
    let name = match code {
        0x01 => header::CONTENT_TYPE,
        0x02 => header::CONTENT_LANGUAGE,
        0x03 => header::CONTENT_LENGTH,
        0x04 => header::DATE,
        0x05 => header::LAST_MODIFIED,
        0x06 => header::LOCATION,
        0x07 => header::SET_COOKIE,
        0x08 => HeaderName::from_static("set-cookie2"),
        0x09 => HeaderName::from_static("servlet-engine"),
        0x0A => HeaderName::from_static("status"),
        0x0B => header::WWW_AUTHENTICATE,
        _ => return None,
    };
    Some(name)
}
