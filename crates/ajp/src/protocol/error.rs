use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AjpError {
    #[error("decode error: {source}")]
    Decode {
        #[from]
        source: ParseError,
    },

    #[error("encode error: {source}")]
    Encode {
        #[from]
        source: SendError,
    },

    #[error("submit error: {source}")]
    Submit {
        #[from]
        source: SubmitError,
    },

    #[error("connection closed: {reason}")]
    Closed { reason: String },
}

impl AjpError {
    pub fn closed<S: ToString>(reason: S) -> Self {
        Self::Closed { reason: reason.to_string() }
    }
}

/// Errors raised while decoding response packets from the backend.
///
/// All of these are fatal for the connection: the protocol has no way to
/// resynchronize after a framing error.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid packet magic: {actual:#04x}")]
    BadMagic { actual: u8 },

    #[error("unknown packet prefix code: {0}")]
    UnknownPrefix(u8),

    #[error("unknown response header code: {0:#04x}")]
    UnknownHeaderCode(u8),

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid status code: {0}")]
    InvalidStatus(u16),

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn bad_magic(actual: u8) -> Self {
        Self::BadMagic { actual }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Errors raised while encoding request packets.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("forward request packet size {current_size} exceeds the packet limit {max_size}")]
    HeaderOverflow { current_size: usize, max_size: usize },

    #[error("request body exceeds the declared content length by {excess} bytes")]
    BodyOverrun { excess: u64 },

    #[error("request body ended {missing} bytes short of the declared content length")]
    BodyUnderrun { missing: u64 },

    #[error("no body chunk has been granted by the backend")]
    NotReady,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn header_overflow(current_size: usize, max_size: usize) -> Self {
        Self::HeaderOverflow { current_size, max_size }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Synchronous rejection of a request submission.
///
/// These never change connection state: the request simply is not accepted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("connection is closed")]
    Closed,

    #[error("connection is closing and accepts no further requests")]
    Closing,

    #[error("pending exchange queue is full")]
    QueueFull,
}
