//! Binary packet primitives.
//!
//! AJP packets are built from two scalar shapes: big-endian 16-bit integers
//! and length-prefixed, NUL-terminated byte strings. The readers here are
//! resumable: when the buffer runs out mid-value they stash what they have
//! and report "incomplete", continuing correctly on the next call. This is
//! what lets the response decoder survive arbitrary fragmentation of the
//! wire bytes across non-blocking reads.

use std::cmp;

use bytes::{Buf, BufMut, BytesMut};

/// Wire length value meaning "null string": no data bytes, no terminator.
pub(crate) const NULL_LENGTH: u16 = 0xFFFF;

/// Resumable reader for a big-endian u16.
///
/// If only the high byte is available it is kept as carry; the next call
/// consumes the low byte and yields the full value, clearing the carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct IntReader {
    carry: Option<u8>,
}

impl IntReader {
    /// Consumes 1-2 bytes from `src`. Returns `None` when more input is
    /// needed; never blocks.
    pub(crate) fn read(&mut self, src: &mut BytesMut) -> Option<u16> {
        let high = match self.carry.take() {
            Some(byte) => byte,
            None => {
                if src.is_empty() {
                    return None;
                }
                src.get_u8()
            }
        };

        if src.is_empty() {
            self.carry = Some(high);
            return None;
        }

        Some(u16::from_be_bytes([high, src.get_u8()]))
    }
}

/// A completed read of an AJP wire string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Text {
    /// Literal bytes of the string (1 byte = 1 char on the wire).
    Value(Vec<u8>),
    /// The 0xFFFF null sentinel.
    Null,
    /// A well-known header-name code: the length's high byte was nonzero and
    /// the low byte indexes the fixed response-header table.
    HeaderCode(u8),
}

/// Resumable reader for a length-prefixed, NUL-terminated string.
///
/// Remembers the partially-built value and its target length across buffer
/// boundaries. When `header_name` is set, a length with a nonzero high byte
/// is not a length at all but an interned header-name code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct TextReader {
    int_reader: IntReader,
    remaining: Option<usize>,
    partial: Vec<u8>,
}

impl TextReader {
    /// Consumes bytes from `src` until the declared length and the trailing
    /// NUL are read. Returns `None` when more input is needed.
    pub(crate) fn read(&mut self, src: &mut BytesMut, header_name: bool) -> Option<Text> {
        let mut remaining = match self.remaining {
            Some(remaining) => remaining,
            None => {
                let length = self.int_reader.read(src)?;
                if length == NULL_LENGTH {
                    return Some(Text::Null);
                }
                if header_name && length & 0xFF00 != 0 {
                    return Some(Text::HeaderCode(length as u8));
                }
                let length = length as usize;
                self.remaining = Some(length);
                length
            }
        };

        let take = cmp::min(remaining, src.len());
        self.partial.extend_from_slice(&src.split_to(take));
        remaining -= take;
        self.remaining = Some(remaining);

        // the mandatory NUL terminator follows the declared bytes
        if remaining > 0 || src.is_empty() {
            return None;
        }
        src.advance(1);

        self.remaining = None;
        Some(Text::Value(std::mem::take(&mut self.partial)))
    }
}

/// Writes a length-prefixed, NUL-terminated string.
pub(crate) fn put_text(dst: &mut BytesMut, value: &[u8]) {
    dst.put_u16(value.len() as u16);
    dst.put_slice(value);
    dst.put_u8(0);
}

/// Decodes wire bytes as text, one byte per char (no multi-byte decoding).
pub(crate) fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_reader_whole() {
        let mut src = BytesMut::from(&[0x12, 0x34, 0xFF][..]);
        let mut reader = IntReader::default();
        assert_eq!(reader.read(&mut src), Some(0x1234));
        assert_eq!(src.len(), 1);
    }

    #[test]
    fn int_reader_resumes_across_split() {
        let mut reader = IntReader::default();

        let mut src = BytesMut::from(&[0xA0][..]);
        assert_eq!(reader.read(&mut src), None);
        assert!(src.is_empty());

        let mut src = BytesMut::from(&[0x0B][..]);
        assert_eq!(reader.read(&mut src), Some(0xA00B));

        // carry is cleared, the reader is reusable
        let mut src = BytesMut::from(&[0x00, 0x05][..]);
        assert_eq!(reader.read(&mut src), Some(5));
    }

    #[test]
    fn text_reader_whole() {
        let mut src = BytesMut::from(&b"\x00\x03foo\x00rest"[..]);
        let mut reader = TextReader::default();
        assert_eq!(reader.read(&mut src, false), Some(Text::Value(b"foo".to_vec())));
        assert_eq!(&src[..], b"rest");
    }

    #[test]
    fn text_reader_byte_at_a_time() {
        let wire = b"\x00\x05hello\x00";
        let mut reader = TextReader::default();

        let mut result = None;
        for &byte in wire.iter() {
            let mut src = BytesMut::from(&[byte][..]);
            if let Some(text) = reader.read(&mut src, false) {
                result = Some(text);
            }
        }
        assert_eq!(result, Some(Text::Value(b"hello".to_vec())));
    }

    #[test]
    fn text_reader_null_sentinel() {
        let mut src = BytesMut::from(&[0xFF, 0xFF, 0x42][..]);
        let mut reader = TextReader::default();
        assert_eq!(reader.read(&mut src, false), Some(Text::Null));
        // no data bytes and no terminator follow a null string
        assert_eq!(src.len(), 1);
    }

    #[test]
    fn text_reader_header_code() {
        let mut src = BytesMut::from(&[0xA0, 0x03][..]);
        let mut reader = TextReader::default();
        assert_eq!(reader.read(&mut src, true), Some(Text::HeaderCode(3)));

        // the same bytes read as a plain string are a (very long) length
        let mut src = BytesMut::from(&[0xA0, 0x03][..]);
        let mut reader = TextReader::default();
        assert_eq!(reader.read(&mut src, false), None);
    }

    #[test]
    fn text_reader_empty_string() {
        let mut src = BytesMut::from(&[0x00, 0x00, 0x00][..]);
        let mut reader = TextReader::default();
        assert_eq!(reader.read(&mut src, false), Some(Text::Value(Vec::new())));
        assert!(src.is_empty());
    }

    #[test]
    fn put_text_roundtrip() {
        let mut dst = BytesMut::new();
        put_text(&mut dst, b"example.com");
        assert_eq!(&dst[..], b"\x00\x0bexample.com\x00");
    }
}
