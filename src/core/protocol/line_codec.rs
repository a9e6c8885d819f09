// src/core/protocol/line_codec.rs

//! Implements the newline-delimited text framing used on every relay socket,
//! together with the corresponding `Encoder` and `Decoder`.

use crate::core::RelayError;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const LF: u8 = b'\n';
const CR: u8 = b'\r';

/// Upper bound on a single inbound line unless configured otherwise.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// A `tokio_util::codec` implementation for UTF-8 lines terminated by `\n`.
///
/// Decoding strips the terminator (`\n` or `\r\n`) and nothing else. Encoding
/// writes the message verbatim followed by a single `\n`.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Bytes of the buffer already scanned for a terminator.
    next_index: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Splits `consumed` bytes off the front of `src`, keeping the first `len`
    /// of them as the line.
    fn take_line(
        &mut self,
        src: &mut BytesMut,
        len: usize,
        consumed: usize,
    ) -> Result<String, RelayError> {
        self.next_index = 0;
        let mut line = src.split_to(len);
        src.advance(consumed - len);
        if line.last() == Some(&CR) {
            line.truncate(line.len() - 1);
        }
        if line.len() > self.max_length {
            return Err(RelayError::LineTooLong {
                limit: self.max_length,
            });
        }
        Ok(std::str::from_utf8(&line)?.to_string())
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = RelayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let scan_from = self.next_index.min(src.len());
        match src[scan_from..].iter().position(|b| *b == LF) {
            Some(offset) => {
                let len = scan_from + offset;
                self.take_line(src, len, len + 1).map(Some)
            }
            None => {
                // The terminator may still be in flight, so allow one trailing CR.
                if src.len() > self.max_length.saturating_add(1) {
                    return Err(RelayError::LineTooLong {
                        limit: self.max_length,
                    });
                }
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    /// A final unterminated line is still delivered when the peer closes.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let len = src.len();
        self.take_line(src, len, len).map(Some)
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = RelayError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.as_ref();
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(LF);
        Ok(())
    }
}
