//! Wire codecs.
//!
//! The stream starts with one CR LF terminated handshake line,
//! `<session-id> <delimiter>`, followed by messages that are each terminated
//! by the announced delimiter. Both codecs decode incrementally from a single
//! [`BytesMut`] so bytes that arrive with the handshake line are framed
//! afterwards without copying.
//!
//! Text is 7-bit ASCII in both directions; bytes or characters outside that
//! range become `?`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Terminator of the handshake line.
pub const HANDSHAKE_TERMINATOR: &[u8] = b"\r\n";

/// Replacement for anything outside 7-bit ASCII.
const REPLACEMENT: u8 = b'?';

/// Session parameters announced by the server's handshake line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    /// Server-assigned session identifier, possibly empty
    pub session_id: String,
    /// Non-empty message delimiter for the rest of the stream.
    ///
    /// Decoded like all other text, so a non-ASCII byte in the announced
    /// delimiter reads as `?`. Framing folds incoming bytes the same way
    /// and still matches the original byte on the wire.
    pub delimiter: String,
}

impl Session {
    /// Parse a handshake line with its terminator already removed.
    ///
    /// The line is split on single spaces keeping empty tokens; the first
    /// token is the session id, the second the delimiter, and any further
    /// tokens are ignored.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut tokens = line.split(' ');
        let session_id = tokens.next().unwrap_or_default();
        let delimiter = tokens.next().ok_or(ProtocolError::MissingDelimiter)?;
        if delimiter.is_empty() {
            return Err(ProtocolError::EmptyDelimiter);
        }

        Ok(Self {
            session_id: session_id.to_owned(),
            delimiter: delimiter.to_owned(),
        })
    }
}

const fn fold_ascii(b: u8) -> u8 {
    if b.is_ascii() { b } else { REPLACEMENT }
}

/// Decode bytes as 7-bit ASCII.
pub fn decode_ascii(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(fold_ascii(b))).collect()
}

/// Append `text` to `dst` as 7-bit ASCII.
pub fn encode_ascii(text: &str, dst: &mut BytesMut) {
    dst.reserve(text.len());
    for ch in text.chars() {
        dst.put_u8(if ch.is_ascii() { ch as u8 } else { REPLACEMENT });
    }
}

fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// Decoder for the handshake line.
///
/// Yields a [`Session`] once CR LF has arrived and leaves every byte after
/// the terminator in the buffer.
#[derive(Debug, Clone)]
pub struct HandshakeCodec {
    max_length: usize,
    next_index: usize,
}

impl HandshakeCodec {
    /// A decoder that gives up once `max_length` bytes arrive without CR LF.
    pub const fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }

    /// Configured line bound.
    pub const fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Decoder for HandshakeCodec {
    type Item = Session;
    type Error = ProtocolError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Session>, ProtocolError> {
        match find_from(buf, HANDSHAKE_TERMINATOR, self.next_index) {
            Some(end) if end > self.max_length => Err(ProtocolError::HandshakeTooLong {
                max: self.max_length,
            }),
            Some(end) => {
                self.next_index = 0;
                let line = buf.split_to(end);
                buf.advance(HANDSHAKE_TERMINATOR.len());
                Session::parse(&decode_ascii(&line)).map(Some)
            }
            None if buf.len() > self.max_length + HANDSHAKE_TERMINATOR.len() => {
                Err(ProtocolError::HandshakeTooLong {
                    max: self.max_length,
                })
            }
            None => {
                // A CR at the tail may be the first half of the terminator
                self.next_index = buf.len().saturating_sub(HANDSHAKE_TERMINATOR.len() - 1);
                Ok(None)
            }
        }
    }
}

/// Codec for delimiter-terminated messages.
///
/// Decoding yields every complete message and keeps the unterminated tail
/// buffered. Encoding appends the delimiter to the payload.
#[derive(Debug, Clone)]
pub struct DelimiterCodec {
    delimiter: Bytes,
    max_length: Option<usize>,
    next_index: usize,
}

impl DelimiterCodec {
    /// A codec for `delimiter`, bounding buffered messages to `max_length`.
    pub fn new(delimiter: &str, max_length: Option<usize>) -> Result<Self, ProtocolError> {
        if delimiter.is_empty() {
            return Err(ProtocolError::EmptyDelimiter);
        }

        let mut encoded = BytesMut::with_capacity(delimiter.len());
        encode_ascii(delimiter, &mut encoded);
        Ok(Self {
            delimiter: encoded.freeze(),
            max_length,
            next_index: 0,
        })
    }

    /// The delimiter as sent on the wire.
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// Position of the next delimiter, comparing incoming bytes as decoded
    /// text.
    fn find_delimiter(&self, haystack: &[u8], from: usize) -> Option<usize> {
        haystack
            .get(from..)?
            .windows(self.delimiter.len())
            .position(|window| {
                window
                    .iter()
                    .map(|&b| fold_ascii(b))
                    .eq(self.delimiter.iter().copied())
            })
            .map(|pos| pos + from)
    }

    fn check_length(&self, size: usize) -> Result<(), ProtocolError> {
        match self.max_length {
            Some(max) if size > max => Err(ProtocolError::MessageTooLong { size, max }),
            _ => Ok(()),
        }
    }
}

impl Decoder for DelimiterCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        let delimiter_len = self.delimiter.len();
        match self.find_delimiter(buf, self.next_index) {
            Some(end) => {
                self.check_length(end)?;
                self.next_index = 0;
                let message = buf.split_to(end);
                buf.advance(delimiter_len);
                Ok(Some(decode_ascii(&message)))
            }
            None => {
                // Up to len - 1 trailing bytes may be a delimiter prefix
                let scanned = buf.len().saturating_sub(delimiter_len - 1);
                self.check_length(scanned)?;
                self.next_index = scanned;
                Ok(None)
            }
        }
    }
}

impl Encoder<&str> for DelimiterCodec {
    type Error = ProtocolError;

    fn encode(&mut self, payload: &str, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.reserve(payload.len() + self.delimiter.len());
        encode_ascii(payload, dst);
        dst.extend_from_slice(&self.delimiter);
        Ok(())
    }
}
