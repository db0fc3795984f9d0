//! Redis Serialization Protocol (RESP) codec.
//!
//! Converts between raw wire bytes and [`RespValue`]. Decoding is incremental:
//! [`RespValue::decode`] consumes exactly one frame and hands back whatever
//! follows it, so a single read buffer holding several pipelined commands can
//! be carved up frame by frame.

use std::fmt::Write;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Literal that opens the placeholder snapshot payload sent during a full resync.
pub const SNAPSHOT_MARKER: &[u8] = b"REDIS";

const CRLF: &[u8] = b"\r\n";

/// Arrays nested deeper than this are rejected instead of decoded.
pub const MAX_NESTING_DEPTH: usize = 64;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RespError {
    #[error("incomplete frame")]
    Incomplete,
    #[error("unknown RESP type byte {0:#04x}")]
    UnknownRespType(u8),
    #[error("failed to parse integer")]
    InvalidInteger,
    #[error("invalid bulk string")]
    InvalidBulkString,
    #[error("invalid array")]
    InvalidArray,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("invalid snapshot payload")]
    InvalidSnapshot,
    #[error("arrays nested too deeply")]
    NestingTooDeep,
}

impl RespError {
    /// Whether more bytes could turn the input into a valid frame.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, RespError::Incomplete)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    NullBulkString,
    Array(Vec<RespValue>),
}

/// Outcome of decoding the front of a buffer.
#[derive(Debug, PartialEq)]
pub enum Decoded<'a> {
    /// The buffer was empty; nothing was consumed.
    Empty,
    /// One complete value plus the bytes that follow it.
    Value(RespValue, &'a [u8]),
    /// The buffer starts with the snapshot marker and must not be parsed.
    Opaque,
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn bulk_string(data: impl AsRef<[u8]>) -> Self {
        RespValue::BulkString(Bytes::copy_from_slice(data.as_ref()))
    }

    /// Builds a command frame: an array of bulk strings.
    pub fn command<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        RespValue::Array(parts.into_iter().map(RespValue::bulk_string).collect())
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.freeze()
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        // Writing into a BytesMut cannot fail.
        match self {
            RespValue::SimpleString(s) => {
                let _ = write!(buf, "+{}\r\n", s);
            }
            RespValue::Error(s) => {
                let _ = write!(buf, "-{}\r\n", s);
            }
            RespValue::Integer(i) => {
                let _ = write!(buf, ":{}\r\n", i);
            }
            RespValue::BulkString(data) => {
                let _ = write!(buf, "${}\r\n", data.len());
                buf.put_slice(data);
                buf.put_slice(CRLF);
            }
            RespValue::NullBulkString => buf.put_slice(b"$-1\r\n"),
            RespValue::Array(elements) => {
                let _ = write!(buf, "*{}\r\n", elements.len());
                for element in elements {
                    element.encode_into(buf);
                }
            }
        }
    }

    /// Decodes one value from the front of `input`.
    ///
    /// Returns [`Decoded::Empty`] for an empty buffer and [`Decoded::Opaque`]
    /// when the buffer starts with [`SNAPSHOT_MARKER`]. A frame that is valid
    /// so far but cut short yields [`RespError::Incomplete`].
    ///
    /// The frame is measured before anything is copied out of it, so calling
    /// this again each time more of a large frame arrives stays cheap.
    pub fn decode(input: &[u8]) -> Result<Decoded<'_>, RespError> {
        if input.is_empty() {
            return Ok(Decoded::Empty);
        }

        if input[0] == SNAPSHOT_MARKER[0] {
            let prefix_len = input.len().min(SNAPSHOT_MARKER.len());
            if input[..prefix_len] == SNAPSHOT_MARKER[..prefix_len] {
                if prefix_len < SNAPSHOT_MARKER.len() {
                    return Err(RespError::Incomplete);
                }
                return Ok(Decoded::Opaque);
            }
        }

        let length = scan_value(input, 0)?;
        let (value, _) = decode_value(&input[..length])?;
        Ok(Decoded::Value(value, &input[length..]))
    }

    /// Decodes the snapshot transfer framing: `$<len>\r\n` followed by exactly
    /// `len` payload bytes and no trailing CRLF.
    pub fn decode_snapshot(input: &[u8]) -> Result<(Bytes, &[u8]), RespError> {
        let Some((&tag, after_tag)) = input.split_first() else {
            return Err(RespError::Incomplete);
        };

        if tag != b'$' {
            return Err(RespError::InvalidSnapshot);
        }

        let (line, rest) = read_line(after_tag)?;
        let length = parse_integer(line)?;
        let length = usize::try_from(length).map_err(|_| RespError::InvalidSnapshot)?;

        if rest.len() < length {
            return Err(RespError::Incomplete);
        }

        Ok((Bytes::copy_from_slice(&rest[..length]), &rest[length..]))
    }

    /// Frames a snapshot payload the way [`RespValue::decode_snapshot`] expects it.
    pub fn encode_snapshot(payload: &[u8], buf: &mut BytesMut) {
        let _ = write!(buf, "${}\r\n", payload.len());
        buf.put_slice(payload);
    }
}

/// Returns how many bytes the value at the front of `input` occupies, without
/// copying any of it. Bulk payloads are skipped by their declared length.
fn scan_value(input: &[u8], depth: usize) -> Result<usize, RespError> {
    let Some((&tag, after_tag)) = input.split_first() else {
        return Err(RespError::Incomplete);
    };

    if !matches!(tag, b'+' | b'-' | b':' | b'$' | b'*') {
        return Err(RespError::UnknownRespType(tag));
    }

    let (line, rest) = read_line(after_tag)?;
    let header = input.len() - rest.len();

    match tag {
        b'$' => {
            let length = parse_integer(line).map_err(|_| RespError::InvalidBulkString)?;

            if length == -1 {
                return Ok(header);
            }

            let length = usize::try_from(length).map_err(|_| RespError::InvalidBulkString)?;

            if rest.len() < length.saturating_add(CRLF.len()) {
                return Err(RespError::Incomplete);
            }

            if &rest[length..length + CRLF.len()] != CRLF {
                return Err(RespError::InvalidBulkString);
            }

            Ok(header + length + CRLF.len())
        }
        b'*' => {
            let length = parse_integer(line).map_err(|_| RespError::InvalidArray)?;
            let length = usize::try_from(length).map_err(|_| RespError::InvalidArray)?;

            if length > 0 && depth >= MAX_NESTING_DEPTH {
                return Err(RespError::NestingTooDeep);
            }

            let mut consumed = header;
            for _ in 0..length {
                consumed += scan_value(&input[consumed..], depth + 1)?;
            }

            Ok(consumed)
        }
        _ => Ok(header),
    }
}

/// Builds the value at the front of `input`. Only called on a slice that
/// [`scan_value`] has already measured, which also bounds the recursion.
fn decode_value(input: &[u8]) -> Result<(RespValue, &[u8]), RespError> {
    let Some((&tag, after_tag)) = input.split_first() else {
        return Err(RespError::Incomplete);
    };

    match tag {
        b'+' => {
            let (line, rest) = read_line(after_tag)?;
            Ok((RespValue::SimpleString(utf8(line)?), rest))
        }
        b'-' => {
            let (line, rest) = read_line(after_tag)?;
            Ok((RespValue::Error(utf8(line)?), rest))
        }
        b':' => {
            let (line, rest) = read_line(after_tag)?;
            Ok((RespValue::Integer(parse_integer(line)?), rest))
        }
        b'$' => {
            let (line, rest) = read_line(after_tag)?;
            let length = parse_integer(line).map_err(|_| RespError::InvalidBulkString)?;

            if length == -1 {
                return Ok((RespValue::NullBulkString, rest));
            }

            let length = usize::try_from(length).map_err(|_| RespError::InvalidBulkString)?;

            if rest.len() < length + CRLF.len() {
                return Err(RespError::Incomplete);
            }

            if &rest[length..length + CRLF.len()] != CRLF {
                return Err(RespError::InvalidBulkString);
            }

            let data = Bytes::copy_from_slice(&rest[..length]);
            Ok((RespValue::BulkString(data), &rest[length + CRLF.len()..]))
        }
        b'*' => {
            let (line, mut rest) = read_line(after_tag)?;
            let length = parse_integer(line).map_err(|_| RespError::InvalidArray)?;
            let length = usize::try_from(length).map_err(|_| RespError::InvalidArray)?;

            let mut elements = Vec::with_capacity(length.min(1024));
            for _ in 0..length {
                let (element, next) = decode_value(rest)?;
                elements.push(element);
                rest = next;
            }

            Ok((RespValue::Array(elements), rest))
        }
        other => Err(RespError::UnknownRespType(other)),
    }
}

/// Splits off everything up to the first CRLF.
fn read_line(input: &[u8]) -> Result<(&[u8], &[u8]), RespError> {
    match input.windows(2).position(|window| window == CRLF) {
        Some(pos) => Ok((&input[..pos], &input[pos + CRLF.len()..])),
        None => Err(RespError::Incomplete),
    }
}

fn parse_integer(line: &[u8]) -> Result<i64, RespError> {
    std::str::from_utf8(line)
        .map_err(|_| RespError::InvalidInteger)?
        .parse::<i64>()
        .map_err(|_| RespError::InvalidInteger)
}

fn utf8(line: &[u8]) -> Result<String, RespError> {
    String::from_utf8(line.to_vec()).map_err(|_| RespError::InvalidUtf8)
}
