//! Buffered frame reading from network streams.
//!
//! [`FrameReader`] owns the read half of a connection plus a growable buffer.
//! Frames are carved from the buffer with the RESP decoder one at a time, so
//! pipelined commands sharing a read and frames split across reads are both
//! handled; any incomplete tail stays buffered until the next read.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::resp::{Decoded, RespError, RespValue};

const READ_CHUNK_SIZE: usize = 4096;

/// Errors that can occur while reading frames from a network stream.
#[derive(Error, Debug)]
pub enum CommandReadError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("RESP parse error: {0}")]
    RespParseError(#[from] RespError),
}

/// One decoded value together with its size on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub value: RespValue,
    pub length: usize,
}

#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    buffer: BytesMut,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    /// Bytes received but not yet consumed as a frame.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Reads until one complete frame is available and returns it.
    ///
    /// Returns [`CommandReadError::ConnectionClosed`] when the peer closes the
    /// stream. Cancel safe: partially received frames stay in the buffer.
    pub async fn read_frame(&mut self) -> Result<Frame, CommandReadError> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(frame);
            }

            self.fill_buffer().await?;
        }
    }

    /// Reads the snapshot sent after `FULLRESYNC` and returns its payload.
    /// Whatever follows the payload stays buffered for [`FrameReader::read_frame`].
    pub async fn read_snapshot(&mut self) -> Result<Bytes, CommandReadError> {
        loop {
            match RespValue::decode_snapshot(&self.buffer) {
                Ok((payload, rest)) => {
                    let consumed = self.buffer.len() - rest.len();
                    self.buffer.advance(consumed);
                    return Ok(payload);
                }
                Err(e) if e.is_incomplete() => self.fill_buffer().await?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn parse_frame(&mut self) -> Result<Option<Frame>, CommandReadError> {
        match RespValue::decode(&self.buffer) {
            Ok(Decoded::Value(value, rest)) => {
                let length = self.buffer.len() - rest.len();
                self.buffer.advance(length);
                Ok(Some(Frame { value, length }))
            }
            Ok(Decoded::Opaque) => {
                debug!(bytes = self.buffer.len(), "discarding opaque snapshot data");
                self.buffer.clear();
                Ok(None)
            }
            Ok(Decoded::Empty) => Ok(None),
            Err(e) if e.is_incomplete() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn fill_buffer(&mut self) -> Result<(), CommandReadError> {
        if self.buffer.capacity() - self.buffer.len() < READ_CHUNK_SIZE / 4 {
            self.buffer.reserve(READ_CHUNK_SIZE);
        }

        let number_of_bytes = self.reader.read_buf(&mut self.buffer).await?;

        if number_of_bytes == 0 {
            if !self.buffer.is_empty() {
                debug!(
                    bytes = self.buffer.len(),
                    "connection closed with a partial frame buffered"
                );
            }
            return Err(CommandReadError::ConnectionClosed);
        }

        Ok(())
    }
}
