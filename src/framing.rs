//! Length-prefix framing for the "framed" session variants.
//!
//! Each frame is a 32-bit big-endian length followed by that many payload
//! bytes. The buffer accumulates partial reads in a single `BytesMut` and
//! extracts complete payloads with a two-state machine:
//! - `WaitingForLength`: need 4 bytes
//! - `WaitingForPayload`: length parsed, need N more payload bytes
//!
//! This layer is mechanical and knows nothing about the Thrift bytes it
//! carries.
//!
//! # Example
//!
//! ```
//! use termwire::framing::{frame, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! let wire = frame(b"hello").unwrap();
//! let payloads = buffer.push(&wire).unwrap();
//! assert_eq!(&payloads[0][..], b"hello");
//! ```

use bytes::{Bytes, BytesMut};

use crate::error::{Result, TermwireError};

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum frame payload size (64 MB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for the complete 4-byte length prefix.
    WaitingForLength,
    /// Length parsed, waiting for payload bytes.
    WaitingForPayload { remaining: usize },
}

/// Buffer accumulating incoming bytes and extracting complete frame
/// payloads.
pub struct FrameBuffer {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_frame_size: u32,
}

impl FrameBuffer {
    /// Create a frame buffer with the default maximum frame size.
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a frame buffer with a custom maximum frame size.
    pub fn with_max_frame(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::WaitingForLength,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete frame payloads.
    ///
    /// Partial data is buffered for the next push.
    ///
    /// # Errors
    ///
    /// Fails if a frame declares a negative length or one exceeding the
    /// configured maximum.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut payloads = Vec::new();
        while let Some(payload) = self.try_extract_one()? {
            payloads.push(payload);
        }
        Ok(payloads)
    }

    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        match self.state {
            State::WaitingForLength => {
                if self.buffer.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }
                let len = i32::from_be_bytes([
                    self.buffer[0],
                    self.buffer[1],
                    self.buffer[2],
                    self.buffer[3],
                ]);
                if len < 0 {
                    return Err(TermwireError::Frame(format!("negative frame length {len}")));
                }
                if len as u32 > self.max_frame_size {
                    return Err(TermwireError::Frame(format!(
                        "frame length {len} exceeds maximum {}",
                        self.max_frame_size
                    )));
                }
                let _ = self.buffer.split_to(LENGTH_PREFIX_SIZE);
                self.state = State::WaitingForPayload {
                    remaining: len as usize,
                };
                self.try_extract_one()
            }

            State::WaitingForPayload { remaining } => {
                if self.buffer.len() < remaining {
                    return Ok(None);
                }
                let payload = self.buffer.split_to(remaining).freeze();
                self.state = State::WaitingForLength;
                Ok(Some(payload))
            }
        }
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForLength;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefix a payload with its 32-bit big-endian length.
///
/// # Errors
///
/// Fails if the payload length exceeds `i32::MAX`.
pub fn frame(payload: &[u8]) -> Result<Vec<u8>> {
    let len = i32::try_from(payload.len()).map_err(|_| TermwireError::TooLong {
        what: "frame",
        len: payload.len(),
    })?;
    let mut out = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}
