//! Wire-level constants and the primitive codec.
//!
//! Implements the Thrift Binary Protocol scalar layer. All multi-byte
//! integers are Big Endian. Message headers come in two forms:
//!
//! ```text
//! versioned:  ┌────────────────┬──────────┬───────────┬──────────┬─────────┐
//!             │ 0x8001__TT u32 │ i32 nlen │ name      │ i32 seqid│ struct  │
//!             └────────────────┴──────────┴───────────┴──────────┴─────────┘
//! legacy:     ┌──────────┬───────────┬─────────┬──────────┬─────────┐
//!             │ i32 nlen │ name      │ i8 type │ i32 seqid│ struct  │
//!             └──────────┴───────────┴─────────┴──────────┴─────────┘
//! ```
//!
//! The `put_*` functions append encoded scalars to a [`BytesMut`]. The
//! `take_*` functions are the resumable decoders: they consume from an
//! accumulation buffer and return `None` while the buffer does not yet hold
//! the complete scalar, so a resumed call simply re-attempts the same read
//! once more bytes have been appended.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{DecodeStage, Result, TermwireError};

/// High 16 bits of the first word of a versioned message header.
pub const VERSION_1_HIGH: u16 = 0x8001;

/// Mask selecting the version half of the first header word.
pub const VERSION_MASK: u32 = 0xffff_0000;

/// Full versioned header word with a zero type byte.
pub const VERSION_1: u32 = (VERSION_1_HIGH as u32) << 16;

/// Message name that marks a term-bridge envelope.
///
/// Messages bearing this name carry a term encoded as sentinel structs, and
/// their struct bodies are written in named mode (an i32-length-prefixed
/// struct name precedes each field list).
pub const TERM_ENVELOPE_NAME: &[u8] = b"$UBF";

/// Default maximum nesting depth for decoded containers.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default maximum declared size of a single map/set/list.
pub const DEFAULT_MAX_CONTAINER: i32 = 16 * 1024 * 1024;

/// Default maximum length of a single binary or name, in bytes (256 MB).
pub const DEFAULT_MAX_BINARY: i32 = 256 * 1024 * 1024;

/// Protocol version emitted by a versioned encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// Thrift Binary Protocol version 1 (`0x8001` header).
    Binary1,
}

/// Message kind carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Request expecting a reply.
    Call = 1,
    /// Reply to a call.
    Reply = 2,
    /// Exception reply.
    Exception = 3,
    /// Fire-and-forget request.
    Oneway = 4,
}

impl MessageType {
    /// Decode a message-type byte. Returns `None` for unknown values.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MessageType::Call),
            2 => Some(MessageType::Reply),
            3 => Some(MessageType::Exception),
            4 => Some(MessageType::Oneway),
            _ => None,
        }
    }

    /// The wire byte for this message type.
    #[inline]
    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

/// Field type tags.
///
/// `Byte` (3) and `I8` (5) are distinct tags with identical wire width: a
/// value read through tag 3 surfaces as a one-byte opaque datum, through
/// tag 5 as a signed integer. Tag 7 is unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TType {
    /// Terminates a field list.
    Stop = 0,
    /// No payload.
    Void = 1,
    /// One byte, `0x00` or `0x01`.
    Bool = 2,
    /// One opaque byte.
    Byte = 3,
    /// IEEE-754 64-bit, big-endian.
    Double = 4,
    /// One signed byte.
    I8 = 5,
    /// Two bytes signed.
    I16 = 6,
    /// Four bytes signed.
    I32 = 8,
    /// Eight bytes unsigned.
    U64 = 9,
    /// Eight bytes signed.
    I64 = 10,
    /// i32 length prefix + bytes.
    Binary = 11,
    /// Nested field list.
    Struct = 12,
    /// Key/value element types + i32 size + entries.
    Map = 13,
    /// Element type + i32 size + elements.
    Set = 14,
    /// Element type + i32 size + elements.
    List = 15,
}

impl TType {
    /// Decode a type-tag byte. Returns `None` for unknown tags.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(TType::Stop),
            1 => Some(TType::Void),
            2 => Some(TType::Bool),
            3 => Some(TType::Byte),
            4 => Some(TType::Double),
            5 => Some(TType::I8),
            6 => Some(TType::I16),
            8 => Some(TType::I32),
            9 => Some(TType::U64),
            10 => Some(TType::I64),
            11 => Some(TType::Binary),
            12 => Some(TType::Struct),
            13 => Some(TType::Map),
            14 => Some(TType::Set),
            15 => Some(TType::List),
            _ => None,
        }
    }

    /// The wire byte for this tag.
    #[inline]
    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Encoding primitives
// ---------------------------------------------------------------------------

/// Append a bool as one byte, `0x00` or `0x01`.
#[inline]
pub fn put_bool(buf: &mut BytesMut, b: bool) {
    buf.extend_from_slice(&[u8::from(b)]);
}

/// Append a signed byte.
#[inline]
pub fn put_i8(buf: &mut BytesMut, n: i8) {
    buf.extend_from_slice(&n.to_be_bytes());
}

/// Append a signed 16-bit integer, big-endian.
#[inline]
pub fn put_i16(buf: &mut BytesMut, n: i16) {
    buf.extend_from_slice(&n.to_be_bytes());
}

/// Append a signed 32-bit integer, big-endian.
#[inline]
pub fn put_i32(buf: &mut BytesMut, n: i32) {
    buf.extend_from_slice(&n.to_be_bytes());
}

/// Append a signed 64-bit integer, big-endian.
#[inline]
pub fn put_i64(buf: &mut BytesMut, n: i64) {
    buf.extend_from_slice(&n.to_be_bytes());
}

/// Append an unsigned 32-bit integer, big-endian.
#[inline]
pub fn put_u32(buf: &mut BytesMut, n: u32) {
    buf.extend_from_slice(&n.to_be_bytes());
}

/// Append an unsigned 64-bit integer, big-endian.
#[inline]
pub fn put_u64(buf: &mut BytesMut, n: u64) {
    buf.extend_from_slice(&n.to_be_bytes());
}

/// Append an IEEE-754 double, big-endian.
#[inline]
pub fn put_double(buf: &mut BytesMut, x: f64) {
    buf.extend_from_slice(&x.to_bits().to_be_bytes());
}

/// Append an i32 length prefix followed by the bytes.
///
/// # Errors
///
/// Fails if the length exceeds `i32::MAX`.
pub fn put_binary(buf: &mut BytesMut, bytes: &[u8]) -> Result<()> {
    let len = i32::try_from(bytes.len()).map_err(|_| TermwireError::TooLong {
        what: "binary",
        len: bytes.len(),
    })?;
    put_i32(buf, len);
    buf.extend_from_slice(bytes);
    Ok(())
}

// ---------------------------------------------------------------------------
// Resumable decoding primitives
// ---------------------------------------------------------------------------

/// Take one byte, or `None` if the buffer is empty.
#[inline]
pub fn take_u8(buf: &mut BytesMut) -> Option<u8> {
    if buf.is_empty() {
        return None;
    }
    Some(buf.get_u8())
}

/// Take a big-endian i16, or `None` if fewer than 2 bytes are buffered.
#[inline]
pub fn take_i16(buf: &mut BytesMut) -> Option<i16> {
    if buf.len() < 2 {
        return None;
    }
    Some(buf.get_i16())
}

/// Take a big-endian i32, or `None` if fewer than 4 bytes are buffered.
#[inline]
pub fn take_i32(buf: &mut BytesMut) -> Option<i32> {
    if buf.len() < 4 {
        return None;
    }
    Some(buf.get_i32())
}

/// Take a big-endian i64, or `None` if fewer than 8 bytes are buffered.
#[inline]
pub fn take_i64(buf: &mut BytesMut) -> Option<i64> {
    if buf.len() < 8 {
        return None;
    }
    Some(buf.get_i64())
}

/// Take a big-endian u32, or `None` if fewer than 4 bytes are buffered.
#[inline]
pub fn take_u32(buf: &mut BytesMut) -> Option<u32> {
    if buf.len() < 4 {
        return None;
    }
    Some(buf.get_u32())
}

/// Take a big-endian u64, or `None` if fewer than 8 bytes are buffered.
#[inline]
pub fn take_u64(buf: &mut BytesMut) -> Option<u64> {
    if buf.len() < 8 {
        return None;
    }
    Some(buf.get_u64())
}

/// Take a big-endian IEEE-754 double, or `None` if fewer than 8 bytes are
/// buffered.
#[inline]
pub fn take_double(buf: &mut BytesMut) -> Option<f64> {
    if buf.len() < 8 {
        return None;
    }
    Some(f64::from_bits(buf.get_u64()))
}

/// Take a bool byte, validating it is `0x00` or `0x01`.
///
/// Returns `Ok(None)` if the buffer is empty.
///
/// # Errors
///
/// Fails with a `bool/value` decode error on any other byte.
pub fn take_bool(buf: &mut BytesMut, depth: usize) -> Result<Option<bool>> {
    let Some(byte) = take_u8(buf) else {
        return Ok(None);
    };
    match byte {
        0 => Ok(Some(false)),
        1 => Ok(Some(true)),
        other => Err(TermwireError::Decode {
            stage: DecodeStage::Bool,
            field: "value",
            value: i64::from(other),
            depth,
        }),
    }
}

/// Take exactly `n` bytes as a zero-copy [`Bytes`], or `None` if fewer are
/// buffered.
#[inline]
pub fn take_bytes(buf: &mut BytesMut, n: usize) -> Option<Bytes> {
    if buf.len() < n {
        return None;
    }
    Some(buf.split_to(n).freeze())
}
