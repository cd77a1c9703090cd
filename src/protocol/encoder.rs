//! Thrift value encoder.
//!
//! Encoding is not resumable: it runs to completion into a single buffer or
//! fails. Output bytes are the strict pre-order traversal of the value tree.
//!
//! The header form is chosen by the caller: supplying a [`Version`] emits the
//! versioned `0x8001` word, otherwise the legacy name-first layout is used.
//! Messages named [`TERM_ENVELOPE_NAME`] have their struct bodies written in
//! named mode (an i32-length-prefixed struct name before each field list) so
//! the term embedding stays self-describing; everything else is plain
//! Thrift Binary Protocol.

use bytes::{Bytes, BytesMut};

use super::value::{FieldValue, ListValue, MapValue, Message, Struct};
use super::wire::{
    self, TType, Version, TERM_ENVELOPE_NAME, VERSION_1,
};
use crate::error::{Result, TermwireError};

/// Encode a complete message.
///
/// # Example
///
/// ```
/// use termwire::protocol::{encode_message, Message, MessageType, Struct};
///
/// let msg = Message::new("", MessageType::Call, 1, Struct::default());
/// let bytes = encode_message(&msg, None).unwrap();
/// assert_eq!(&bytes[..], &[0, 0, 0, 0, 1, 0, 0, 0, 1, 0]);
/// ```
///
/// # Errors
///
/// Fails on container element type mismatches and on lengths exceeding the
/// wire's i32 prefix.
pub fn encode_message(msg: &Message, version: Option<Version>) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(64);
    match version {
        Some(Version::Binary1) => {
            wire::put_u32(&mut buf, VERSION_1 | u32::from(msg.mtype.to_wire()));
            wire::put_binary(&mut buf, &msg.name)?;
            wire::put_i32(&mut buf, msg.seqid);
        }
        None => {
            wire::put_binary(&mut buf, &msg.name)?;
            wire::put_i8(&mut buf, msg.mtype.to_wire() as i8);
            wire::put_i32(&mut buf, msg.seqid);
        }
    }
    let named = msg.name.as_ref() == TERM_ENVELOPE_NAME;
    encode_struct(&mut buf, &msg.payload, named)?;
    Ok(buf.freeze())
}

/// Encode a bare struct body (no message header).
///
/// `named` selects the term-envelope body form with the length-prefixed
/// struct name.
pub fn encode_struct(buf: &mut BytesMut, s: &Struct, named: bool) -> Result<()> {
    if named {
        wire::put_binary(buf, &s.name)?;
    }
    for field in &s.fields {
        buf.extend_from_slice(&[field.ttype().to_wire()]);
        wire::put_i16(buf, field.id);
        encode_value(buf, &field.value, named)?;
    }
    buf.extend_from_slice(&[TType::Stop.to_wire()]);
    Ok(())
}

fn encode_value(buf: &mut BytesMut, value: &FieldValue, named: bool) -> Result<()> {
    match value {
        FieldValue::Void => {}
        FieldValue::Bool(b) => wire::put_bool(buf, *b),
        FieldValue::Byte(b) => buf.extend_from_slice(&[*b]),
        FieldValue::I8(n) => wire::put_i8(buf, *n),
        FieldValue::I16(n) => wire::put_i16(buf, *n),
        FieldValue::I32(n) => wire::put_i32(buf, *n),
        FieldValue::U64(n) => wire::put_u64(buf, *n),
        FieldValue::I64(n) => wire::put_i64(buf, *n),
        FieldValue::Double(x) => wire::put_double(buf, *x),
        FieldValue::Binary(b) => wire::put_binary(buf, b)?,
        FieldValue::Struct(s) => encode_struct(buf, s, named)?,
        FieldValue::Map(map) => encode_map(buf, map, named)?,
        FieldValue::Set(set) => encode_sequence(buf, set, "set-elem", named)?,
        FieldValue::List(list) => encode_sequence(buf, list, "list-elem", named)?,
    }
    Ok(())
}

fn encode_map(buf: &mut BytesMut, map: &MapValue, named: bool) -> Result<()> {
    let size = container_size(map.len(), "map")?;
    buf.extend_from_slice(&[map.key_type.to_wire(), map.value_type.to_wire()]);
    wire::put_i32(buf, size);
    for (key, value) in &map.entries {
        conforms(key, map.key_type, "map-key")?;
        conforms(value, map.value_type, "map-value")?;
        encode_value(buf, key, named)?;
        encode_value(buf, value, named)?;
    }
    Ok(())
}

fn encode_sequence(
    buf: &mut BytesMut,
    seq: &ListValue,
    ctx: &'static str,
    named: bool,
) -> Result<()> {
    let size = container_size(seq.len(), ctx)?;
    buf.extend_from_slice(&[seq.elem_type.to_wire()]);
    wire::put_i32(buf, size);
    for elem in &seq.elems {
        conforms(elem, seq.elem_type, ctx)?;
        encode_value(buf, elem, named)?;
    }
    Ok(())
}

fn container_size(len: usize, what: &'static str) -> Result<i32> {
    i32::try_from(len).map_err(|_| TermwireError::TooLong { what, len })
}

fn conforms(value: &FieldValue, declared: TType, ctx: &'static str) -> Result<()> {
    let found = value.ttype();
    if found != declared {
        return Err(TermwireError::TypeMismatch {
            ctx,
            expected: declared,
            found,
        });
    }
    Ok(())
}
