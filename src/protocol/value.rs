//! The in-memory Thrift value tree.
//!
//! A [`Message`] carries a name, kind, sequence id and a [`Struct`] payload.
//! Struct and field names exist only in memory: the wire never carries them
//! for plain Thrift traffic (term-envelope messages are the one exception,
//! see the decoder module). Payload bytes use `bytes::Bytes` for cheap
//! sharing between the decoder and the caller.

use bytes::Bytes;

use super::wire::{MessageType, TType};

/// A top-level protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Method name (may be empty).
    pub name: Bytes,
    /// Message kind.
    pub mtype: MessageType,
    /// Sequence id, signed 32-bit.
    pub seqid: i32,
    /// Payload struct.
    pub payload: Struct,
}

impl Message {
    /// Create a new message.
    pub fn new(name: impl Into<Bytes>, mtype: MessageType, seqid: i32, payload: Struct) -> Self {
        Self {
            name: name.into(),
            mtype,
            seqid,
            payload,
        }
    }

    /// Method name as raw bytes.
    #[inline]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Check if this is a fire-and-forget message.
    #[inline]
    pub fn is_oneway(&self) -> bool {
        self.mtype == MessageType::Oneway
    }
}

/// An ordered field list with an in-memory name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Struct {
    /// Struct name; empty for anonymous structs.
    pub name: Bytes,
    /// Fields in authored order.
    pub fields: Vec<Field>,
}

impl Struct {
    /// Create a named struct.
    pub fn new(name: impl Into<Bytes>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Create an anonymous struct.
    pub fn anonymous(fields: Vec<Field>) -> Self {
        Self {
            name: Bytes::new(),
            fields,
        }
    }

    /// Look up a field by id. First match wins.
    pub fn field(&self, id: i16) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }
}

/// A single struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name; in-memory only, never serialized.
    pub name: Bytes,
    /// Field id, signed 16-bit.
    pub id: i16,
    /// Field payload. The wire type tag is derived from the variant.
    pub value: FieldValue,
}

impl Field {
    /// Create a field with an empty name.
    pub fn new(id: i16, value: FieldValue) -> Self {
        Self {
            name: Bytes::new(),
            id,
            value,
        }
    }

    /// Create a named field.
    pub fn named(name: impl Into<Bytes>, id: i16, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            id,
            value,
        }
    }

    /// The wire type tag of this field's value.
    #[inline]
    pub fn ttype(&self) -> TType {
        self.value.ttype()
    }
}

/// A map with declared key/value element types.
///
/// Entries are an ordered sequence; the codec neither sorts nor
/// deduplicates them.
#[derive(Debug, Clone, PartialEq)]
pub struct MapValue {
    /// Declared key type.
    pub key_type: TType,
    /// Declared value type.
    pub value_type: TType,
    /// Entries in authored order.
    pub entries: Vec<(FieldValue, FieldValue)>,
}

impl MapValue {
    /// Create a map value.
    pub fn new(key_type: TType, value_type: TType, entries: Vec<(FieldValue, FieldValue)>) -> Self {
        Self {
            key_type,
            value_type,
            entries,
        }
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An ordered element sequence with a declared element type.
///
/// Used for both LIST and SET payloads; the field's own tag decides which
/// container the wire sees.
#[derive(Debug, Clone, PartialEq)]
pub struct ListValue {
    /// Declared element type.
    pub elem_type: TType,
    /// Elements in authored order.
    pub elems: Vec<FieldValue>,
}

impl ListValue {
    /// Create a list/set payload.
    pub fn new(elem_type: TType, elems: Vec<FieldValue>) -> Self {
        Self { elem_type, elems }
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Check if the sequence is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }
}

/// A field payload.
///
/// `Byte` and `I8` are distinct variants mirroring the two wire tags that
/// share the one-byte encoding: `Byte` is a one-byte opaque datum, `I8` a
/// signed integer.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// No payload.
    Void,
    /// One bool byte.
    Bool(bool),
    /// One opaque byte (wire tag 3).
    Byte(u8),
    /// One signed byte (wire tag 5).
    I8(i8),
    /// Signed 16-bit.
    I16(i16),
    /// Signed 32-bit.
    I32(i32),
    /// Unsigned 64-bit.
    U64(u64),
    /// Signed 64-bit.
    I64(i64),
    /// IEEE-754 double.
    Double(f64),
    /// Opaque byte string.
    Binary(Bytes),
    /// Nested struct.
    Struct(Struct),
    /// Map container.
    Map(MapValue),
    /// Set container.
    Set(ListValue),
    /// List container.
    List(ListValue),
}

impl FieldValue {
    /// The wire type tag for this value.
    pub fn ttype(&self) -> TType {
        match self {
            FieldValue::Void => TType::Void,
            FieldValue::Bool(_) => TType::Bool,
            FieldValue::Byte(_) => TType::Byte,
            FieldValue::I8(_) => TType::I8,
            FieldValue::I16(_) => TType::I16,
            FieldValue::I32(_) => TType::I32,
            FieldValue::U64(_) => TType::U64,
            FieldValue::I64(_) => TType::I64,
            FieldValue::Double(_) => TType::Double,
            FieldValue::Binary(_) => TType::Binary,
            FieldValue::Struct(_) => TType::Struct,
            FieldValue::Map(_) => TType::Map,
            FieldValue::Set(_) => TType::Set,
            FieldValue::List(_) => TType::List,
        }
    }

    /// Borrow the nested struct, if this is a struct value.
    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            FieldValue::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the byte string, if this is a binary value.
    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            FieldValue::Binary(b) => Some(b),
            _ => None,
        }
    }
}
