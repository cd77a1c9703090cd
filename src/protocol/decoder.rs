//! Resumable Thrift message decoder.
//!
//! The decoder is a pushdown state machine over an accumulation buffer:
//! incoming bytes are appended to a `BytesMut`, and each step consumes one
//! atomic wire item (a scalar, a tag, a length, a byte-string body) only once
//! the buffer holds it completely. When input runs out mid-construct the
//! decoder returns [`Outcome::More`]; the [`Decoder`] itself is the
//! continuation and is resumed by calling [`Decoder::feed`] again. Partial
//! parent constructs (an open struct, a map with entries outstanding, a
//! half-read map entry) live on an explicit heap-allocated frame stack, so
//! wire depth never consumes host stack.
//!
//! Splitting the input at arbitrary byte boundaries never changes the
//! result: feeding chunks one at a time is equivalent to feeding their
//! concatenation (the accumulation buffer makes this structural).
//!
//! Errors are sticky. After any decode error the continuation is poisoned
//! and every further [`Decoder::feed`] fails with
//! [`TermwireError::Poisoned`]; callers discard it.
//!
//! # Example
//!
//! ```
//! use termwire::protocol::{decode_init, Outcome};
//!
//! let bytes = [0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00];
//! let mut decoder = decode_init(false, &bytes[..3]);
//! assert!(matches!(decoder.feed(&[]).unwrap(), Outcome::More));
//! match decoder.feed(&bytes[3..]).unwrap() {
//!     Outcome::Done { message, .. } => assert_eq!(message.seqid, 1),
//!     Outcome::More => unreachable!(),
//! }
//! ```

use bytes::{Buf, Bytes, BytesMut};

use super::value::{Field, FieldValue, ListValue, MapValue, Message, Struct};
use super::wire::{
    self, MessageType, TType, Version, DEFAULT_MAX_BINARY, DEFAULT_MAX_CONTAINER,
    DEFAULT_MAX_DEPTH, TERM_ENVELOPE_NAME, VERSION_1_HIGH, VERSION_MASK,
};
use crate::error::{DecodeStage, Result, TermwireError};

/// Resource limits enforced while decoding adversarial input.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum container nesting depth.
    pub max_depth: usize,
    /// Maximum declared size of a single map/set/list.
    pub max_container: i32,
    /// Maximum length of a single binary or name.
    pub max_binary: i32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_container: DEFAULT_MAX_CONTAINER,
            max_binary: DEFAULT_MAX_BINARY,
        }
    }
}

/// Result of feeding bytes to a [`Decoder`].
#[derive(Debug)]
pub enum Outcome {
    /// One complete message was decoded. `remainder` holds every byte that
    /// trailed it, verbatim; `version` reports the header form encountered.
    Done {
        /// The decoded message.
        message: Message,
        /// Unconsumed trailing bytes.
        remainder: Bytes,
        /// `Some` for a versioned header, `None` for legacy.
        version: Option<Version>,
    },
    /// Input exhausted mid-construct; feed more bytes to resume.
    More,
}

/// Decoded message header, pending its payload struct.
#[derive(Debug)]
struct Header {
    name: Bytes,
    mtype: MessageType,
    seqid: i32,
    version: Option<Version>,
}

/// Current atomic read.
///
/// Every variant is `Copy`: byte strings in flight are consumed directly
/// from the buffer once complete, and decoded names/values are stored on the
/// decoder or the frame stack, never in the state.
#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /// Sniffing the first 32-bit word (versioned vs legacy).
    MsgStart,
    /// Reading the i32 message-name length.
    MsgNameLen,
    /// Reading the message-name bytes.
    MsgNameBytes { needed: usize },
    /// Legacy form: reading the message-type byte after the name.
    MsgTypeByte,
    /// Reading the i32 sequence id.
    MsgSeqid,
    /// Named mode: reading the i32 struct-name length.
    StructNameLen,
    /// Named mode: reading the struct-name bytes.
    StructNameBytes { needed: usize },
    /// Reading the next field's type tag (or STOP).
    FieldTag,
    /// Reading the i16 field id.
    FieldId { ttype: TType },
    /// Reading a value of the given type.
    Value { ttype: TType },
    /// Reading the body of a length-prefixed byte string.
    BinaryBody { needed: usize },
    /// Poisoned by a previous error.
    Failed,
}

/// A partial parent construct awaiting children.
#[derive(Debug)]
enum Frame {
    Struct {
        name: Bytes,
        fields: Vec<Field>,
        pending_id: Option<i16>,
    },
    Map {
        key_type: TType,
        value_type: TType,
        remaining: i32,
        entries: Vec<(FieldValue, FieldValue)>,
        pending_key: Option<FieldValue>,
    },
    List {
        elem_type: TType,
        remaining: i32,
        elems: Vec<FieldValue>,
    },
    Set {
        elem_type: TType,
        remaining: i32,
        elems: Vec<FieldValue>,
    },
}

enum Step {
    Continue,
    NeedMore,
    Done(Message, Option<Version>),
}

/// Resumable message decoder; the value itself is the continuation.
///
/// A `Decoder` is single-owner: resume it from one place at a time. After
/// [`Outcome::Done`] it resets and may decode the next message (feed the
/// returned remainder back in).
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    state: State,
    stack: Vec<Frame>,
    header: Option<Header>,
    /// Set once the message name is known; `$UBF` payload structs carry
    /// their names on the wire.
    named_structs: bool,
    safe: bool,
    limits: Limits,
}

/// Create a continuation primed with `initial_bytes`.
///
/// `safe` is carried through to the term bridge: safe-mode decoding refuses
/// to create previously-unknown atom names.
pub fn decode_init(safe: bool, initial_bytes: &[u8]) -> Decoder {
    let mut decoder = Decoder::new(safe);
    decoder.buf.extend_from_slice(initial_bytes);
    decoder
}

/// Single-shot decode of a byte buffer (non-safe mode).
pub fn decode(bytes: &[u8]) -> Result<Outcome> {
    Decoder::new(false).feed(bytes)
}

impl Decoder {
    /// Create an empty decoder with default limits.
    pub fn new(safe: bool) -> Self {
        Self::with_limits(safe, Limits::default())
    }

    /// Create an empty decoder with explicit resource limits.
    pub fn with_limits(safe: bool, limits: Limits) -> Self {
        Self {
            buf: BytesMut::with_capacity(4 * 1024),
            state: State::MsgStart,
            stack: Vec::new(),
            header: None,
            named_structs: false,
            safe,
            limits,
        }
    }

    /// Whether this continuation was created in safe mode.
    #[inline]
    pub fn safe(&self) -> bool {
        self.safe
    }

    /// Whether a previous error poisoned this continuation.
    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.state == State::Failed
    }

    /// Number of buffered, not-yet-consumed bytes.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Append `bytes` and drive the machine until a message completes, input
    /// runs out, or the input is rejected.
    ///
    /// # Errors
    ///
    /// Malformed input fails with a [`TermwireError::Decode`] carrying the
    /// stage, field, offending value, and depth snapshot; the decoder is
    /// then poisoned and every later call fails with
    /// [`TermwireError::Poisoned`].
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Outcome> {
        if self.state == State::Failed {
            return Err(TermwireError::Poisoned);
        }
        self.buf.extend_from_slice(bytes);
        match self.run() {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.state = State::Failed;
                Err(err)
            }
        }
    }

    fn run(&mut self) -> Result<Outcome> {
        loop {
            match self.step()? {
                Step::Continue => {}
                Step::NeedMore => return Ok(Outcome::More),
                Step::Done(message, version) => {
                    let remainder = self.buf.split().freeze();
                    self.reset();
                    return Ok(Outcome::Done {
                        message,
                        remainder,
                        version,
                    });
                }
            }
        }
    }

    fn reset(&mut self) {
        self.state = State::MsgStart;
        self.stack.clear();
        self.header = None;
        self.named_structs = false;
    }

    fn step(&mut self) -> Result<Step> {
        match self.state {
            State::MsgStart => self.step_msg_start(),
            State::MsgNameLen => self.step_msg_name_len(),
            State::MsgNameBytes { needed } => self.step_msg_name_bytes(needed),
            State::MsgTypeByte => self.step_msg_type_byte(),
            State::MsgSeqid => self.step_msg_seqid(),
            State::StructNameLen => self.step_struct_name_len(),
            State::StructNameBytes { needed } => self.step_struct_name_bytes(needed),
            State::FieldTag => self.step_field_tag(),
            State::FieldId { ttype } => self.step_field_id(ttype),
            State::Value { ttype } => self.step_value(ttype),
            State::BinaryBody { needed } => self.step_binary_body(needed),
            State::Failed => Err(TermwireError::Poisoned),
        }
    }

    /// Branch on the first 32-bit word. The high 16 bits equalling `0x8001`
    /// are the only reliable discriminator between the versioned and legacy
    /// forms; the legacy interpretation treats the word as a name length.
    fn step_msg_start(&mut self) -> Result<Step> {
        if self.buf.len() < 4 {
            return Ok(Step::NeedMore);
        }
        let word = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        if (word & VERSION_MASK) >> 16 == u32::from(VERSION_1_HIGH) {
            let type_byte = (word & 0xFF) as u8;
            let mtype = MessageType::from_wire(type_byte).ok_or(TermwireError::Decode {
                stage: DecodeStage::Message,
                field: "message-type",
                value: i64::from(type_byte),
                depth: 0,
            })?;
            self.buf.advance(4);
            self.header = Some(Header {
                name: Bytes::new(),
                mtype,
                seqid: 0,
                version: Some(Version::Binary1),
            });
        } else {
            // Legacy: the word is the i32 name length, re-read below.
            self.header = Some(Header {
                name: Bytes::new(),
                mtype: MessageType::Call,
                seqid: 0,
                version: None,
            });
        }
        self.state = State::MsgNameLen;
        Ok(Step::Continue)
    }

    fn step_msg_name_len(&mut self) -> Result<Step> {
        let Some(len) = wire::take_i32(&mut self.buf) else {
            return Ok(Step::NeedMore);
        };
        self.check_len(len, DecodeStage::Message, "method-name")?;
        self.state = State::MsgNameBytes {
            needed: len as usize,
        };
        Ok(Step::Continue)
    }

    fn step_msg_name_bytes(&mut self, needed: usize) -> Result<Step> {
        let Some(name) = wire::take_bytes(&mut self.buf, needed) else {
            return Ok(Step::NeedMore);
        };
        let header = self.header.as_mut().expect("header present after MsgStart");
        header.name = name;
        self.state = if header.version.is_some() {
            State::MsgSeqid
        } else {
            State::MsgTypeByte
        };
        Ok(Step::Continue)
    }

    fn step_msg_type_byte(&mut self) -> Result<Step> {
        let Some(byte) = wire::take_u8(&mut self.buf) else {
            return Ok(Step::NeedMore);
        };
        let mtype = MessageType::from_wire(byte).ok_or(TermwireError::Decode {
            stage: DecodeStage::Message,
            field: "message-type",
            value: i64::from(byte),
            depth: 0,
        })?;
        self.header.as_mut().expect("header present").mtype = mtype;
        self.state = State::MsgSeqid;
        Ok(Step::Continue)
    }

    fn step_msg_seqid(&mut self) -> Result<Step> {
        let Some(seqid) = wire::take_i32(&mut self.buf) else {
            return Ok(Step::NeedMore);
        };
        let header = self.header.as_mut().expect("header present");
        header.seqid = seqid;
        self.named_structs = header.name.as_ref() == TERM_ENVELOPE_NAME;
        self.enter_struct(DecodeStage::Message)
    }

    fn step_struct_name_len(&mut self) -> Result<Step> {
        let Some(len) = wire::take_i32(&mut self.buf) else {
            return Ok(Step::NeedMore);
        };
        self.check_len(len, DecodeStage::Struct, "name-length")?;
        self.state = State::StructNameBytes {
            needed: len as usize,
        };
        Ok(Step::Continue)
    }

    fn step_struct_name_bytes(&mut self, needed: usize) -> Result<Step> {
        let Some(name) = wire::take_bytes(&mut self.buf, needed) else {
            return Ok(Step::NeedMore);
        };
        match self.stack.last_mut() {
            Some(Frame::Struct { name: slot, .. }) => *slot = name,
            _ => unreachable!("struct-name state implies struct frame"),
        }
        self.state = State::FieldTag;
        Ok(Step::Continue)
    }

    fn step_field_tag(&mut self) -> Result<Step> {
        let Some(tag) = wire::take_u8(&mut self.buf) else {
            return Ok(Step::NeedMore);
        };
        if tag == TType::Stop.to_wire() {
            return self.finish_struct();
        }
        let ttype = TType::from_wire(tag).ok_or(TermwireError::Decode {
            stage: DecodeStage::Fields,
            field: "field-type",
            value: i64::from(tag),
            depth: self.stack.len(),
        })?;
        self.state = State::FieldId { ttype };
        Ok(Step::Continue)
    }

    fn step_field_id(&mut self, ttype: TType) -> Result<Step> {
        let Some(id) = wire::take_i16(&mut self.buf) else {
            return Ok(Step::NeedMore);
        };
        match self.stack.last_mut() {
            Some(Frame::Struct { pending_id, .. }) => *pending_id = Some(id),
            _ => unreachable!("field-id state implies struct frame"),
        }
        self.state = State::Value { ttype };
        Ok(Step::Continue)
    }

    fn step_value(&mut self, ttype: TType) -> Result<Step> {
        let depth = self.stack.len();
        match ttype {
            TType::Stop | TType::Void => self.deliver(FieldValue::Void),
            TType::Bool => match wire::take_bool(&mut self.buf, depth)? {
                Some(b) => self.deliver(FieldValue::Bool(b)),
                None => Ok(Step::NeedMore),
            },
            TType::Byte => match wire::take_u8(&mut self.buf) {
                Some(b) => self.deliver(FieldValue::Byte(b)),
                None => Ok(Step::NeedMore),
            },
            TType::I8 => match wire::take_u8(&mut self.buf) {
                Some(b) => self.deliver(FieldValue::I8(b as i8)),
                None => Ok(Step::NeedMore),
            },
            TType::I16 => match wire::take_i16(&mut self.buf) {
                Some(n) => self.deliver(FieldValue::I16(n)),
                None => Ok(Step::NeedMore),
            },
            TType::I32 => match wire::take_i32(&mut self.buf) {
                Some(n) => self.deliver(FieldValue::I32(n)),
                None => Ok(Step::NeedMore),
            },
            TType::U64 => match wire::take_u64(&mut self.buf) {
                Some(n) => self.deliver(FieldValue::U64(n)),
                None => Ok(Step::NeedMore),
            },
            TType::I64 => match wire::take_i64(&mut self.buf) {
                Some(n) => self.deliver(FieldValue::I64(n)),
                None => Ok(Step::NeedMore),
            },
            TType::Double => match wire::take_double(&mut self.buf) {
                Some(x) => self.deliver(FieldValue::Double(x)),
                None => Ok(Step::NeedMore),
            },
            TType::Binary => {
                let Some(len) = wire::take_i32(&mut self.buf) else {
                    return Ok(Step::NeedMore);
                };
                self.check_len(len, DecodeStage::Binary, "length")?;
                self.state = State::BinaryBody {
                    needed: len as usize,
                };
                Ok(Step::Continue)
            }
            TType::Struct => self.enter_struct(DecodeStage::Struct),
            TType::Map => self.enter_map(),
            TType::List => self.enter_sequence(TType::List),
            TType::Set => self.enter_sequence(TType::Set),
        }
    }

    fn step_binary_body(&mut self, needed: usize) -> Result<Step> {
        let Some(bytes) = wire::take_bytes(&mut self.buf, needed) else {
            return Ok(Step::NeedMore);
        };
        self.deliver(FieldValue::Binary(bytes))
    }

    /// Push an empty struct frame and start on its body.
    fn enter_struct(&mut self, stage: DecodeStage) -> Result<Step> {
        self.push_frame(
            Frame::Struct {
                name: Bytes::new(),
                fields: Vec::new(),
                pending_id: None,
            },
            stage,
        )?;
        self.state = if self.named_structs {
            State::StructNameLen
        } else {
            State::FieldTag
        };
        Ok(Step::Continue)
    }

    /// Consume a 6-byte map header atomically: key type, value type, size.
    fn enter_map(&mut self) -> Result<Step> {
        if self.buf.len() < 6 {
            return Ok(Step::NeedMore);
        }
        let depth = self.stack.len();
        let key_type = self.elem_type(self.buf[0], DecodeStage::Map, "key-type", depth)?;
        let value_type = self.elem_type(self.buf[1], DecodeStage::Map, "value-type", depth)?;
        self.buf.advance(2);
        let size = wire::take_i32(&mut self.buf).expect("length checked");
        self.check_size(size, DecodeStage::Map)?;
        if size == 0 {
            return self.deliver(FieldValue::Map(MapValue::new(key_type, value_type, Vec::new())));
        }
        self.push_frame(
            Frame::Map {
                key_type,
                value_type,
                remaining: size,
                entries: Vec::new(),
                pending_key: None,
            },
            DecodeStage::Map,
        )?;
        self.state = State::Value { ttype: key_type };
        Ok(Step::Continue)
    }

    /// Consume a 5-byte list/set header atomically: element type, size.
    fn enter_sequence(&mut self, container: TType) -> Result<Step> {
        if self.buf.len() < 5 {
            return Ok(Step::NeedMore);
        }
        let stage = if container == TType::List {
            DecodeStage::List
        } else {
            DecodeStage::Set
        };
        let depth = self.stack.len();
        let elem_type = self.elem_type(self.buf[0], stage, "elem-type", depth)?;
        self.buf.advance(1);
        let size = wire::take_i32(&mut self.buf).expect("length checked");
        self.check_size(size, stage)?;
        if size == 0 {
            let empty = ListValue::new(elem_type, Vec::new());
            return self.deliver(if container == TType::List {
                FieldValue::List(empty)
            } else {
                FieldValue::Set(empty)
            });
        }
        let frame = if container == TType::List {
            Frame::List {
                elem_type,
                remaining: size,
                elems: Vec::new(),
            }
        } else {
            Frame::Set {
                elem_type,
                remaining: size,
                elems: Vec::new(),
            }
        };
        self.push_frame(frame, stage)?;
        self.state = State::Value { ttype: elem_type };
        Ok(Step::Continue)
    }

    /// STOP terminated the current struct: fold it into a value.
    fn finish_struct(&mut self) -> Result<Step> {
        match self.stack.pop() {
            Some(Frame::Struct { name, fields, .. }) => {
                self.deliver(FieldValue::Struct(Struct { name, fields }))
            }
            _ => unreachable!("field-tag state implies struct frame"),
        }
    }

    /// Hand a completed value to the innermost open construct, folding and
    /// propagating any containers it completes. Runs as a loop so deeply
    /// nested completions cost no host stack.
    fn deliver(&mut self, value: FieldValue) -> Result<Step> {
        let mut value = value;
        loop {
            let Some(top) = self.stack.last_mut() else {
                return self.complete_message(value);
            };
            match top {
                Frame::Struct {
                    fields, pending_id, ..
                } => {
                    let id = pending_id.take().expect("field id precedes payload");
                    fields.push(Field::new(id, value));
                    self.state = State::FieldTag;
                    return Ok(Step::Continue);
                }
                Frame::Map {
                    key_type,
                    value_type,
                    remaining,
                    entries,
                    pending_key,
                } => {
                    if pending_key.is_none() {
                        *pending_key = Some(value);
                        self.state = State::Value { ttype: *value_type };
                        return Ok(Step::Continue);
                    }
                    let key = pending_key.take().expect("pending key present");
                    entries.push((key, value));
                    *remaining -= 1;
                    if *remaining > 0 {
                        self.state = State::Value { ttype: *key_type };
                        return Ok(Step::Continue);
                    }
                }
                Frame::List {
                    elem_type,
                    remaining,
                    elems,
                } => {
                    elems.push(value);
                    *remaining -= 1;
                    if *remaining > 0 {
                        self.state = State::Value { ttype: *elem_type };
                        return Ok(Step::Continue);
                    }
                }
                Frame::Set {
                    elem_type,
                    remaining,
                    elems,
                } => {
                    elems.push(value);
                    *remaining -= 1;
                    if *remaining > 0 {
                        self.state = State::Value { ttype: *elem_type };
                        return Ok(Step::Continue);
                    }
                }
            }
            // The container on top just filled; fold it and deliver the
            // result to its parent.
            value = match self.stack.pop() {
                Some(Frame::Map {
                    key_type,
                    value_type,
                    entries,
                    ..
                }) => FieldValue::Map(MapValue::new(key_type, value_type, entries)),
                Some(Frame::List {
                    elem_type, elems, ..
                }) => FieldValue::List(ListValue::new(elem_type, elems)),
                Some(Frame::Set {
                    elem_type, elems, ..
                }) => FieldValue::Set(ListValue::new(elem_type, elems)),
                _ => unreachable!("completed frame is a container"),
            };
        }
    }

    fn complete_message(&mut self, value: FieldValue) -> Result<Step> {
        let FieldValue::Struct(payload) = value else {
            unreachable!("root value is the payload struct")
        };
        let header = self.header.take().expect("header decoded before payload");
        let message = Message {
            name: header.name,
            mtype: header.mtype,
            seqid: header.seqid,
            payload,
        };
        Ok(Step::Done(message, header.version))
    }

    fn push_frame(&mut self, frame: Frame, stage: DecodeStage) -> Result<()> {
        if self.stack.len() >= self.limits.max_depth {
            return Err(TermwireError::Decode {
                stage,
                field: "depth",
                value: self.stack.len() as i64,
                depth: self.stack.len(),
            });
        }
        self.stack.push(frame);
        Ok(())
    }

    fn elem_type(
        &self,
        tag: u8,
        stage: DecodeStage,
        field: &'static str,
        depth: usize,
    ) -> Result<TType> {
        TType::from_wire(tag)
            .filter(|t| *t != TType::Stop)
            .ok_or(TermwireError::Decode {
                stage,
                field,
                value: i64::from(tag),
                depth,
            })
    }

    fn check_len(&self, len: i32, stage: DecodeStage, field: &'static str) -> Result<()> {
        if len < 0 || len > self.limits.max_binary {
            return Err(TermwireError::Decode {
                stage,
                field,
                value: i64::from(len),
                depth: self.stack.len(),
            });
        }
        Ok(())
    }

    fn check_size(&self, size: i32, stage: DecodeStage) -> Result<()> {
        if size < 0 || size > self.limits.max_container {
            return Err(TermwireError::Decode {
                stage,
                field: "size",
                value: i64::from(size),
                depth: self.stack.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encoder::encode_message;

    /// Scenario: empty legacy CALL with no fields.
    const EMPTY_CALL: [u8; 10] = [0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00];

    /// Scenario: versioned REPLY with one i32 field (id=1, value=42).
    const VERSIONED_REPLY: [u8; 20] = [
        0x80, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x08, 0x00, 0x01,
        0x00, 0x00, 0x00, 0x2A, 0x00,
    ];

    fn done(outcome: Outcome) -> (Message, Bytes, Option<Version>) {
        match outcome {
            Outcome::Done {
                message,
                remainder,
                version,
            } => (message, remainder, version),
            Outcome::More => panic!("expected Done, got More"),
        }
    }

    #[test]
    fn test_empty_legacy_call() {
        let (msg, rest, version) = done(decode(&EMPTY_CALL).unwrap());
        assert_eq!(msg.name(), b"");
        assert_eq!(msg.mtype, MessageType::Call);
        assert_eq!(msg.seqid, 1);
        assert!(msg.payload.fields.is_empty());
        assert!(rest.is_empty());
        assert_eq!(version, None);
    }

    #[test]
    fn test_versioned_reply_with_i32_field() {
        let (msg, rest, version) = done(decode(&VERSIONED_REPLY).unwrap());
        assert_eq!(msg.mtype, MessageType::Reply);
        assert_eq!(msg.seqid, 7);
        assert_eq!(version, Some(Version::Binary1));
        assert!(rest.is_empty());
        assert_eq!(msg.payload.fields.len(), 1);
        let field = &msg.payload.fields[0];
        assert_eq!(field.id, 1);
        assert_eq!(field.value, FieldValue::I32(42));
    }

    #[test]
    fn test_streaming_fragmentation() {
        // 3 bytes, then 8, then the rest, per the wire scenario.
        let mut decoder = decode_init(false, &VERSIONED_REPLY[..3]);
        assert!(matches!(decoder.feed(&[]).unwrap(), Outcome::More));
        assert!(matches!(
            decoder.feed(&VERSIONED_REPLY[3..11]).unwrap(),
            Outcome::More
        ));
        let (msg, rest, version) = done(decoder.feed(&VERSIONED_REPLY[11..]).unwrap());
        assert_eq!(msg.seqid, 7);
        assert_eq!(msg.payload.fields[0].value, FieldValue::I32(42));
        assert_eq!(version, Some(Version::Binary1));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let bytes = {
            let msg = Message::new(
                "echo",
                MessageType::Call,
                9,
                Struct::anonymous(vec![
                    Field::new(1, FieldValue::Binary(Bytes::from_static(b"payload"))),
                    Field::new(2, FieldValue::I64(-5)),
                ]),
            );
            encode_message(&msg, Some(Version::Binary1)).unwrap()
        };
        let mut decoder = Decoder::new(false);
        for (i, byte) in bytes.iter().enumerate() {
            match decoder.feed(&[*byte]).unwrap() {
                Outcome::More => assert!(i + 1 < bytes.len(), "finished early"),
                Outcome::Done { message, .. } => {
                    assert_eq!(i + 1, bytes.len());
                    assert_eq!(message.name(), b"echo");
                    assert_eq!(
                        message.payload.field(1).unwrap().value,
                        FieldValue::Binary(Bytes::from_static(b"payload"))
                    );
                    assert_eq!(message.payload.field(2).unwrap().value, FieldValue::I64(-5));
                }
            }
        }
    }

    #[test]
    fn test_trailing_bytes_returned_verbatim() {
        let mut input = EMPTY_CALL.to_vec();
        input.extend_from_slice(b"tail");
        let (_, rest, _) = done(decode(&input).unwrap());
        assert_eq!(&rest[..], b"tail");
    }

    #[test]
    fn test_back_to_back_messages() {
        let mut input = EMPTY_CALL.to_vec();
        input.extend_from_slice(&VERSIONED_REPLY);
        let mut decoder = Decoder::new(false);
        let (first, rest, _) = done(decoder.feed(&input).unwrap());
        assert_eq!(first.mtype, MessageType::Call);
        // decoder reset after Done: feed the remainder back in
        let (second, rest2, _) = done(decoder.feed(&rest).unwrap());
        assert_eq!(second.mtype, MessageType::Reply);
        assert!(rest2.is_empty());
    }

    #[test]
    fn test_invalid_bool_byte() {
        // BOOL field id=1 with byte 0x02
        let mut input = vec![0, 0, 0, 0, 1, 0, 0, 0, 1];
        input.extend_from_slice(&[0x02, 0x00, 0x01, 0x02]);
        let err = decode(&input).unwrap_err();
        match err {
            TermwireError::Decode {
                stage: DecodeStage::Bool,
                field: "value",
                value: 2,
                ..
            } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_field_tag() {
        let mut input = vec![0, 0, 0, 0, 1, 0, 0, 0, 1];
        input.push(0x07); // unassigned tag
        let err = decode(&input).unwrap_err();
        match err {
            TermwireError::Decode {
                stage: DecodeStage::Fields,
                field: "field-type",
                value: 7,
                ..
            } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_negative_legacy_name_length() {
        let input = [0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let err = decode(&input).unwrap_err();
        match err {
            TermwireError::Decode {
                stage: DecodeStage::Message,
                field: "method-name",
                value: -1,
                ..
            } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_negative_binary_length() {
        let mut input = vec![0, 0, 0, 0, 1, 0, 0, 0, 1];
        input.extend_from_slice(&[0x0B, 0x00, 0x01]); // BINARY field id=1
        input.extend_from_slice(&(-4i32).to_be_bytes());
        let err = decode(&input).unwrap_err();
        match err {
            TermwireError::Decode {
                stage: DecodeStage::Binary,
                field: "length",
                value: -4,
                ..
            } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_negative_list_size() {
        let mut input = vec![0, 0, 0, 0, 1, 0, 0, 0, 1];
        input.extend_from_slice(&[0x0F, 0x00, 0x01, 0x08]); // LIST field, elem=I32
        input.extend_from_slice(&(-1i32).to_be_bytes());
        let err = decode(&input).unwrap_err();
        match err {
            TermwireError::Decode {
                stage: DecodeStage::List,
                field: "size",
                value: -1,
                ..
            } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_map_stop_key_type_rejected() {
        let mut input = vec![0, 0, 0, 0, 1, 0, 0, 0, 1];
        input.extend_from_slice(&[0x0D, 0x00, 0x01]); // MAP field
        input.extend_from_slice(&[0x00, 0x08, 0, 0, 0, 0]); // key=STOP
        let err = decode(&input).unwrap_err();
        match err {
            TermwireError::Decode {
                stage: DecodeStage::Map,
                field: "key-type",
                value: 0,
                ..
            } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_message_type_versioned() {
        let input = [0x80, 0x01, 0x00, 0x09];
        let err = decode(&input).unwrap_err();
        match err {
            TermwireError::Decode {
                stage: DecodeStage::Message,
                field: "message-type",
                value: 9,
                ..
            } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_errors_are_sticky() {
        let mut decoder = Decoder::new(false);
        assert!(decoder.feed(&[0xFF, 0xFF, 0xFF, 0xFF]).is_err());
        assert!(decoder.is_poisoned());
        assert!(matches!(
            decoder.feed(&EMPTY_CALL),
            Err(TermwireError::Poisoned)
        ));
    }

    #[test]
    fn test_depth_limit_enforced() {
        // message with structs nested deeper than the limit
        let mut payload = Struct::default();
        for _ in 0..5 {
            payload = Struct::anonymous(vec![Field::new(1, FieldValue::Struct(payload))]);
        }
        let msg = Message::new("", MessageType::Call, 0, payload);
        let bytes = encode_message(&msg, None).unwrap();

        let limits = Limits {
            max_depth: 4,
            ..Limits::default()
        };
        let err = Decoder::with_limits(false, limits).feed(&bytes).unwrap_err();
        assert!(matches!(
            err,
            TermwireError::Decode { field: "depth", .. }
        ));

        // and a laxer decoder accepts the same bytes
        let ok = Decoder::new(false).feed(&bytes).unwrap();
        assert!(matches!(ok, Outcome::Done { .. }));
    }

    #[test]
    fn test_container_size_limit_enforced() {
        let mut input = vec![0, 0, 0, 0, 1, 0, 0, 0, 1];
        input.extend_from_slice(&[0x0F, 0x00, 0x01, 0x08]);
        input.extend_from_slice(&100i32.to_be_bytes());
        let limits = Limits {
            max_container: 10,
            ..Limits::default()
        };
        let err = Decoder::with_limits(false, limits).feed(&input).unwrap_err();
        assert!(matches!(
            err,
            TermwireError::Decode {
                stage: DecodeStage::List,
                field: "size",
                value: 100,
                ..
            }
        ));
    }

    #[test]
    fn test_nested_containers_round_trip() {
        let inner_list = ListValue::new(TType::I32, vec![FieldValue::I32(1), FieldValue::I32(2)]);
        let map = MapValue::new(
            TType::Binary,
            TType::List,
            vec![(
                FieldValue::Binary(Bytes::from_static(b"xs")),
                FieldValue::List(inner_list),
            )],
        );
        let set = ListValue::new(TType::Double, vec![FieldValue::Double(0.5)]);
        let msg = Message::new(
            "",
            MessageType::Reply,
            3,
            Struct::anonymous(vec![
                Field::new(1, FieldValue::Map(map)),
                Field::new(2, FieldValue::Set(set)),
                Field::new(3, FieldValue::U64(u64::MAX)),
            ]),
        );
        let bytes = encode_message(&msg, Some(Version::Binary1)).unwrap();
        let (decoded, rest, version) = done(decode(&bytes).unwrap());
        assert_eq!(decoded, msg);
        assert!(rest.is_empty());
        assert_eq!(version, Some(Version::Binary1));
    }

    #[test]
    fn test_byte_tag_surfaces_as_byte_i8_as_integer() {
        let msg = Message::new(
            "",
            MessageType::Call,
            0,
            Struct::anonymous(vec![
                Field::new(1, FieldValue::Byte(0xFE)),
                Field::new(2, FieldValue::I8(-2)),
            ]),
        );
        let bytes = encode_message(&msg, None).unwrap();
        let (decoded, _, _) = done(decode(&bytes).unwrap());
        assert_eq!(decoded.payload.field(1).unwrap().value, FieldValue::Byte(0xFE));
        assert_eq!(decoded.payload.field(2).unwrap().value, FieldValue::I8(-2));
    }

    #[test]
    fn test_named_structs_inside_term_envelope() {
        let payload = Struct::new(
            "$T",
            vec![Field::new(
                1,
                FieldValue::List(ListValue::new(
                    TType::Struct,
                    vec![FieldValue::Struct(Struct::new(
                        "$N",
                        vec![Field::new(1, FieldValue::I64(17))],
                    ))],
                )),
            )],
        );
        let msg = Message::new(TERM_ENVELOPE_NAME, MessageType::Call, 0, payload);
        let bytes = encode_message(&msg, Some(Version::Binary1)).unwrap();
        let (decoded, rest, _) = done(decode(&bytes).unwrap());
        assert!(rest.is_empty());
        assert_eq!(decoded, msg, "struct names survive inside the envelope");
    }

    #[test]
    fn test_empty_containers() {
        let msg = Message::new(
            "",
            MessageType::Call,
            0,
            Struct::anonymous(vec![
                Field::new(1, FieldValue::Map(MapValue::new(TType::I32, TType::I32, vec![]))),
                Field::new(2, FieldValue::List(ListValue::new(TType::Bool, vec![]))),
                Field::new(3, FieldValue::Set(ListValue::new(TType::I64, vec![]))),
            ]),
        );
        let bytes = encode_message(&msg, None).unwrap();
        let (decoded, _, _) = done(decode(&bytes).unwrap());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_legacy_header_resume_across_name() {
        let msg = Message::new("frobnicate", MessageType::Oneway, -1, Struct::default());
        let bytes = encode_message(&msg, None).unwrap();
        let mut decoder = Decoder::new(false);
        // split in the middle of the method name
        assert!(matches!(decoder.feed(&bytes[..7]).unwrap(), Outcome::More));
        let (decoded, _, version) = done(decoder.feed(&bytes[7..]).unwrap());
        assert_eq!(decoded.name(), b"frobnicate");
        assert_eq!(decoded.seqid, -1);
        assert_eq!(version, None);
    }
}
