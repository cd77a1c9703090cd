//! Error types for termwire.

use thiserror::Error;

use crate::protocol::wire::TType;

/// Decoder stage in which a malformed-input error was detected.
///
/// Mirrors the wire construct being parsed when the offending bytes
/// arrived, not the lexical position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    /// Message header (version word, name, type byte, seqid).
    Message,
    /// Struct body (named-mode struct name).
    Struct,
    /// Field list (type tag, field id).
    Fields,
    /// Map header or entries.
    Map,
    /// Set header or elements.
    Set,
    /// List header or elements.
    List,
    /// Length-prefixed byte string.
    Binary,
    /// Boolean byte.
    Bool,
}

impl std::fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DecodeStage::Message => "message",
            DecodeStage::Struct => "struct",
            DecodeStage::Fields => "fields",
            DecodeStage::Map => "map",
            DecodeStage::Set => "set",
            DecodeStage::List => "list",
            DecodeStage::Binary => "binary",
            DecodeStage::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// Main error type for all termwire operations.
#[derive(Debug, Error)]
pub enum TermwireError {
    /// Malformed input rejected by the decoder.
    ///
    /// `field` names the specific wire field being read (e.g. `field-type`,
    /// `method-name`, `size`), `value` is the offending value, and `depth`
    /// is a snapshot of the container-stack depth at the point of failure.
    #[error("decode error at {stage}/{field}: value {value} (depth {depth})")]
    Decode {
        /// Wire construct being parsed.
        stage: DecodeStage,
        /// Specific field within the construct.
        field: &'static str,
        /// The offending value as read from the wire.
        value: i64,
        /// Container-stack depth when the error was detected.
        depth: usize,
    },

    /// A failed decoder or session was resumed. Decode errors are sticky:
    /// the continuation must be discarded.
    #[error("decoder poisoned by a previous error")]
    Poisoned,

    /// Container element does not conform to the declared element type
    /// (encoder only).
    #[error("type mismatch in {ctx}: declared {expected:?}, found {found:?}")]
    TypeMismatch {
        /// Which slot was violated (e.g. `list-elem`, `map-key`).
        ctx: &'static str,
        /// The declared element type.
        expected: TType,
        /// The type of the non-conforming value.
        found: TType,
    },

    /// A length does not fit the wire's signed 32-bit length prefix
    /// (encoder only).
    #[error("{what} length {len} exceeds i32")]
    TooLong {
        /// What was being encoded.
        what: &'static str,
        /// The out-of-range length.
        len: usize,
    },

    /// A sentinel struct had the wrong inner shape for its variant, or a
    /// struct inside a term envelope bore no known sentinel.
    #[error("bad {sentinel:?} envelope: {reason}")]
    Envelope {
        /// The struct name as found.
        sentinel: String,
        /// What deviated from the required shape.
        reason: &'static str,
    },

    /// Safe-mode decode encountered an atom name not already known to the
    /// runtime.
    #[error("unknown atom {name:?} in safe mode")]
    UnknownAtom {
        /// The offending atom name.
        name: String,
    },

    /// Record decode found no schema for `(name, arity)` in the contract.
    #[error("unknown record {name}/{arity}")]
    UnknownRecord {
        /// Record name.
        name: String,
        /// Field count.
        arity: usize,
    },

    /// Record field count does not match the registered schema.
    #[error("record {name} arity mismatch: schema has {expected}, value has {found}")]
    ArityMismatch {
        /// Record name.
        name: String,
        /// Arity per the contract schema.
        expected: usize,
        /// Arity of the value.
        found: usize,
    },

    /// Atom or string payload was not valid UTF-8.
    #[error("invalid UTF-8 in {what}")]
    Utf8 {
        /// What was being decoded.
        what: &'static str,
    },

    /// Framing-layer violation (oversized or negative frame length).
    #[error("framing error: {0}")]
    Frame(String),
}

/// Result type alias using TermwireError.
pub type Result<T> = std::result::Result<T, TermwireError>;
