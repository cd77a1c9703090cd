//! Wire protocol: primitive codec, value tree, encoder, resumable decoder.

pub mod decoder;
pub mod encoder;
pub mod value;
pub mod wire;

pub use decoder::{decode, decode_init, Decoder, Limits, Outcome};
pub use encoder::{encode_message, encode_struct};
pub use value::{Field, FieldValue, ListValue, MapValue, Message, Struct};
pub use wire::{MessageType, TType, Version, TERM_ENVELOPE_NAME};
