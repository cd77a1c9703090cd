//! # termwire
//!
//! Streaming codec for the Thrift Binary Protocol with a bidirectional
//! bridge to a richer, dynamically-typed term algebra.
//!
//! The crate lets an RPC runtime interoperate natively with Thrift clients
//! while internally exchanging higher-level structured terms. It has three
//! layers:
//!
//! - **Wire codec** ([`protocol`]): encoding of Thrift message trees and a
//!   resumable, incremental decoder that consumes bytes as they arrive from
//!   a transport and yields either a complete message, an error, or a
//!   continuation awaiting more input. Parsing state survives arbitrary
//!   byte boundaries; nesting lives on an explicit heap stack.
//! - **Term bridge** ([`term`]): a lossless embedding of the term algebra
//!   (binaries, atoms, tuples, records, proplists, …) into Thrift structs
//!   tagged with reserved sentinel names.
//! - **Session wrapping** ([`session`]): role-aware decisions about when a
//!   value crosses the wire as a raw Thrift message versus a `$UBF` term
//!   envelope, plus optional length-prefix framing ([`framing`]).
//!
//! The codec performs no I/O and owns no global state; transports feed it
//! bytes and carry away bytes.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use termwire::contract::StaticContract;
//! use termwire::session::{Framing, Payload, Session, SessionConfig};
//! use termwire::term::{AtomTable, Term};
//!
//! let contract = Arc::new(StaticContract::new());
//! let atoms = Arc::new(AtomTable::new());
//! let client = Session::new(SessionConfig::client(Framing::Unframed), contract.clone(), atoms.clone());
//! let mut server = Session::new(SessionConfig::server(Framing::Unframed), contract, atoms);
//!
//! let bytes = client.encode(&Payload::Term(Term::atom("ping"))).unwrap();
//! let received = server.feed(&bytes).unwrap();
//! assert_eq!(received, vec![Payload::Term(Term::atom("ping"))]);
//! ```

pub mod contract;
pub mod error;
pub mod framing;
pub mod protocol;
pub mod session;
pub mod term;

pub use contract::{Contract, StaticContract};
pub use error::{DecodeStage, Result, TermwireError};
pub use protocol::{decode, decode_init, Decoder, Message, Outcome};
pub use session::{Payload, Role, Session, SessionConfig};
pub use term::{Atom, AtomTable, Record, Term};
