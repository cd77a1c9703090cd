//! Role-aware session codec.
//!
//! A [`Session`] wraps the wire codec and the term bridge behind the surface
//! a transport driver consumes: egress values are wrapped according to the
//! session role, ingress bytes are de-framed (framed roles), decoded
//! incrementally, and unwrapped.
//!
//! Two rules govern the `$UBF` envelope:
//! - Outbound, a term wraps as a message named `$UBF` with seqid 0: type
//!   CALL from a client, REPLY from a server, ONEWAY for an event marker.
//! - Inbound, a message named `$UBF` unwraps through the bridge; its type
//!   decides between a plain value (CALL/REPLY/EXCEPTION) and an event
//!   (ONEWAY). Every other message passes through untouched.
//!
//! Replies over this codec carry only the reply value, never a
//! `(value, next_state)` pair (simple RPC mode). The peer's logical state,
//! if any, stays on the peer.
//!
//! A decode error poisons the session: it is logged and every later
//! [`Session::feed`] fails. There is no resumption after a codec error on a
//! given stream.

use std::sync::Arc;

use bytes::Bytes;

use tracing::{debug, warn};

use crate::contract::Contract;
use crate::error::{Result, TermwireError};
use crate::framing::{self, FrameBuffer};
use crate::protocol::decoder::{Decoder, Limits, Outcome};
use crate::protocol::encoder::encode_message;
use crate::protocol::value::Message;
use crate::protocol::wire::{MessageType, Version, TERM_ENVELOPE_NAME};
use crate::term::bridge::{struct_to_term, term_to_struct};
use crate::term::{AtomTable, Term};

/// Identifier of the protocol dialect, for the session-layer router.
pub fn proto_version() -> &'static str {
    "tbp1.0"
}

/// Identifier of this codec driver.
pub fn proto_driver() -> &'static str {
    "termwire"
}

/// Packet type tag registered with the session layer.
pub fn proto_packet_type() -> u8 {
    0
}

/// Which end of the conversation this session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiates calls; terms wrap as CALL.
    Client,
    /// Answers calls; terms wrap as REPLY.
    Server,
}

/// Whether the transport carries a 32-bit length prefix per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Length-prefixed messages.
    Framed,
    /// Bare byte stream.
    Unframed,
}

/// Per-session configuration.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Which end of the conversation this is.
    pub role: Role,
    /// Transport framing variant.
    pub framing: Framing,
    /// Safe-mode decoding: refuse unknown atom names.
    pub safe: bool,
    /// Header form for outbound messages; `None` emits the legacy header.
    pub version: Option<Version>,
    /// Decoder resource limits.
    pub limits: Limits,
}

impl SessionConfig {
    /// Client-role config with the given framing.
    pub fn client(framing: Framing) -> Self {
        Self {
            role: Role::Client,
            framing,
            safe: false,
            version: Some(Version::Binary1),
            limits: Limits::default(),
        }
    }

    /// Server-role config with the given framing.
    pub fn server(framing: Framing) -> Self {
        Self {
            role: Role::Server,
            ..Self::client(framing)
        }
    }

    /// Enable safe-mode decoding.
    pub fn safe(mut self) -> Self {
        self.safe = true;
        self
    }
}

/// A value crossing the session boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A raw Thrift message, passed through unchanged in both directions.
    Message(Message),
    /// A term; wraps as `$UBF` CALL/REPLY by role.
    Term(Term),
    /// An event marker; wraps as `$UBF` ONEWAY.
    Event(Term),
}

/// Session codec: role-aware wrapping over the streaming wire codec.
///
/// Single-owner, like the decoder continuation it holds. Constructing a
/// session interns the contract's record and field names so safe-mode
/// decoding accepts every registered schema.
pub struct Session<C: Contract> {
    config: SessionConfig,
    contract: Arc<C>,
    atoms: Arc<AtomTable>,
    decoder: Decoder,
    framer: FrameBuffer,
    poisoned: bool,
}

impl<C: Contract> Session<C> {
    /// Create a session over a contract and an atom table.
    pub fn new(config: SessionConfig, contract: Arc<C>, atoms: Arc<AtomTable>) -> Self {
        for (name, arity) in contract.records() {
            atoms.intern(name.as_str());
            if let Some(fields) = contract.record_fields(name.as_str(), arity) {
                for field in &fields {
                    atoms.intern(field.as_str());
                }
            }
        }
        let decoder = Decoder::with_limits(config.safe, config.limits);
        Self {
            config,
            contract,
            atoms,
            decoder,
            framer: FrameBuffer::new(),
            poisoned: false,
        }
    }

    /// The session's contract handle.
    pub fn contract(&self) -> &C {
        &self.contract
    }

    /// The session's atom table.
    pub fn atoms(&self) -> &AtomTable {
        &self.atoms
    }

    /// Whether a decode error has poisoned this session.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Encode an outbound payload to transport bytes.
    ///
    /// # Errors
    ///
    /// Fails on encoder type/range violations.
    pub fn encode(&self, payload: &Payload) -> Result<Vec<u8>> {
        let message = self.wrap(payload);
        debug!(
            name = %String::from_utf8_lossy(message.name()),
            mtype = ?message.mtype,
            "encoding outbound message"
        );
        let bytes = encode_message(&message, self.config.version)?;
        match self.config.framing {
            Framing::Framed => framing::frame(&bytes),
            Framing::Unframed => Ok(bytes.to_vec()),
        }
    }

    /// Ingest transport bytes, yielding every payload completed by them.
    ///
    /// # Errors
    ///
    /// Any codec error poisons the session; later calls fail with
    /// [`TermwireError::Poisoned`].
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Payload>> {
        if self.poisoned {
            return Err(TermwireError::Poisoned);
        }
        match self.ingest(bytes) {
            Ok(payloads) => Ok(payloads),
            Err(err) => {
                warn!(error = %err, "session codec error, terminating stream");
                self.poisoned = true;
                Err(err)
            }
        }
    }

    fn ingest(&mut self, bytes: &[u8]) -> Result<Vec<Payload>> {
        let mut out = Vec::new();
        match self.config.framing {
            Framing::Framed => {
                for frame in self.framer.push(bytes)? {
                    self.drain(&frame, &mut out)?;
                }
            }
            Framing::Unframed => self.drain(bytes, &mut out)?,
        }
        Ok(out)
    }

    /// Run the decoder over `bytes` and every remainder it returns, so
    /// back-to-back messages in one read all surface.
    fn drain(&mut self, bytes: &[u8], out: &mut Vec<Payload>) -> Result<()> {
        let mut carry: Option<Bytes> = None;
        loop {
            let outcome = match &carry {
                None => self.decoder.feed(bytes)?,
                Some(rest) => self.decoder.feed(rest)?,
            };
            match outcome {
                Outcome::More => return Ok(()),
                Outcome::Done {
                    message, remainder, ..
                } => {
                    out.push(self.unwrap_message(message)?);
                    if remainder.is_empty() {
                        return Ok(());
                    }
                    carry = Some(remainder);
                }
            }
        }
    }

    fn wrap(&self, payload: &Payload) -> Message {
        match payload {
            Payload::Message(message) => message.clone(),
            Payload::Term(term) => {
                let mtype = match self.config.role {
                    Role::Client => MessageType::Call,
                    Role::Server => MessageType::Reply,
                };
                self.envelope(term, mtype)
            }
            Payload::Event(term) => self.envelope(term, MessageType::Oneway),
        }
    }

    fn envelope(&self, term: &Term, mtype: MessageType) -> Message {
        Message::new(
            TERM_ENVELOPE_NAME,
            mtype,
            0,
            term_to_struct(term, &*self.contract),
        )
    }

    fn unwrap_message(&self, message: Message) -> Result<Payload> {
        if message.name() != TERM_ENVELOPE_NAME {
            return Ok(Payload::Message(message));
        }
        let term = struct_to_term(
            &message.payload,
            &*self.contract,
            &self.atoms,
            self.config.safe,
        )?;
        debug!(mtype = ?message.mtype, "unwrapped term envelope");
        Ok(match message.mtype {
            MessageType::Oneway => Payload::Event(term),
            _ => Payload::Term(term),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::StaticContract;
    use crate::protocol::value::{Field, FieldValue, Struct};
    use crate::term::{Atom, Record};

    fn pair<C: Contract>(
        contract: Arc<C>,
        framing: Framing,
    ) -> (Session<C>, Session<C>) {
        let atoms = Arc::new(AtomTable::new());
        let client = Session::new(SessionConfig::client(framing), contract.clone(), atoms.clone());
        let server = Session::new(SessionConfig::server(framing), contract, atoms);
        (client, server)
    }

    #[test]
    fn test_term_wraps_as_call_from_client() {
        let (client, mut server) = pair(Arc::new(StaticContract::new()), Framing::Unframed);
        let term = Term::Tuple(vec![Term::atom("ping"), Term::Int(1)]);

        let bytes = client.encode(&Payload::Term(term.clone())).unwrap();
        let payloads = server.feed(&bytes).unwrap();
        assert_eq!(payloads, vec![Payload::Term(term)]);
    }

    #[test]
    fn test_term_wraps_as_reply_from_server() {
        let (mut client, server) = pair(Arc::new(StaticContract::new()), Framing::Unframed);
        let term = Term::atom("pong");

        let bytes = server.encode(&Payload::Term(term.clone())).unwrap();
        // the wrapped message is REPLY-typed
        let payloads = client.feed(&bytes).unwrap();
        assert_eq!(payloads, vec![Payload::Term(term)]);
    }

    #[test]
    fn test_event_wraps_as_oneway() {
        let (client, mut server) = pair(Arc::new(StaticContract::new()), Framing::Unframed);
        let term = Term::from("tick");

        let bytes = client.encode(&Payload::Event(term.clone())).unwrap();
        let payloads = server.feed(&bytes).unwrap();
        assert_eq!(payloads, vec![Payload::Event(term)]);
    }

    #[test]
    fn test_plain_message_passes_through() {
        let (client, mut server) = pair(Arc::new(StaticContract::new()), Framing::Unframed);
        let message = Message::new(
            "add",
            MessageType::Call,
            5,
            Struct::anonymous(vec![Field::new(1, FieldValue::I32(2))]),
        );

        let bytes = client.encode(&Payload::Message(message.clone())).unwrap();
        let payloads = server.feed(&bytes).unwrap();
        match &payloads[0] {
            Payload::Message(received) => {
                assert_eq!(received.name(), b"add");
                assert_eq!(received.seqid, 5);
                assert_eq!(received.payload.field(1).unwrap().value, FieldValue::I32(2));
            }
            other => panic!("expected pass-through message, got {other:?}"),
        }
    }

    #[test]
    fn test_framed_round_trip_with_fragmentation() {
        let (client, mut server) = pair(Arc::new(StaticContract::new()), Framing::Framed);
        let term = Term::List(vec![Term::Int(1), Term::Int(2), Term::Int(3)]);

        let bytes = client.encode(&Payload::Term(term.clone())).unwrap();
        // drip the framed bytes in three chunks
        assert!(server.feed(&bytes[..5]).unwrap().is_empty());
        assert!(server.feed(&bytes[5..9]).unwrap().is_empty());
        let payloads = server.feed(&bytes[9..]).unwrap();
        assert_eq!(payloads, vec![Payload::Term(term)]);
    }

    #[test]
    fn test_back_to_back_envelopes_in_one_read() {
        let (client, mut server) = pair(Arc::new(StaticContract::new()), Framing::Unframed);
        let mut bytes = client.encode(&Payload::Term(Term::Int(1))).unwrap();
        bytes.extend(client.encode(&Payload::Term(Term::Int(2))).unwrap());

        let payloads = server.feed(&bytes).unwrap();
        assert_eq!(
            payloads,
            vec![Payload::Term(Term::Int(1)), Payload::Term(Term::Int(2))]
        );
    }

    #[test]
    fn test_record_round_trip_through_session() {
        let contract = Arc::new(StaticContract::new().with_record("point", ["x", "y"]));
        let (client, mut server) = pair(contract, Framing::Unframed);
        let rec = Term::Record(Record::new(
            Atom::new("point"),
            vec![Term::Int(3), Term::Int(4)],
        ));

        let bytes = client.encode(&Payload::Term(rec.clone())).unwrap();
        let payloads = server.feed(&bytes).unwrap();
        assert_eq!(payloads, vec![Payload::Term(rec)]);
    }

    #[test]
    fn test_safe_mode_rejects_unknown_atoms_and_poisons() {
        let contract = Arc::new(StaticContract::new());
        let client_atoms = Arc::new(AtomTable::new());
        let client = Session::new(
            SessionConfig::client(Framing::Unframed),
            contract.clone(),
            client_atoms,
        );
        // server has its own table that has never seen "mystery"
        let server_atoms = Arc::new(AtomTable::new());
        let mut server = Session::new(
            SessionConfig::server(Framing::Unframed).safe(),
            contract,
            server_atoms,
        );

        let bytes = client.encode(&Payload::Term(Term::atom("mystery"))).unwrap();
        let err = server.feed(&bytes).unwrap_err();
        assert!(matches!(err, TermwireError::UnknownAtom { .. }));
        assert!(server.is_poisoned());
        assert!(matches!(server.feed(&[]), Err(TermwireError::Poisoned)));
    }

    #[test]
    fn test_safe_mode_accepts_contract_names() {
        // contract registration seeds the atom table, so safe mode decodes
        // registered records
        let contract = Arc::new(StaticContract::new().with_record("point", ["x", "y"]));
        let atoms = Arc::new(AtomTable::new());
        let client = Session::new(
            SessionConfig::client(Framing::Unframed),
            contract.clone(),
            atoms.clone(),
        );
        let mut server = Session::new(
            SessionConfig::server(Framing::Unframed).safe(),
            contract,
            atoms,
        );

        let rec = Term::Record(Record::new(
            Atom::new("point"),
            vec![Term::Int(1), Term::Int(2)],
        ));
        let bytes = client.encode(&Payload::Term(rec.clone())).unwrap();
        assert_eq!(server.feed(&bytes).unwrap(), vec![Payload::Term(rec)]);
    }

    #[test]
    fn test_exception_envelope_unwraps_as_term() {
        let contract = Arc::new(StaticContract::new());
        let atoms = Arc::new(AtomTable::new());
        let mut server = Session::new(
            SessionConfig::server(Framing::Unframed),
            contract.clone(),
            atoms,
        );

        // hand-build a $UBF EXCEPTION message
        let term = Term::Tuple(vec![Term::atom("error"), Term::from("boom")]);
        let message = Message::new(
            TERM_ENVELOPE_NAME,
            MessageType::Exception,
            0,
            term_to_struct(&term, &*contract),
        );
        let bytes = encode_message(&message, Some(Version::Binary1)).unwrap();
        let payloads = server.feed(&bytes).unwrap();
        assert_eq!(payloads, vec![Payload::Term(term)]);
    }

    #[test]
    fn test_metadata() {
        assert_eq!(proto_version(), "tbp1.0");
        assert_eq!(proto_driver(), "termwire");
        assert_eq!(proto_packet_type(), 0);
    }

    #[test]
    fn test_wire_error_poisons_session() {
        let (_, mut server) = pair(Arc::new(StaticContract::new()), Framing::Unframed);
        // legacy header with negative name length
        let err = server.feed(&[0xFF, 0xFF, 0xFF, 0xFF, 0x00]).unwrap_err();
        assert!(matches!(err, TermwireError::Decode { .. }));
        assert!(server.is_poisoned());
    }
}
