//! The term algebra.
//!
//! Terms are the richer dynamically-typed values the runtime exchanges
//! internally. They are distinct from the wire-level Thrift tree: a [`Term`]
//! crosses the wire only after the bridge embeds it in sentinel structs.
//!
//! `String` and `Binary` are deliberately separate variants: a string is a
//! sequence of code points, a binary is opaque bytes.

use bytes::Bytes;

use super::atom::Atom;

/// A named tuple whose field order is fixed by a contract schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Record name.
    pub name: Atom,
    /// Field values, in schema order.
    pub fields: Vec<Term>,
}

impl Record {
    /// Create a record.
    pub fn new(name: Atom, fields: Vec<Term>) -> Self {
        Self { name, fields }
    }

    /// Number of fields.
    #[inline]
    pub fn arity(&self) -> usize {
        self.fields.len()
    }
}

/// A dynamically-typed term.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Opaque bytes.
    Binary(Bytes),
    /// Signed 64-bit integer.
    Int(i64),
    /// IEEE-754 double.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Interned symbolic name.
    Atom(Atom),
    /// UTF-8 text, distinct from `Binary`.
    String(String),
    /// Homogeneous-by-convention ordered sequence.
    List(Vec<Term>),
    /// Positional heterogeneous sequence.
    Tuple(Vec<Term>),
    /// Ordered key-value association; keys and values are arbitrary terms.
    PropList(Vec<(Term, Term)>),
    /// Named tuple with schema-ordered fields.
    Record(Record),
}

impl Term {
    /// Convenience constructor for an atom term.
    pub fn atom(name: impl AsRef<str>) -> Self {
        Term::Atom(Atom::new(name))
    }

    /// Convenience constructor for a binary term.
    pub fn binary(bytes: impl Into<Bytes>) -> Self {
        Term::Binary(bytes.into())
    }

    /// Borrow the atom, if this is an atom term.
    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Term::Atom(a) => Some(a),
            _ => None,
        }
    }
}

impl From<i64> for Term {
    fn from(n: i64) -> Self {
        Term::Int(n)
    }
}

impl From<f64> for Term {
    fn from(x: f64) -> Self {
        Term::Float(x)
    }
}

impl From<bool> for Term {
    fn from(b: bool) -> Self {
        Term::Bool(b)
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Term::String(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_and_binary_are_distinct() {
        let s = Term::from("ok");
        let b = Term::binary(&b"ok"[..]);
        assert_ne!(s, b);
    }

    #[test]
    fn test_record_arity() {
        let rec = Record::new(Atom::new("point"), vec![Term::Int(3), Term::Int(4)]);
        assert_eq!(rec.arity(), 2);
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Term::from(1i64), Term::Int(1));
        assert_eq!(Term::from(true), Term::Bool(true));
        assert_eq!(Term::from(0.5f64), Term::Float(0.5));
    }

    #[test]
    fn test_atom_accessor() {
        let t = Term::atom("ok");
        assert_eq!(t.as_atom().unwrap().as_str(), "ok");
        assert!(Term::Int(1).as_atom().is_none());
    }
}
