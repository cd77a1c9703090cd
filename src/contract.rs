//! Contract registry interface.
//!
//! The contract system (a schema/plugin registry living outside this crate)
//! supplies record-name → ordered-field-name mappings. The codec consults it
//! through this narrow read-only interface: record encode looks up the field
//! order, record decode validates shape against it. A missing schema means
//! tuple fallback on encode and a hard failure on decode.

use std::collections::HashMap;

use crate::term::Atom;

/// Read-only record-schema lookup.
///
/// Implementations must tolerate concurrent readers; the codec never
/// mutates a contract.
pub trait Contract: Send + Sync {
    /// Every `(record_name, arity)` pair the contract declares.
    fn records(&self) -> Vec<(Atom, usize)>;

    /// The ordered field names of `(name, arity)`, if declared.
    fn record_fields(&self, name: &str, arity: usize) -> Option<Vec<Atom>>;
}

/// An in-memory contract built up from explicit declarations.
///
/// # Example
///
/// ```
/// use termwire::contract::{Contract, StaticContract};
///
/// let contract = StaticContract::new().with_record("point", ["x", "y"]);
/// let fields = contract.record_fields("point", 2).unwrap();
/// assert_eq!(fields[0].as_str(), "x");
/// assert!(contract.record_fields("point", 3).is_none());
/// ```
#[derive(Debug, Default)]
pub struct StaticContract {
    records: HashMap<(String, usize), Vec<Atom>>,
}

impl StaticContract {
    /// Create an empty contract.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a record with its ordered field names.
    ///
    /// Re-declaring `(name, arity)` replaces the previous field list.
    pub fn with_record<'a>(
        mut self,
        name: &str,
        fields: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let fields: Vec<Atom> = fields.into_iter().map(Atom::new).collect();
        self.records
            .insert((name.to_string(), fields.len()), fields);
        self
    }
}

impl Contract for StaticContract {
    fn records(&self) -> Vec<(Atom, usize)> {
        self.records
            .keys()
            .map(|(name, arity)| (Atom::new(name), *arity))
            .collect()
    }

    fn record_fields(&self, name: &str, arity: usize) -> Option<Vec<Atom>> {
        self.records
            .get(&(name.to_string(), arity))
            .cloned()
    }
}
