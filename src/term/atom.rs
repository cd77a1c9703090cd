//! Interned atoms and the runtime atom table.
//!
//! An [`Atom`] is a cheap-to-clone symbolic name. The [`AtomTable`] records
//! which names the runtime knows; decoding in safe mode refuses names absent
//! from the table, while non-safe decoding interns new names on first sight.
//! The table is read-mostly and supports concurrent readers.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, TermwireError};

/// An interned symbolic name.
///
/// Equality and hashing are by name. Cloning is a reference-count bump.
#[derive(Clone)]
pub struct Atom(Arc<str>);

impl Atom {
    /// Create an atom directly, without consulting a table.
    ///
    /// Authoring terms needs no gate; only decoding is safe-mode checked.
    pub fn new(name: impl AsRef<str>) -> Self {
        Atom(Arc::from(name.as_ref()))
    }

    /// The atom's name.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The atom's name as raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Atom {}

impl std::hash::Hash for Atom {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({})", self.0)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Atom {
    fn from(name: &str) -> Self {
        Atom::new(name)
    }
}

/// The set of atom names known to the runtime.
#[derive(Default)]
pub struct AtomTable {
    names: RwLock<HashSet<Arc<str>>>,
}

impl AtomTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table pre-seeded with known names.
    pub fn with_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let table = Self::new();
        for name in names {
            table.intern(name);
        }
        table
    }

    /// Intern a name, returning its atom. Idempotent.
    pub fn intern(&self, name: &str) -> Atom {
        if let Some(existing) = self.names.read().get(name) {
            return Atom(existing.clone());
        }
        let mut names = self.names.write();
        // racing writer may have inserted meanwhile
        if let Some(existing) = names.get(name) {
            return Atom(existing.clone());
        }
        let arc: Arc<str> = Arc::from(name);
        names.insert(arc.clone());
        Atom(arc)
    }

    /// Look up a known name.
    pub fn lookup(&self, name: &str) -> Option<Atom> {
        self.names.read().get(name).map(|arc| Atom(arc.clone()))
    }

    /// Check whether a name is known.
    pub fn contains(&self, name: &str) -> bool {
        self.names.read().contains(name)
    }

    /// Number of known names.
    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    /// Check if no names are known.
    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }

    /// Resolve raw wire bytes to an atom.
    ///
    /// # Errors
    ///
    /// Fails on non-UTF-8 names, and in safe mode on names not already in
    /// the table.
    pub fn resolve(&self, bytes: &[u8], safe: bool) -> Result<Atom> {
        let name =
            std::str::from_utf8(bytes).map_err(|_| TermwireError::Utf8 { what: "atom" })?;
        if safe {
            self.lookup(name).ok_or_else(|| TermwireError::UnknownAtom {
                name: name.to_string(),
            })
        } else {
            Ok(self.intern(name))
        }
    }
}

impl fmt::Debug for AtomTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomTable")
            .field("len", &self.len())
            .finish()
    }
}
