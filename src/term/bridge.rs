//! Bidirectional mapping between terms and sentinel-named Thrift structs.
//!
//! Each term variant embeds as a struct whose name is a reserved
//! two-character sentinel, containing exactly one field with id 1:
//!
//! | Term     | Sentinel | Field payload                                  |
//! |----------|----------|------------------------------------------------|
//! | Binary   | `$B`     | BINARY, the bytes                              |
//! | Int      | `$N`     | I64                                            |
//! | Float    | `$N`     | DOUBLE                                         |
//! | Bool     | `$O`     | BOOL                                           |
//! | Atom     | `$A`     | BINARY, the UTF-8 name                         |
//! | String   | `$S`     | BINARY, UTF-8 text                             |
//! | List     | `$L`     | LIST of STRUCT, elements recursively embedded  |
//! | Tuple    | `$T`     | LIST of STRUCT                                 |
//! | PropList | `$P`     | MAP of STRUCT→STRUCT                           |
//! | Record   | `$R`     | MAP of BINARY→STRUCT, `""` key = name as Atom  |
//!
//! Encoding is total: a record whose schema the contract does not declare
//! falls back to the `$T` tuple embedding. Decoding validates the exact
//! shape each sentinel dictates and fails on any deviation. The mapping is
//! injective: distinct terms embed as distinct structs.

use bytes::Bytes;

use super::atom::AtomTable;
use super::model::{Record, Term};
use crate::contract::Contract;
use crate::error::{Result, TermwireError};
use crate::protocol::value::{Field, FieldValue, ListValue, MapValue, Struct};
use crate::protocol::wire::TType;

/// Sentinel for `Term::Binary`.
pub const SENTINEL_BINARY: &[u8] = b"$B";
/// Sentinel for `Term::Int` and `Term::Float`.
pub const SENTINEL_NUMBER: &[u8] = b"$N";
/// Sentinel for `Term::Bool`.
pub const SENTINEL_BOOL: &[u8] = b"$O";
/// Sentinel for `Term::Atom`.
pub const SENTINEL_ATOM: &[u8] = b"$A";
/// Sentinel for `Term::String`.
pub const SENTINEL_STRING: &[u8] = b"$S";
/// Sentinel for `Term::List`.
pub const SENTINEL_LIST: &[u8] = b"$L";
/// Sentinel for `Term::Tuple`.
pub const SENTINEL_TUPLE: &[u8] = b"$T";
/// Sentinel for `Term::PropList`.
pub const SENTINEL_PROPLIST: &[u8] = b"$P";
/// Sentinel for `Term::Record`.
pub const SENTINEL_RECORD: &[u8] = b"$R";

/// Reserved `$R` map key holding the record name.
const RECORD_NAME_KEY: &[u8] = b"";

/// Check whether a struct name is one of the reserved sentinels.
pub fn is_sentinel(name: &[u8]) -> bool {
    matches!(
        name,
        b"$B" | b"$N" | b"$O" | b"$A" | b"$S" | b"$L" | b"$T" | b"$P" | b"$R"
    )
}

/// Embed a term as a sentinel struct.
///
/// Total over the term algebra: records with no schema in `contract` take
/// the tuple fallback.
pub fn term_to_struct(term: &Term, contract: &dyn Contract) -> Struct {
    match term {
        Term::Binary(bytes) => envelope(SENTINEL_BINARY, FieldValue::Binary(bytes.clone())),
        Term::Int(n) => envelope(SENTINEL_NUMBER, FieldValue::I64(*n)),
        Term::Float(x) => envelope(SENTINEL_NUMBER, FieldValue::Double(*x)),
        Term::Bool(b) => envelope(SENTINEL_BOOL, FieldValue::Bool(*b)),
        Term::Atom(atom) => envelope(
            SENTINEL_ATOM,
            FieldValue::Binary(Bytes::copy_from_slice(atom.as_bytes())),
        ),
        Term::String(s) => envelope(
            SENTINEL_STRING,
            FieldValue::Binary(Bytes::copy_from_slice(s.as_bytes())),
        ),
        Term::List(items) => envelope(SENTINEL_LIST, embed_sequence(items, contract)),
        Term::Tuple(items) => envelope(SENTINEL_TUPLE, embed_sequence(items, contract)),
        Term::PropList(pairs) => {
            let entries = pairs
                .iter()
                .map(|(k, v)| {
                    (
                        FieldValue::Struct(term_to_struct(k, contract)),
                        FieldValue::Struct(term_to_struct(v, contract)),
                    )
                })
                .collect();
            envelope(
                SENTINEL_PROPLIST,
                FieldValue::Map(MapValue::new(TType::Struct, TType::Struct, entries)),
            )
        }
        Term::Record(rec) => {
            let schema = contract
                .record_fields(rec.name.as_str(), rec.arity())
                .filter(|fields| fields.len() == rec.arity());
            match schema {
                Some(field_names) => {
                    let mut entries = Vec::with_capacity(rec.arity() + 1);
                    entries.push((
                        FieldValue::Binary(Bytes::from_static(RECORD_NAME_KEY)),
                        FieldValue::Struct(term_to_struct(
                            &Term::Atom(rec.name.clone()),
                            contract,
                        )),
                    ));
                    for (field_name, value) in field_names.iter().zip(&rec.fields) {
                        entries.push((
                            FieldValue::Binary(Bytes::copy_from_slice(field_name.as_bytes())),
                            FieldValue::Struct(term_to_struct(value, contract)),
                        ));
                    }
                    envelope(
                        SENTINEL_RECORD,
                        FieldValue::Map(MapValue::new(TType::Binary, TType::Struct, entries)),
                    )
                }
                None => envelope(SENTINEL_TUPLE, embed_sequence(&rec.fields, contract)),
            }
        }
    }
}

/// Recover a term from a sentinel struct.
///
/// # Errors
///
/// Fails with an envelope error on any shape deviation, `UnknownAtom` in
/// safe mode, and `UnknownRecord`/`ArityMismatch` on schema trouble.
pub fn struct_to_term(
    s: &Struct,
    contract: &dyn Contract,
    atoms: &AtomTable,
    safe: bool,
) -> Result<Term> {
    match s.name.as_ref() {
        b"$B" => Ok(Term::Binary(single_binary(s, "$B")?)),
        b"$N" => match single_field(s, "$N")? {
            FieldValue::I64(n) => Ok(Term::Int(*n)),
            FieldValue::Double(x) => Ok(Term::Float(*x)),
            _ => Err(bad("$N", "field is neither I64 nor DOUBLE")),
        },
        b"$O" => match single_field(s, "$O")? {
            FieldValue::Bool(b) => Ok(Term::Bool(*b)),
            _ => Err(bad("$O", "field is not BOOL")),
        },
        b"$A" => {
            let bytes = single_binary(s, "$A")?;
            Ok(Term::Atom(atoms.resolve(&bytes, safe)?))
        }
        b"$S" => {
            let bytes = single_binary(s, "$S")?;
            let text = std::str::from_utf8(&bytes)
                .map_err(|_| TermwireError::Utf8 { what: "string" })?;
            Ok(Term::String(text.to_string()))
        }
        b"$L" => Ok(Term::List(unembed_sequence(s, "$L", contract, atoms, safe)?)),
        b"$T" => Ok(Term::Tuple(unembed_sequence(s, "$T", contract, atoms, safe)?)),
        b"$P" => {
            let map = single_map(s, "$P", TType::Struct, TType::Struct)?;
            let mut pairs = Vec::with_capacity(map.len());
            for (key, value) in &map.entries {
                let (FieldValue::Struct(k), FieldValue::Struct(v)) = (key, value) else {
                    return Err(bad("$P", "entry is not STRUCT→STRUCT"));
                };
                pairs.push((
                    struct_to_term(k, contract, atoms, safe)?,
                    struct_to_term(v, contract, atoms, safe)?,
                ));
            }
            Ok(Term::PropList(pairs))
        }
        b"$R" => unembed_record(s, contract, atoms, safe),
        other => Err(TermwireError::Envelope {
            sentinel: String::from_utf8_lossy(other).into_owned(),
            reason: "not a sentinel struct",
        }),
    }
}

fn envelope(sentinel: &'static [u8], value: FieldValue) -> Struct {
    Struct::new(Bytes::from_static(sentinel), vec![Field::new(1, value)])
}

fn embed_sequence(items: &[Term], contract: &dyn Contract) -> FieldValue {
    let elems = items
        .iter()
        .map(|item| FieldValue::Struct(term_to_struct(item, contract)))
        .collect();
    // element tag is uniformly STRUCT to preserve heterogeneity
    FieldValue::List(ListValue::new(TType::Struct, elems))
}

fn bad(sentinel: &'static str, reason: &'static str) -> TermwireError {
    TermwireError::Envelope {
        sentinel: sentinel.to_string(),
        reason,
    }
}

/// The single id=1 field every envelope must contain.
fn single_field<'a>(s: &'a Struct, sentinel: &'static str) -> Result<&'a FieldValue> {
    if s.fields.len() != 1 {
        return Err(bad(sentinel, "expected exactly one field"));
    }
    let field = &s.fields[0];
    if field.id != 1 {
        return Err(bad(sentinel, "field id is not 1"));
    }
    Ok(&field.value)
}

fn single_binary(s: &Struct, sentinel: &'static str) -> Result<Bytes> {
    match single_field(s, sentinel)? {
        FieldValue::Binary(bytes) => Ok(bytes.clone()),
        _ => Err(bad(sentinel, "field is not BINARY")),
    }
}

fn single_map<'a>(
    s: &'a Struct,
    sentinel: &'static str,
    key_type: TType,
    value_type: TType,
) -> Result<&'a MapValue> {
    match single_field(s, sentinel)? {
        FieldValue::Map(map) if map.key_type == key_type && map.value_type == value_type => Ok(map),
        FieldValue::Map(_) => Err(bad(sentinel, "wrong map element types")),
        _ => Err(bad(sentinel, "field is not MAP")),
    }
}

fn unembed_sequence(
    s: &Struct,
    sentinel: &'static str,
    contract: &dyn Contract,
    atoms: &AtomTable,
    safe: bool,
) -> Result<Vec<Term>> {
    let list = match single_field(s, sentinel)? {
        FieldValue::List(list) if list.elem_type == TType::Struct => list,
        FieldValue::List(_) => return Err(bad(sentinel, "element type is not STRUCT")),
        _ => return Err(bad(sentinel, "field is not LIST")),
    };
    let mut items = Vec::with_capacity(list.len());
    for elem in &list.elems {
        let FieldValue::Struct(inner) = elem else {
            return Err(bad(sentinel, "element is not STRUCT"));
        };
        items.push(struct_to_term(inner, contract, atoms, safe)?);
    }
    Ok(items)
}

fn unembed_record(
    s: &Struct,
    contract: &dyn Contract,
    atoms: &AtomTable,
    safe: bool,
) -> Result<Term> {
    let map = single_map(s, "$R", TType::Binary, TType::Struct)?;

    let mut name = None;
    for (key, value) in &map.entries {
        let FieldValue::Binary(key_bytes) = key else {
            return Err(bad("$R", "entry key is not BINARY"));
        };
        if key_bytes.as_ref() == RECORD_NAME_KEY {
            let FieldValue::Struct(inner) = value else {
                return Err(bad("$R", "record name is not STRUCT"));
            };
            let Term::Atom(atom) = struct_to_term(inner, contract, atoms, safe)? else {
                return Err(bad("$R", "record name is not an atom"));
            };
            if name.replace(atom).is_some() {
                return Err(bad("$R", "duplicate record-name entry"));
            }
        }
    }
    let Some(name) = name else {
        return Err(bad("$R", "missing record-name entry"));
    };

    let arity = map.len() - 1;
    let field_names =
        contract
            .record_fields(name.as_str(), arity)
            .ok_or_else(|| TermwireError::UnknownRecord {
                name: name.as_str().to_string(),
                arity,
            })?;
    if field_names.len() != arity {
        return Err(TermwireError::ArityMismatch {
            name: name.as_str().to_string(),
            expected: field_names.len(),
            found: arity,
        });
    }

    let mut fields = Vec::with_capacity(arity);
    for field_name in &field_names {
        let mut found = None;
        for (key, value) in &map.entries {
            let FieldValue::Binary(key_bytes) = key else {
                continue;
            };
            if key_bytes.as_ref() == field_name.as_bytes() {
                if found.is_some() {
                    return Err(bad("$R", "duplicate field entry"));
                }
                found = Some(value);
            }
        }
        let Some(FieldValue::Struct(inner)) = found else {
            return Err(bad("$R", "missing or malformed field entry"));
        };
        fields.push(struct_to_term(inner, contract, atoms, safe)?);
    }

    Ok(Term::Record(Record::new(name, fields)))
}
