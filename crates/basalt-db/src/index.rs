//! Secondary indexes: candidate-set narrowing plus uniqueness checks.
//!
//! Indexes answer "which stored keys might match this query" and enforce
//! uniqueness on add/update. Checks always run before any mutation so a
//! failed operation leaves both index and store untouched.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use basalt_query::{path, value};
use basalt_store::DocKey;
use bson::{Bson, Document};

use crate::error::DbError;

/// Index over a collection's documents.
///
/// `check_*` methods are side-effect free; the collection calls them for
/// every index before mutating any of them.
pub trait CollectionIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Can this index narrow the candidate set for `query`?
    fn can_handle(&self, query: &Document) -> bool;

    /// Candidate storage keys for `query`. Only meaningful when
    /// [`can_handle`](Self::can_handle) returned true.
    fn keys(&self, query: &Document) -> Vec<DocKey>;

    /// Fails when adding `document` would violate a constraint.
    fn check_add(&self, document: &Document) -> Result<(), DbError>;

    fn add(&mut self, document: &Document, key: DocKey) -> Result<(), DbError>;

    /// Fails when replacing `old` with `new` would violate a constraint.
    fn check_update(&self, old: &Document, new: &Document) -> Result<(), DbError>;

    /// Move the entry for `old` to reflect `new`, stored under `key`.
    fn update_in_place(
        &mut self,
        old: &Document,
        new: &Document,
        key: DocKey,
    ) -> Result<(), DbError>;

    /// Remove the entry for `document`, returning its storage key.
    fn remove(&mut self, document: &Document) -> Option<DocKey>;

    fn count(&self) -> usize;

    fn data_size(&self) -> u64;
}

// ── Normalized index keys ───────────────────────────────────────

/// f64 wrapper with a total order so normalized numbers can key a
/// BTreeMap.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for OrderedFloat {}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Normalized form of an indexed value. Numbers of all kinds collapse to
/// their f64 value so `1`, `1_i64` and `1.0` collide as MongoDB requires.
/// Variant order mirrors the cross-type value ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum IndexKey {
    Null,
    Number(OrderedFloat),
    String(String),
    Document(Vec<(String, IndexKey)>),
    Array(Vec<IndexKey>),
    Binary(Vec<u8>),
    ObjectId([u8; 12]),
    Bool(bool),
    DateTime(i64),
    Timestamp(u64),
    Other(String),
}

impl From<&Bson> for IndexKey {
    fn from(value: &Bson) -> Self {
        match value {
            Bson::Null | Bson::Undefined => IndexKey::Null,
            n if value::is_number(n) => {
                IndexKey::Number(OrderedFloat(value::as_f64(n).unwrap_or(0.0)))
            }
            Bson::String(s) => IndexKey::String(s.clone()),
            Bson::Symbol(s) => IndexKey::String(s.clone()),
            Bson::Document(doc) => IndexKey::Document(
                doc.iter()
                    .map(|(k, v)| (k.clone(), IndexKey::from(v)))
                    .collect(),
            ),
            Bson::Array(items) => IndexKey::Array(items.iter().map(IndexKey::from).collect()),
            Bson::Binary(b) => IndexKey::Binary(b.bytes.clone()),
            Bson::ObjectId(oid) => IndexKey::ObjectId(oid.bytes()),
            Bson::Boolean(b) => IndexKey::Bool(*b),
            Bson::DateTime(dt) => IndexKey::DateTime(dt.timestamp_millis()),
            Bson::Timestamp(ts) => {
                IndexKey::Timestamp((u64::from(ts.time) << 32) | u64::from(ts.increment))
            }
            other => IndexKey::Other(format!("{other:?}")),
        }
    }
}

impl IndexKey {
    fn size_estimate(&self) -> u64 {
        let payload = match self {
            IndexKey::Null | IndexKey::Bool(_) => 1,
            IndexKey::Number(_) | IndexKey::DateTime(_) | IndexKey::Timestamp(_) => 8,
            IndexKey::String(s) | IndexKey::Other(s) => s.len() as u64,
            IndexKey::Binary(b) => b.len() as u64,
            IndexKey::ObjectId(_) => 12,
            IndexKey::Document(entries) => entries
                .iter()
                .map(|(k, v)| k.len() as u64 + v.size_estimate())
                .sum(),
            IndexKey::Array(items) => items.iter().map(IndexKey::size_estimate).sum(),
        };
        payload + 8
    }
}

// ── UniqueIndex ─────────────────────────────────────────────────

/// Single-field unique index. Sparse: documents missing the field carry
/// no entry and take no part in uniqueness checks.
pub struct UniqueIndex {
    name: String,
    key_field: String,
    entries: BTreeMap<IndexKey, DocKey>,
}

impl UniqueIndex {
    pub fn new(name: impl Into<String>, key_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_field: key_field.into(),
            entries: BTreeMap::new(),
        }
    }

    fn key_of(&self, document: &Document) -> Option<IndexKey> {
        path::get(document, &self.key_field).map(IndexKey::from)
    }
}

impl CollectionIndex for UniqueIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, query: &Document) -> bool {
        if query.len() != 1 {
            return false;
        }
        let Some(condition) = query.get(&self.key_field) else {
            return false;
        };
        match condition {
            // Missing fields carry no entry, so null lookups cannot be
            // answered from the index.
            Bson::Null | Bson::Undefined => false,
            // An operator document can only be answered for pure $in.
            Bson::Document(operator_doc) => {
                if !operator_doc.keys().all(|k| k == "$in" || !k.starts_with('$')) {
                    return false;
                }
                match operator_doc.get("$in") {
                    Some(Bson::Array(alternatives)) => !alternatives
                        .iter()
                        .any(|v| matches!(v, Bson::Null | Bson::Undefined)),
                    _ => true,
                }
            }
            _ => true,
        }
    }

    fn keys(&self, query: &Document) -> Vec<DocKey> {
        let Some(condition) = query.get(&self.key_field) else {
            return Vec::new();
        };
        let lookups: Vec<IndexKey> = match condition {
            Bson::Document(doc) => match doc.get("$in") {
                Some(Bson::Array(alternatives)) => {
                    alternatives.iter().map(IndexKey::from).collect()
                }
                Some(_) => Vec::new(),
                None => vec![IndexKey::from(condition)],
            },
            other => vec![IndexKey::from(other)],
        };
        lookups
            .iter()
            .filter_map(|k| self.entries.get(k).copied())
            .collect()
    }

    fn check_add(&self, document: &Document) -> Result<(), DbError> {
        // A document without the indexed field is not indexed at all.
        let Some(value) = path::get(document, &self.key_field) else {
            return Ok(());
        };
        if self.entries.contains_key(&IndexKey::from(value)) {
            return Err(DbError::DuplicateKey {
                index: self.name.clone(),
                key: value.clone(),
            });
        }
        Ok(())
    }

    fn add(&mut self, document: &Document, key: DocKey) -> Result<(), DbError> {
        if let Some(index_key) = self.key_of(document) {
            self.entries.insert(index_key, key);
        }
        Ok(())
    }

    fn check_update(&self, old: &Document, new: &Document) -> Result<(), DbError> {
        if self.key_of(old) == self.key_of(new) {
            return Ok(());
        }
        self.check_add(new)
    }

    fn update_in_place(
        &mut self,
        old: &Document,
        new: &Document,
        key: DocKey,
    ) -> Result<(), DbError> {
        let old_key = self.key_of(old);
        let new_key = self.key_of(new);
        if old_key == new_key {
            return Ok(());
        }
        if let Some(old_key) = old_key {
            self.entries.remove(&old_key);
        }
        if let Some(new_key) = new_key {
            self.entries.insert(new_key, key);
        }
        Ok(())
    }

    fn remove(&mut self, document: &Document) -> Option<DocKey> {
        let index_key = self.key_of(document)?;
        self.entries.remove(&index_key)
    }

    fn count(&self) -> usize {
        self.entries.len()
    }

    fn data_size(&self) -> u64 {
        self.entries
            .iter()
            .map(|(k, _)| k.size_estimate() + std::mem::size_of::<DocKey>() as u64)
            .sum()
    }
}
