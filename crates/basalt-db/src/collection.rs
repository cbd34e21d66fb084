//! The collection core: public operations over an abstract document
//! store, a set of secondary indexes, and the query/update engines.
//!
//! Locking: structural operations (insert, update, delete, upsert,
//! findAndModify) serialize on a collection-wide mutex. Readers run
//! against store snapshots and take the index list as a shared view, so
//! they never block each other. Index checks always run before any
//! mutation; a failed operation leaves store and indexes untouched.

use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use basalt_query::{matcher, path, value, SortDirection, SortSpec};
use basalt_store::{DocKey, DocStore, MemoryStore};
use bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DbError;
use crate::index::{CollectionIndex, UniqueIndex};
use crate::projection::project_document;
use crate::record;
use crate::update;

fn default_id_field() -> String {
    "_id".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub database: String,
    pub name: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            database: String::new(),
            name: String::new(),
            id_field: default_id_field(),
        }
    }
}

type IndexList = Vec<Box<dyn CollectionIndex>>;

pub struct Collection<S: DocStore = MemoryStore> {
    database: String,
    name: String,
    id_field: String,
    store: S,
    indexes: RwLock<IndexList>,
    write_lock: Mutex<()>,
}

impl Collection<MemoryStore> {
    /// Create an in-memory collection with a unique index on the
    /// identifier field.
    pub fn new(config: CollectionConfig) -> Self {
        Self::with_store(config, MemoryStore::new())
    }
}

impl<S: DocStore> Collection<S> {
    pub fn with_store(config: CollectionConfig, store: S) -> Self {
        let id_index = UniqueIndex::new(format!("{}_", config.id_field), config.id_field.clone());
        let indexes: IndexList = vec![Box::new(id_index)];
        Self {
            database: config.database,
            name: config.name,
            id_field: config.id_field,
            store,
            indexes: RwLock::new(indexes),
            write_lock: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Register a secondary index. Setup-time operation: existing
    /// documents are not backfilled.
    pub fn add_index(&self, index: Box<dyn CollectionIndex>) -> Result<(), DbError> {
        self.indexes_write()?.push(index);
        Ok(())
    }

    pub fn num_indexes(&self) -> usize {
        self.indexes_read().map(|i| i.len()).unwrap_or(0)
    }

    // ── Public operations ──────────────────────────────────────

    /// Insert documents in order, stopping at the first failure.
    /// Documents inserted before the failure remain present.
    pub fn insert_documents(&self, documents: Vec<Document>) -> Result<usize, DbError> {
        let _guard = self.lock_write()?;
        let mut inserted = 0;
        for document in documents {
            let prepared = record::prepare_for_insert(document, &self.id_field)?;
            self.add_document(&prepared)?;
            inserted += 1;
        }
        debug!(collection = %self.full_name(), count = inserted, "inserted documents");
        Ok(inserted)
    }

    /// Evaluate a query object (optionally wrapped with `query`/`orderby`
    /// or `$query`/`$orderby`), returning matched documents after sort,
    /// skip, limit and projection. A negative limit reads as its absolute
    /// value; zero means unlimited.
    pub fn handle_query(
        &self,
        query_object: &Document,
        skip: usize,
        limit: i64,
        field_selector: Option<&Document>,
    ) -> Result<Vec<Document>, DbError> {
        let (query, orderby) = extract_query(query_object)?;
        if self.store.is_empty() {
            return Ok(Vec::new());
        }

        let matched = self.sorted_matches(query, orderby, skip, limit)?;
        let documents = matched.into_iter().map(|(_, doc)| doc);
        match field_selector {
            Some(selector) if !selector.is_empty() => Ok(documents
                .map(|doc| project_document(&doc, selector, &self.id_field))
                .collect()),
            _ => Ok(documents.collect()),
        }
    }

    /// Atomically modify or remove the first matching document.
    pub fn find_and_modify(&self, spec: &Document) -> Result<Document, DbError> {
        let _guard = self.lock_write()?;

        if !spec.contains_key("remove") && !spec.contains_key("update") {
            return Err(DbError::BadValue("need remove or update".into()));
        }
        let return_new = value::is_true(spec.get("new"));

        let empty = Document::new();
        let query = match spec.get("query") {
            Some(Bson::Document(query)) => query,
            Some(_) => return Err(DbError::BadValue("query must be a document".into())),
            None => &empty,
        };
        let orderby = match spec.get("sort") {
            Some(Bson::Document(sort)) => Some(sort),
            Some(_) => return Err(DbError::BadValue("sort must be a document".into())),
            None => None,
        };

        let mut last_error_object = None;
        let mut return_document = None;
        let mut matched_any = false;

        if let Some((key, document)) = self.sorted_matches(query, orderby, 0, 1)?.into_iter().next()
        {
            matched_any = true;
            if value::is_true(spec.get("remove")) {
                self.remove_document(key, &document)?;
                return_document = Some(document);
            } else if let Some(update) = spec.get("update") {
                let Bson::Document(update) = update else {
                    return Err(DbError::BadValue("update must be a document".into()));
                };
                let match_pos = matcher::match_position(&document, query)?;
                let old_document = self.update_document(key, &document, update, match_pos)?;
                return_document = if return_new {
                    match self.store.fetch(key)? {
                        Some(blob) => Some(from_blob(&blob)?),
                        None => Some(old_document),
                    }
                } else {
                    Some(old_document)
                };
                last_error_object = Some(doc! { "updatedExisting": true, "n": 1 });
            }
        }

        if !matched_any && value::is_true(spec.get("upsert")) {
            let Some(Bson::Document(update)) = spec.get("update") else {
                return Err(DbError::BadValue("update must be a document".into()));
            };
            let new_document = self.upsert(update, query)?;
            return_document = if return_new {
                Some(new_document)
            } else {
                Some(Document::new())
            };
        }

        let return_document = match (spec.get("fields"), return_document) {
            (Some(Bson::Document(fields)), Some(doc)) => {
                Some(project_document(&doc, fields, &self.id_field))
            }
            (Some(Bson::Document(_)), None) => None,
            (Some(_), _) => return Err(DbError::BadValue("fields must be a document".into())),
            (None, doc) => doc,
        };

        let mut result = Document::new();
        if let Some(last_error_object) = last_error_object {
            result.insert("lastErrorObject", last_error_object);
        }
        result.insert(
            "value",
            return_document.map(Bson::Document).unwrap_or(Bson::Null),
        );
        result.insert("ok", 1);
        Ok(result)
    }

    /// Update matching documents. Returns `{ upserted?, n,
    /// updatedExisting }`.
    pub fn update_documents(
        &self,
        selector: &Document,
        update: &Document,
        is_multi: bool,
        is_upsert: bool,
    ) -> Result<Document, DbError> {
        let _guard = self.lock_write()?;

        if is_multi {
            for key in update.keys() {
                if !key.starts_with('$') {
                    return Err(DbError::MultiUpdateRequiresOperators);
                }
            }
        }

        let mut n: i32 = 0;
        let mut updated_existing = false;
        for (key, document) in self.find_candidates(selector)? {
            let match_pos = matcher::match_position(&document, selector)?;
            self.update_document(key, &document, update, match_pos)?;
            updated_existing = true;
            n += 1;
            if !is_multi {
                break;
            }
        }

        let mut result = Document::new();
        if n == 0 && is_upsert {
            let new_document = self.upsert(update, selector)?;
            let id_pinned = selector
                .get(&self.id_field)
                .is_some_and(|v| !value::contains_query_expression(v));
            if !id_pinned {
                result.insert(
                    "upserted",
                    new_document.get(&self.id_field).cloned().unwrap_or(Bson::Null),
                );
            }
            n += 1;
        }
        debug!(collection = %self.full_name(), n, updated_existing, "updated documents");

        result.insert("n", n);
        result.insert("updatedExisting", updated_existing);
        Ok(result)
    }

    /// Delete matching documents, up to `limit` when positive. Returns
    /// the number deleted.
    pub fn delete_documents(&self, selector: &Document, limit: i64) -> Result<usize, DbError> {
        let _guard = self.lock_write()?;
        let (query, orderby) = extract_query(selector)?;
        let matched = self.sorted_matches(query, orderby, 0, limit)?;
        let mut removed = 0;
        for (key, document) in &matched {
            self.remove_document(*key, document)?;
            removed += 1;
        }
        debug!(collection = %self.full_name(), count = removed, "deleted documents");
        Ok(removed)
    }

    /// Distinct values at `key` across matching documents, sorted and
    /// deduplicated by value order. Returns `{ values, ok: 1 }`.
    pub fn handle_distinct(&self, query: &Document) -> Result<Document, DbError> {
        let key = match query.get("key") {
            Some(Bson::String(key)) => key.clone(),
            Some(other) => other.to_string(),
            None => return Err(DbError::BadValue("need 'key' field for distinct".into())),
        };
        let empty = Document::new();
        let sub_query = match query.get("query") {
            Some(Bson::Document(sub_query)) => sub_query,
            _ => &empty,
        };

        let mut values: Vec<Bson> = Vec::new();
        for (_, document) in self.find_candidates(sub_query)? {
            if path::has(&document, &key)? {
                if let Some(v) = path::get(&document, &key) {
                    values.push(v.clone());
                }
            }
        }
        values.sort_by(|a, b| value::compare(a, b));
        values.dedup_by(|a, b| value::compare(a, b) == Ordering::Equal);

        Ok(doc! { "values": values, "ok": 1 })
    }

    /// Number of live documents.
    pub fn count(&self) -> usize {
        self.store.len()
    }

    /// Number of documents matching `query`.
    pub fn count_matching(&self, query: &Document) -> Result<usize, DbError> {
        if query.is_empty() {
            return Ok(self.count());
        }
        Ok(self.find_candidates(query)?.len())
    }

    pub fn get_stats(&self) -> Result<Document, DbError> {
        let indexes = self.indexes_read()?;
        let count = self.count();
        let data_size = self.store.data_size() as i64;
        let avg_obj_size = if count > 0 {
            data_size as f64 / count as f64
        } else {
            0.0
        };

        let mut index_sizes = Document::new();
        for index in indexes.iter() {
            index_sizes.insert(index.name(), index.data_size() as i64);
        }

        Ok(doc! {
            "ns": self.full_name(),
            "count": count as i32,
            "size": data_size,
            "avgObjSize": avg_obj_size,
            "storageSize": 0,
            "numExtents": 0,
            "nindexes": indexes.len() as i32,
            "indexSize": index_sizes,
            "ok": 1,
        })
    }

    pub fn validate(&self) -> Result<Document, DbError> {
        let indexes = self.indexes_read()?;

        let mut keys_per_index = Document::new();
        for index in indexes.iter() {
            keys_per_index.insert(index.name(), index.count() as i64);
        }

        Ok(doc! {
            "ns": self.full_name(),
            "extentCount": 0,
            "datasize": self.store.data_size() as i64,
            "nrecords": self.store.len() as i32,
            "padding": 1,
            "deletedCount": self.store.removed_count() as i32,
            "deletedSize": 0,
            "nIndexes": indexes.len() as i32,
            "keysPerIndex": keys_per_index,
            "valid": true,
            "errors": [],
            "ok": 1,
        })
    }

    // ── Internals ──────────────────────────────────────────────

    fn lock_write(&self) -> Result<MutexGuard<'_, ()>, DbError> {
        self.write_lock
            .lock()
            .map_err(|e| DbError::Internal(format!("write lock poisoned: {e}")))
    }

    fn indexes_read(&self) -> Result<RwLockReadGuard<'_, IndexList>, DbError> {
        self.indexes
            .read()
            .map_err(|e| DbError::Internal(format!("index lock poisoned: {e}")))
    }

    fn indexes_write(&self) -> Result<RwLockWriteGuard<'_, IndexList>, DbError> {
        self.indexes
            .write()
            .map_err(|e| DbError::Internal(format!("index lock poisoned: {e}")))
    }

    /// Matching documents with their storage keys, narrowed through the
    /// first index that can answer the query.
    fn find_candidates(&self, query: &Document) -> Result<Vec<(DocKey, Document)>, DbError> {
        let index_keys = {
            let indexes = self.indexes_read()?;
            indexes
                .iter()
                .find(|index| index.can_handle(query))
                .map(|index| index.keys(query))
        };

        let mut candidates = Vec::new();
        match index_keys {
            Some(keys) => {
                for key in keys {
                    if let Some(blob) = self.store.fetch(key)? {
                        candidates.push((key, from_blob(&blob)?));
                    }
                }
            }
            None => {
                for (key, blob) in self.store.scan() {
                    candidates.push((key, from_blob(&blob)?));
                }
            }
        }

        let mut matched = Vec::new();
        for (key, document) in candidates {
            if matcher::matches(&document, query)? {
                matched.push((key, document));
            }
        }
        Ok(matched)
    }

    fn sorted_matches(
        &self,
        query: &Document,
        orderby: Option<&Document>,
        skip: usize,
        limit: i64,
    ) -> Result<Vec<(DocKey, Document)>, DbError> {
        let mut matched = self.find_candidates(query)?;

        if let Some(orderby) = orderby {
            if !orderby.is_empty() {
                match SortSpec::from_document(orderby) {
                    SortSpec::Natural(SortDirection::Asc) => {}
                    SortSpec::Natural(SortDirection::Desc) => matched.reverse(),
                    spec => matched.sort_by(|(_, a), (_, b)| spec.compare(a, b)),
                }
            }
        }

        let limit = limit.unsigned_abs() as usize;
        let skipped = matched.into_iter().skip(skip);
        Ok(if limit > 0 {
            skipped.take(limit).collect()
        } else {
            skipped.collect()
        })
    }

    /// Caller must hold the write lock.
    fn add_document(&self, document: &Document) -> Result<DocKey, DbError> {
        let blob = to_blob(document)?;
        let mut indexes = self.indexes_write()?;
        for index in indexes.iter() {
            index.check_add(document)?;
        }
        let key = self.store.insert(blob)?;
        for index in indexes.iter_mut() {
            index.add(document, key)?;
        }
        Ok(key)
    }

    /// Caller must hold the write lock.
    fn remove_document(&self, key: DocKey, document: &Document) -> Result<(), DbError> {
        let mut indexes = self.indexes_write()?;
        for index in indexes.iter_mut() {
            index.remove(document);
        }
        self.store.remove(key)?;
        Ok(())
    }

    /// Compute the post-image, check every index, then apply. Returns
    /// the pre-image. Caller must hold the write lock.
    fn update_document(
        &self,
        key: DocKey,
        old: &Document,
        update: &Document,
        match_pos: Option<usize>,
    ) -> Result<Document, DbError> {
        let new_document = update::calculate_update(old, update, match_pos, false, &self.id_field)?;
        if value::documents_equal(&new_document, old) {
            return Ok(old.clone());
        }

        let blob = to_blob(&new_document)?;
        let mut indexes = self.indexes_write()?;
        for index in indexes.iter() {
            index.check_update(old, &new_document)?;
        }
        for index in indexes.iter_mut() {
            index.update_in_place(old, &new_document, key)?;
        }
        self.store.replace(key, blob)?;
        Ok(old.clone())
    }

    /// Caller must hold the write lock.
    fn upsert(&self, update: &Document, selector: &Document) -> Result<Document, DbError> {
        let seed = self.convert_selector_to_document(selector)?;
        let mut new_document =
            update::calculate_update(&seed, update, None, true, &self.id_field)?;
        if matches!(new_document.get(&self.id_field), None | Some(Bson::Null)) {
            new_document.insert(self.id_field.clone(), self.derive_document_id(selector));
        }
        let prepared = record::prepare_for_insert(new_document, &self.id_field)?;
        self.add_document(&prepared)?;
        debug!(collection = %self.full_name(), "upserted document");
        Ok(prepared)
    }

    /// Seed document for an upsert: the selector minus `$`-prefixed keys
    /// and minus values containing query expressions.
    fn convert_selector_to_document(&self, selector: &Document) -> Result<Document, DbError> {
        let mut document = Document::new();
        for (key, val) in selector {
            if key.starts_with('$') || value::contains_query_expression(val) {
                continue;
            }
            path::set(&mut document, key, val.clone(), &mut None)?;
        }
        Ok(document)
    }

    /// Identifier for an upserted document: a concrete selector value,
    /// the first `$in` alternative, or a fresh object id.
    fn derive_document_id(&self, selector: &Document) -> Bson {
        match selector.get(&self.id_field) {
            Some(id) if !value::contains_query_expression(id) => id.clone(),
            Some(Bson::Document(expression)) => {
                if let Some(Bson::Array(alternatives)) = expression.get("$in") {
                    if let Some(first) = alternatives.first() {
                        return first.clone();
                    }
                }
                Bson::ObjectId(bson::oid::ObjectId::new())
            }
            _ => Bson::ObjectId(bson::oid::ObjectId::new()),
        }
    }
}

/// Unwrap `query`/`orderby` (or `$query`/`$orderby`) wrappers; a bare
/// document is the query itself.
fn extract_query(query_object: &Document) -> Result<(&Document, Option<&Document>), DbError> {
    let unwrap_pair = |query_key: &str, orderby_key: &str| {
        let query = match query_object.get(query_key) {
            Some(Bson::Document(query)) => query,
            _ => return Err(DbError::BadValue(format!("{query_key} must be a document"))),
        };
        let orderby = match query_object.get(orderby_key) {
            Some(Bson::Document(orderby)) => Some(orderby),
            _ => None,
        };
        Ok((query, orderby))
    };

    if query_object.contains_key("query") {
        unwrap_pair("query", "orderby")
    } else if query_object.contains_key("$query") {
        unwrap_pair("$query", "$orderby")
    } else {
        Ok((query_object, None))
    }
}

fn to_blob(document: &Document) -> Result<Vec<u8>, DbError> {
    Ok(bson::serialize_to_vec(document)?)
}

fn from_blob(blob: &[u8]) -> Result<Document, DbError> {
    Ok(bson::deserialize_from_slice(blob)?)
}
