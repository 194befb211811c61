//! Document-store adapter.
//!
//! The adapter maps the abstract query descriptor directly onto the
//! collaborator handle's native filter/sort/skip/limit primitives and
//! constructs materialized records from whatever comes back.

use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::ident::ObjectIdent;
use crate::record::{Record, RecordError, ID_FIELD};
use crate::schema::{FieldMap, Schema};

use super::errors::{StoreError, StoreResult};
use super::query::{Query, SortOrder};

/// Native find options understood by a document-store handle.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Option<(String, SortOrder)>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// A connected, collection-scoped document-store handle.
///
/// Implementations are expected to be independently thread-safe; this
/// layer adds no locking or ordering of its own.
pub trait DocumentStore: Send + Sync {
    /// Documents matching every equality predicate in `filter`, windowed
    /// and ordered per `options`. Insertion order when no sort is given.
    fn find(&self, filter: &FieldMap, options: &FindOptions) -> StoreResult<Vec<FieldMap>>;

    /// The first document matching the filter.
    fn find_one(&self, filter: &FieldMap) -> StoreResult<Option<FieldMap>>;

    /// Stores a new document, assigning an identifier when `_id` is absent.
    fn insert(&self, document: FieldMap) -> StoreResult<ObjectIdent>;

    /// Stores a batch of new documents.
    fn insert_many(&self, documents: Vec<FieldMap>) -> StoreResult<Vec<ObjectIdent>>;

    /// Replaces the document with the same `_id`, or inserts when the
    /// identifier is absent or unknown.
    fn save(&self, document: FieldMap) -> StoreResult<ObjectIdent>;

    /// Removes the first document matching the filter.
    fn delete_one(&self, filter: &FieldMap) -> StoreResult<bool>;

    /// Number of documents matching the filter.
    fn count_documents(&self, filter: &FieldMap) -> StoreResult<u64>;
}

/// Translates queries and records for one schema onto a document store.
pub struct DocumentAdapter {
    schema: Arc<Schema>,
    store: Arc<dyn DocumentStore>,
}

impl DocumentAdapter {
    pub fn new(schema: Arc<Schema>, store: Arc<dyn DocumentStore>) -> Self {
        Self { schema, store }
    }

    /// Lazily iterates records matching the query.
    ///
    /// With `batch_size` set and no explicit skip/limit, iteration runs in
    /// fixed-size pages against the same filter until a page comes back
    /// empty. The pages are separate store calls: a matching set mutated
    /// between pages may be observed with skips or duplicates, and no
    /// stable snapshot is guaranteed.
    pub fn find(&self, query: Query) -> DocumentCursor {
        let mode = match query.batched() {
            Some(page_size) => Mode::Batched {
                page_size,
                offset: 0,
            },
            None => Mode::Plain {
                skip: query.skip_option(),
                limit: query.limit_option(),
            },
        };
        DocumentCursor {
            schema: self.schema.clone(),
            store: self.store.clone(),
            sort: query.sort_option().cloned(),
            filter: query.filter().clone(),
            mode,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    pub fn find_one(&self, filter: &FieldMap) -> StoreResult<Option<Record>> {
        match self.store.find_one(filter)? {
            Some(document) => Ok(Some(Record::materialize(self.schema.clone(), document)?)),
            None => Ok(None),
        }
    }

    pub fn find_by_id(&self, id: &Value) -> StoreResult<Option<Record>> {
        let ident = ObjectIdent::from_value(id).map_err(RecordError::from)?;
        let mut filter = FieldMap::new();
        filter.insert(ID_FIELD.to_string(), ident.to_value());
        self.find_one(&filter)
    }

    /// The most recently created match: identifier descending, limit one.
    pub fn find_latest(&self, filter: &FieldMap) -> StoreResult<Option<Record>> {
        let options = FindOptions {
            sort: Some((ID_FIELD.to_string(), SortOrder::Descending)),
            skip: None,
            limit: Some(1),
        };
        match self.store.find(filter, &options)?.into_iter().next() {
            Some(document) => Ok(Some(Record::materialize(self.schema.clone(), document)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self, filter: &FieldMap) -> StoreResult<u64> {
        self.store.count_documents(filter)
    }

    /// Validates and stores the record, replacing the persisted document
    /// with the same identifier or inserting a new one.
    pub fn save(&self, record: &mut Record) -> StoreResult<()> {
        record.validate().map_err(RecordError::from)?;
        let ident = self.store.save(record.fields().clone())?;
        debug!("saved document {} in '{}'", ident, self.schema.name());
        record.assign_identifier(ident);
        Ok(())
    }

    /// Validates and inserts the record as a new document.
    pub fn insert(&self, record: &mut Record) -> StoreResult<()> {
        record.validate().map_err(RecordError::from)?;
        let ident = self.store.insert(record.fields().clone())?;
        record.assign_identifier(ident);
        Ok(())
    }

    pub fn delete(&self, record: &mut Record) -> StoreResult<bool> {
        let ident = record.identifier().ok_or_else(|| {
            RecordError::NotPersisted("record has no identifier to delete by".into())
        })?;
        let mut filter = FieldMap::new();
        filter.insert(ID_FIELD.to_string(), ident.to_value());
        let deleted = self.store.delete_one(&filter)?;
        if deleted {
            record.mark_unpersisted();
        }
        Ok(deleted)
    }

    /// Validates and inserts a batch of records in one store call.
    pub fn bulk_insert(&self, records: &mut [Record]) -> StoreResult<()> {
        for record in records.iter() {
            record.validate().map_err(RecordError::from)?;
        }
        let documents: Vec<FieldMap> = records.iter().map(|r| r.fields().clone()).collect();
        let idents = self.store.insert_many(documents)?;
        for (record, ident) in records.iter_mut().zip(idents) {
            record.assign_identifier(ident);
        }
        Ok(())
    }
}

enum Mode {
    Plain {
        skip: Option<u64>,
        limit: Option<u64>,
    },
    Batched {
        page_size: u64,
        offset: u64,
    },
}

/// Lazy sequence of records from a document-store find.
///
/// Each page fetch blocks on the underlying store call; dropping the
/// cursor is the only cancellation.
pub struct DocumentCursor {
    schema: Arc<Schema>,
    store: Arc<dyn DocumentStore>,
    filter: FieldMap,
    sort: Option<(String, SortOrder)>,
    mode: Mode,
    buffer: VecDeque<FieldMap>,
    done: bool,
}

impl Iterator for DocumentCursor {
    type Item = StoreResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(document) = self.buffer.pop_front() {
                return Some(
                    Record::materialize(self.schema.clone(), document).map_err(StoreError::from),
                );
            }
            if self.done {
                return None;
            }

            let options = match &self.mode {
                Mode::Plain { skip, limit } => FindOptions {
                    sort: self.sort.clone(),
                    skip: *skip,
                    limit: *limit,
                },
                Mode::Batched { page_size, offset } => {
                    debug!(
                        "fetching page at offset {} (size {}) from '{}'",
                        offset,
                        page_size,
                        self.schema.name()
                    );
                    FindOptions {
                        sort: self.sort.clone(),
                        skip: Some(*offset),
                        limit: Some(*page_size),
                    }
                }
            };

            match self.store.find(&self.filter, &options) {
                Ok(documents) => match &mut self.mode {
                    Mode::Plain { .. } => {
                        self.done = true;
                        if documents.is_empty() {
                            return None;
                        }
                        self.buffer.extend(documents);
                    }
                    Mode::Batched { page_size, offset } => {
                        if documents.is_empty() {
                            self.done = true;
                            return None;
                        }
                        *offset += *page_size;
                        self.buffer.extend(documents);
                    }
                },
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
