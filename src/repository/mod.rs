//! Record repository: a per-record-type façade binding one schema to one
//! store adapter.
//!
//! The repository owns backend selection: a schema carrying `sql: true`
//! binds to the relational engine in the [`StoreContext`], anything else to
//! the document store. The context is constructed by the caller and owns
//! the connected handles; there is no process-wide connection state.

use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::record::{Record, RecordError, RecordResult};
use crate::schema::{FieldMap, Schema};
use crate::store::{
    Cursor, DocumentAdapter, DocumentStore, Query, RelationalAdapter, RelationalEngine,
    StoreError, StoreResult,
};

/// Caller-constructed context owning the connected store handles.
#[derive(Default, Clone)]
pub struct StoreContext {
    document: Option<Arc<dyn DocumentStore>>,
    relational: Option<Arc<dyn RelationalEngine>>,
}

impl StoreContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.document = Some(store);
        self
    }

    pub fn with_relational(mut self, engine: Arc<dyn RelationalEngine>) -> Self {
        self.relational = Some(engine);
        self
    }

    pub fn document(&self) -> Option<&Arc<dyn DocumentStore>> {
        self.document.as_ref()
    }

    pub fn relational(&self) -> Option<&Arc<dyn RelationalEngine>> {
        self.relational.as_ref()
    }
}

enum Adapter {
    Document(DocumentAdapter),
    Relational(RelationalAdapter),
}

/// CRUD façade for one record type.
pub struct Repository {
    schema: Arc<Schema>,
    adapter: Adapter,
}

impl Repository {
    /// Binds a parsed schema to the matching backend from the context.
    ///
    /// Fails with `NotConnected` when the context carries no handle for
    /// the backend the schema selects.
    pub fn open(schema: Schema, context: &StoreContext) -> StoreResult<Self> {
        let schema = Arc::new(schema);

        let adapter = if schema.is_relational() {
            let engine = context
                .relational()
                .cloned()
                .ok_or(StoreError::NotConnected("relational engine"))?;
            Adapter::Relational(RelationalAdapter::new(schema.clone(), engine))
        } else {
            let store = context
                .document()
                .cloned()
                .ok_or(StoreError::NotConnected("document store"))?;
            Adapter::Document(DocumentAdapter::new(schema.clone(), store))
        };

        debug!(
            "opened repository for '{}' ({})",
            schema.name(),
            if schema.is_relational() {
                "relational"
            } else {
                "document"
            }
        );
        Ok(Self { schema, adapter })
    }

    /// Parses a schema document and binds it in one step.
    pub fn from_document(document: &Value, context: &StoreContext) -> StoreResult<Self> {
        let schema = Schema::from_document(document)?;
        Self::open(schema, context)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Constructs a new, unpersisted record bound to this repository's
    /// schema.
    pub fn new_record(&self, fields: FieldMap) -> RecordResult<Record> {
        Record::new(self.schema.clone(), fields)
    }

    /// Lazily iterates records matching the query.
    pub fn find(&self, query: Query) -> StoreResult<Cursor> {
        match &self.adapter {
            Adapter::Document(adapter) => Ok(Cursor::Document(adapter.find(query))),
            Adapter::Relational(adapter) => {
                Ok(Cursor::Relational(adapter.find(&query)?.into_iter()))
            }
        }
    }

    pub fn find_one(&self, filter: &FieldMap) -> StoreResult<Option<Record>> {
        match &self.adapter {
            Adapter::Document(adapter) => adapter.find_one(filter),
            Adapter::Relational(adapter) => adapter.find_one(filter),
        }
    }

    /// Looks up one record by identifier: `_id` for the document backend,
    /// the designated primary key for the relational backend.
    pub fn find_by_id(&self, id: &Value) -> StoreResult<Option<Record>> {
        match &self.adapter {
            Adapter::Document(adapter) => adapter.find_by_id(id),
            Adapter::Relational(adapter) => adapter.find_by_id(id),
        }
    }

    /// The most recently created match, ordered by identifier or primary
    /// key descending.
    pub fn find_latest(&self, filter: &FieldMap) -> StoreResult<Option<Record>> {
        match &self.adapter {
            Adapter::Document(adapter) => adapter.find_latest(filter),
            Adapter::Relational(adapter) => adapter.find_latest(filter),
        }
    }

    pub fn count(&self, filter: &FieldMap) -> StoreResult<u64> {
        match &self.adapter {
            Adapter::Document(adapter) => adapter.count(filter),
            Adapter::Relational(adapter) => adapter.count(filter),
        }
    }

    /// Validates and persists the record, replacing its stored counterpart
    /// when one exists.
    pub fn save(&self, record: &mut Record) -> StoreResult<()> {
        match &self.adapter {
            Adapter::Document(adapter) => adapter.save(record),
            Adapter::Relational(adapter) => adapter.save(record),
        }
    }

    /// Removes the record's stored counterpart.
    pub fn delete(&self, record: &mut Record) -> StoreResult<bool> {
        match &self.adapter {
            Adapter::Document(adapter) => adapter.delete(record),
            Adapter::Relational(adapter) => adapter.delete(record),
        }
    }

    /// Constructs and persists a batch of records in one store call.
    pub fn bulk_create(&self, batch: Vec<FieldMap>) -> StoreResult<Vec<Record>> {
        let mut records = batch
            .into_iter()
            .map(|fields| Record::new(self.schema.clone(), fields))
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)?;

        match &self.adapter {
            Adapter::Document(adapter) => adapter.bulk_insert(&mut records)?,
            Adapter::Relational(adapter) => adapter.bulk_insert(&mut records)?,
        }
        Ok(records)
    }

    /// Looks up one record, constructing and persisting it on a miss from
    /// the schema's default object merged with the filter.
    ///
    /// Not atomic: concurrent callers may both observe a miss and both
    /// insert. Callers needing uniqueness must enforce it with a
    /// store-level constraint.
    pub fn find_or_create(&self, filter: &FieldMap) -> StoreResult<Record> {
        if let Some(record) = self.find_one(filter)? {
            return Ok(record);
        }

        debug!(
            "find_or_create miss on '{}', creating from defaults",
            self.schema.name()
        );
        let mut seed = self.schema.default_object().clone();
        for (key, value) in filter {
            seed.insert(key.clone(), value.clone());
        }

        let mut record = Record::new(self.schema.clone(), seed)?;
        self.save(&mut record)?;
        Ok(record)
    }

    /// Re-fetches the record's persisted state by identifier.
    ///
    /// Fails with `NotPersisted` when the record has never been saved or
    /// has been deleted since it was last fetched.
    pub fn reload(&self, record: &mut Record) -> StoreResult<()> {
        let fetched = match &self.adapter {
            Adapter::Document(adapter) => {
                let ident = record.identifier().ok_or_else(|| {
                    RecordError::NotPersisted("record has never been saved".into())
                })?;
                adapter.find_by_id(&ident.to_value())?
            }
            Adapter::Relational(adapter) => {
                let value = record
                    .primary_value()
                    .cloned()
                    .ok_or_else(|| {
                        RecordError::NotPersisted("record carries no primary-key value".into())
                    })?;
                adapter.find_by_id(&value)?
            }
        };

        match fetched {
            Some(fresh) => {
                record.adopt(fresh);
                Ok(())
            }
            None => Err(RecordError::NotPersisted(
                "no stored record with this identifier".into(),
            )
            .into()),
        }
    }
}
