//! In-memory document store.
//!
//! A collection-scoped `DocumentStore` backed by an `RwLock`ed vector in
//! insertion order. Suitable for tests and embedded use; connection setup
//! for networked stores is the caller's concern.

use std::cmp::Ordering;
use std::sync::RwLock;

use serde_json::Value;

use crate::ident::ObjectIdent;
use crate::record::{RecordError, ID_FIELD};
use crate::schema::FieldMap;

use super::document::{DocumentStore, FindOptions};
use super::errors::{StoreError, StoreResult};
use super::query::SortOrder;

/// One in-memory collection of documents.
#[derive(Default)]
pub struct MemoryCollection {
    documents: RwLock<Vec<FieldMap>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every stored document.
    pub fn clear(&self) -> StoreResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Vec<FieldMap>>> {
        self.documents
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Vec<FieldMap>>> {
        self.documents
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn store_new(documents: &mut Vec<FieldMap>, mut document: FieldMap) -> StoreResult<ObjectIdent> {
        let ident = match document.get(ID_FIELD) {
            Some(value) => {
                let ident = ObjectIdent::from_value(value).map_err(RecordError::from)?;
                if documents.iter().any(|doc| has_id(doc, &ident)) {
                    return Err(StoreError::Backend(format!(
                        "duplicate identifier {}",
                        ident
                    )));
                }
                ident
            }
            None => ObjectIdent::generate(),
        };
        document.insert(ID_FIELD.to_string(), ident.to_value());
        documents.push(document);
        Ok(ident)
    }
}

impl DocumentStore for MemoryCollection {
    fn find(&self, filter: &FieldMap, options: &FindOptions) -> StoreResult<Vec<FieldMap>> {
        let documents = self.read()?;
        let mut matches: Vec<FieldMap> = documents
            .iter()
            .filter(|doc| matches_filter(doc, filter))
            .cloned()
            .collect();

        if let Some((field, order)) = &options.sort {
            matches.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        let skip = options.skip.unwrap_or(0) as usize;
        let matches = matches.into_iter().skip(skip);
        Ok(match options.limit {
            Some(limit) => matches.take(limit as usize).collect(),
            None => matches.collect(),
        })
    }

    fn find_one(&self, filter: &FieldMap) -> StoreResult<Option<FieldMap>> {
        let documents = self.read()?;
        Ok(documents
            .iter()
            .find(|doc| matches_filter(doc, filter))
            .cloned())
    }

    fn insert(&self, document: FieldMap) -> StoreResult<ObjectIdent> {
        let mut documents = self.write()?;
        Self::store_new(&mut documents, document)
    }

    fn insert_many(&self, batch: Vec<FieldMap>) -> StoreResult<Vec<ObjectIdent>> {
        let mut documents = self.write()?;
        let mut idents = Vec::with_capacity(batch.len());
        for document in batch {
            idents.push(Self::store_new(&mut documents, document)?);
        }
        Ok(idents)
    }

    fn save(&self, mut document: FieldMap) -> StoreResult<ObjectIdent> {
        let mut documents = self.write()?;

        if let Some(value) = document.get(ID_FIELD) {
            let ident = ObjectIdent::from_value(value).map_err(RecordError::from)?;
            if let Some(existing) = documents.iter_mut().find(|doc| has_id(doc, &ident)) {
                document.insert(ID_FIELD.to_string(), ident.to_value());
                *existing = document;
                return Ok(ident);
            }
        }
        Self::store_new(&mut documents, document)
    }

    fn delete_one(&self, filter: &FieldMap) -> StoreResult<bool> {
        let mut documents = self.write()?;
        match documents.iter().position(|doc| matches_filter(doc, filter)) {
            Some(index) => {
                documents.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn count_documents(&self, filter: &FieldMap) -> StoreResult<u64> {
        let documents = self.read()?;
        Ok(documents
            .iter()
            .filter(|doc| matches_filter(doc, filter))
            .count() as u64)
    }
}

fn has_id(document: &FieldMap, ident: &ObjectIdent) -> bool {
    document
        .get(ID_FIELD)
        .and_then(|value| ObjectIdent::from_value(value).ok())
        .map_or(false, |stored| stored == *ident)
}

fn matches_filter(document: &FieldMap, filter: &FieldMap) -> bool {
    filter
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

/// Total value ordering: by type rank first, then within type.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
