//! Abstract query descriptor.
//!
//! One descriptor is translated into whichever idiom the chosen backend
//! speaks. The options (`sort`, `skip`, `limit`, `batch_size`) live beside
//! the filter and are never forwarded to the backend as filter keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::FieldMap;

/// Sort direction for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// SQL keyword for the direction.
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Filter, sort, skip, limit, and batch size for one find operation.
///
/// `batch_size` is mutually exclusive with explicit `skip`/`limit`: set on
/// its own it drives internal pagination; combined with either, the
/// explicit options win and the batch size is ignored.
///
/// Deserializes from a combined options bag; the options never leak into
/// the backend as filter keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    filter: FieldMap,
    sort: Option<(String, SortOrder)>,
    skip: Option<u64>,
    limit: Option<u64>,
    batch_size: Option<u64>,
}

impl Query {
    /// An empty query matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A query with equality predicates taken from the given field map.
    pub fn with_filter(filter: FieldMap) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Adds one equality predicate.
    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.filter.insert(name.into(), value);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((field.into(), order));
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn filter(&self) -> &FieldMap {
        &self.filter
    }

    pub fn sort_option(&self) -> Option<&(String, SortOrder)> {
        self.sort.as_ref()
    }

    pub fn skip_option(&self) -> Option<u64> {
        self.skip
    }

    pub fn limit_option(&self) -> Option<u64> {
        self.limit
    }

    pub fn batch_size_option(&self) -> Option<u64> {
        self.batch_size
    }

    /// The page size to paginate with, when batching applies.
    pub(crate) fn batched(&self) -> Option<u64> {
        match (self.batch_size, self.skip, self.limit) {
            (Some(batch), None, None) => Some(batch),
            _ => None,
        }
    }
}
