//! Store-layer errors.
//!
//! Backend failures (connectivity, constraint violations) are carried
//! through `Backend` without further wrapping; their semantics belong to
//! the backing store, not to this layer.

use thiserror::Error;

use crate::record::RecordError;
use crate::schema::SchemaError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures raised by store adapters and the repository.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The context carries no handle for the backend the schema selects.
    #[error("not connected: no {0} handle in the store context")]
    NotConnected(&'static str),

    /// A relational operation needs a primary key the schema never
    /// declared.
    #[error("schema '{schema}' declares no primary key")]
    MissingPrimaryKey { schema: String },

    /// An error surfaced by the backing store, passed through unchanged.
    #[error("backend error: {0}")]
    Backend(String),

    /// A row or document read back from the store could not be turned into
    /// a record, or a record-level failure occurred during a store
    /// operation.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// A schema failure surfaced during repository construction.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
