//! formdb - a strict, schema-driven record validation and access layer
//!
//! A declarative structural schema is parsed once into an immutable
//! [`Schema`]; data is cast into canonical form, validated against it, and
//! exposed as [`Record`]s through a uniform CRUD [`Repository`] backed by
//! either a document store or a relational engine.

pub mod ident;
pub mod record;
pub mod repository;
pub mod schema;
pub mod store;

pub use ident::{InvalidIdentifier, ObjectIdent};
pub use record::{Record, RecordError};
pub use repository::{Repository, StoreContext};
pub use schema::{FieldMap, Schema, SchemaError, ValidationError};
pub use store::{
    Cursor, DocumentStore, MemoryCollection, Query, RelationalEngine, SortOrder, StoreError,
};
