//! Store adapters: translation of the abstract query descriptor and record
//! field maps into backend-specific operations.

mod document;
mod errors;
mod memory;
mod query;
mod relational;

pub use document::{DocumentAdapter, DocumentCursor, DocumentStore, FindOptions};
pub use errors::{StoreError, StoreResult};
pub use memory::MemoryCollection;
pub use query::{Query, SortOrder};
pub use relational::{RelationalAdapter, RelationalEngine, Row};

use crate::record::Record;

/// Lazy record sequence from a find, backend-agnostic.
///
/// The document backend pages lazily; the relational backend materializes
/// its full row set when the statement executes, so its variant iterates a
/// buffer.
pub enum Cursor {
    Document(DocumentCursor),
    Relational(std::vec::IntoIter<Record>),
}

impl Iterator for Cursor {
    type Item = StoreResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Cursor::Document(cursor) => cursor.next(),
            Cursor::Relational(records) => records.next().map(Ok),
        }
    }
}
