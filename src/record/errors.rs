//! Record lifecycle errors.

use thiserror::Error;

use crate::ident::InvalidIdentifier;
use crate::schema::ValidationError;

/// Result type for record operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// Failures raised while constructing or mutating a record.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    /// Fields do not conform to the schema. Construction failures abort the
    /// whole record; mutation failures leave the prior state untouched.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The identifier field does not parse as an identifier token.
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),

    /// The schema forbids additional properties and the named field is not
    /// declared.
    #[error("additional property '{0}' not allowed")]
    AdditionalPropertyNotAllowed(String),

    /// The record has never been saved, or has been deleted since it was
    /// last fetched.
    #[error("record is not persisted: {0}")]
    NotPersisted(String),
}
