//! Record lifecycle: validated construction, mutation with rollback, and
//! serialization.

mod errors;
mod record;

pub use errors::{RecordError, RecordResult};
pub use record::{Record, ID_FIELD};
