//! Schema model, validator, and caster.
//!
//! A JSON-shaped schema document is parsed once into an immutable
//! [`Schema`]; the [`Validator`] checks data against it and the caster
//! normalizes data into canonical form before validation.

mod caster;
mod errors;
mod types;
mod validator;

pub use caster::{cast, cast_fields};
pub use errors::{SchemaError, SchemaResult, ValidationError, Violation};
pub use types::{FieldMap, Schema, SchemaNode, TypeSpec, TypeTag};
pub use validator::Validator;
