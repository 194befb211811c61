//! The record entity.
//!
//! A record owns a shared, immutable schema reference and an owned field
//! map. Outside an in-flight mutation the field map always satisfies the
//! schema: construction casts and validates up front, and every validated
//! mutation stages its change on a clone, so a failed write never corrupts
//! the prior state.
//!
//! Construction order is load-bearing: the identifier is extracted and
//! format-checked first, defaults are injected (skipped for records
//! materialized from a store read), then the caster establishes canonical
//! representations, and only then does validation run.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::ident::ObjectIdent;
use crate::schema::{cast_fields, FieldMap, Schema, SchemaNode, ValidationError, Validator};

use super::errors::{RecordError, RecordResult};

/// The document-backend identifier key.
pub const ID_FIELD: &str = "_id";

/// A validated, mutable record bound to one schema.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<Schema>,
    fields: FieldMap,
    materialized: bool,
    persisted: bool,
}

impl Record {
    /// Constructs a record from user-supplied fields.
    ///
    /// Defaults are injected for absent properties, fields are cast, and
    /// the result is fully validated. Any failure aborts construction; no
    /// partial record is produced.
    pub fn new(schema: Arc<Schema>, fields: FieldMap) -> RecordResult<Self> {
        Self::build(schema, fields, false)
    }

    /// Constructs a record from a store read.
    ///
    /// Store reads may be partial projections, so default injection is
    /// skipped and required-field enforcement is suppressed. Everything
    /// present must still conform.
    pub fn materialize(schema: Arc<Schema>, fields: FieldMap) -> RecordResult<Self> {
        let mut record = Self::build(schema, fields, true)?;
        record.persisted = true;
        Ok(record)
    }

    fn build(schema: Arc<Schema>, mut fields: FieldMap, materialized: bool) -> RecordResult<Self> {
        // The identifier is not part of the structural schema; verify its
        // format now and hold it aside while the rest is processed.
        let ident = match fields.remove(ID_FIELD) {
            Some(value) => Some(ObjectIdent::from_value(&value)?),
            None => None,
        };

        if !materialized {
            inject_defaults(schema.root(), &mut fields);
        }

        let fields = cast_fields(&schema, fields);

        let validator = if materialized {
            Validator::for_materialized(&schema)
        } else {
            Validator::new(&schema)
        };
        validator.validate_fields(&fields)?;

        let mut record = Self {
            schema,
            fields,
            materialized,
            persisted: false,
        };
        if let Some(ident) = ident {
            record.fields.insert(ID_FIELD.to_string(), ident.to_value());
        }
        Ok(record)
    }

    /// The schema this record is bound to.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Borrow of the full field map.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Returns a field value, or `None` when absent. Never fails.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a field value, or the given default when absent.
    pub fn get_or<'a>(&'a self, field: &str, default: &'a Value) -> &'a Value {
        self.fields.get(field).unwrap_or(default)
    }

    /// The record's parsed identifier, when one has been assigned.
    pub fn identifier(&self) -> Option<ObjectIdent> {
        self.fields
            .get(ID_FIELD)
            .and_then(|value| ObjectIdent::from_value(value).ok())
    }

    /// The value of the schema's designated primary key, when declared and
    /// present.
    pub fn primary_value(&self) -> Option<&Value> {
        self.schema
            .primary_key()
            .and_then(|primary| self.fields.get(primary))
    }

    /// True when this record was constructed from a store read.
    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    /// True when this record has a persisted counterpart in the store.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Sets one field with validation.
    ///
    /// Declared properties are staged on a clone of the field map and the
    /// clone is fully re-validated before the write commits; a failure
    /// leaves the record exactly as it was. Undeclared fields fail when the
    /// schema forbids additional properties and are written without
    /// schema-level validation otherwise.
    pub fn set(&mut self, field: &str, value: Value) -> RecordResult<()> {
        if field == ID_FIELD {
            return self.set_identifier(&value);
        }

        if self.schema.property(field).is_some() {
            let mut staged = self.fields.clone();
            staged.insert(field.to_string(), value);
            self.validate_map(&staged)?;
            self.fields = staged;
            return Ok(());
        }

        if !self.schema.additional_properties() {
            log::warn!(
                "rejected additional property '{}' on schema '{}'",
                field,
                self.schema.name()
            );
            return Err(RecordError::AdditionalPropertyNotAllowed(field.to_string()));
        }

        self.fields.insert(field.to_string(), value);
        Ok(())
    }

    /// The explicit identifier-update path: verifies the token format and
    /// stores its canonical form.
    pub fn set_identifier(&mut self, value: &Value) -> RecordResult<()> {
        let ident = ObjectIdent::from_value(value)?;
        self.fields.insert(ID_FIELD.to_string(), ident.to_value());
        Ok(())
    }

    /// Applies a batch of field updates, all-or-nothing.
    ///
    /// Every entry is staged on a clone and the staged map is validated
    /// once; a failure anywhere discards the whole batch. The identifier
    /// field is skipped unless `update_identifier` is set.
    pub fn update(&mut self, new_fields: FieldMap, update_identifier: bool) -> RecordResult<()> {
        let mut staged = self.fields.clone();

        for (field, value) in new_fields {
            if field == ID_FIELD {
                if update_identifier {
                    let ident = ObjectIdent::from_value(&value)?;
                    staged.insert(field, ident.to_value());
                }
                continue;
            }

            if self.schema.property(&field).is_none() && !self.schema.additional_properties() {
                return Err(RecordError::AdditionalPropertyNotAllowed(field));
            }
            staged.insert(field, value);
        }

        self.validate_map(&staged)?;
        self.fields = staged;
        Ok(())
    }

    /// Re-validates the current field map.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_map(&self.fields)
    }

    /// Produces the serialization-ready public view: all fields with the
    /// identifier in canonical string form, plus the schema's declared
    /// identifier merged in as the `id` metadata field.
    pub fn to_public_view(&self) -> FieldMap {
        let mut view = self.fields.clone();
        view.insert("id".to_string(), Value::String(self.schema.id().to_string()));
        view
    }

    fn validate_map(&self, fields: &FieldMap) -> Result<(), ValidationError> {
        let validator = if self.materialized {
            Validator::for_materialized(&self.schema)
        } else {
            Validator::new(&self.schema)
        };
        validator.validate_fields(fields)
    }

    /// Assigns the store-issued identifier after an insert and marks the
    /// record persisted.
    pub(crate) fn assign_identifier(&mut self, ident: ObjectIdent) {
        self.fields.insert(ID_FIELD.to_string(), ident.to_value());
        self.persisted = true;
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    pub(crate) fn mark_unpersisted(&mut self) {
        self.persisted = false;
    }

    /// Replaces this record's state with a freshly fetched counterpart.
    pub(crate) fn adopt(&mut self, fetched: Record) {
        self.fields = fetched.fields;
        self.materialized = true;
        self.persisted = true;
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.fields.clone()))
    }
}

/// Inserts declared defaults for absent properties, recursing into nested
/// object values that are present.
fn inject_defaults(node: &SchemaNode, map: &mut FieldMap) {
    for (name, property) in node.properties() {
        if let Some(default) = property.default_value() {
            if !map.contains_key(name) {
                map.insert(name.clone(), default.clone());
            }
        }
        if !property.properties().is_empty() {
            if let Some(Value::Object(nested)) = map.get_mut(name) {
                inject_defaults(property, nested);
            }
        }
    }
}
