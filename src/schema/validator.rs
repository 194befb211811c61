//! Schema validator.
//!
//! Validation walks a schema node and a data value in lock-step:
//! - Union types are tried in their listed order; the first match wins, and
//!   a miss on every alternative is reported once, naming all of them.
//! - Objects collect every property-level violation before reporting, and
//!   an object forbidding additional properties names every undeclared key
//!   in one combined violation.
//! - `integer` and `number` accept either numeric representation. The
//!   widening is deliberate: whole-valued floats are accepted for integer
//!   fields and truncated by the caster, which runs first.
//!
//! The validator does not mutate data, injects no defaults, and is
//! deterministic. Required-field enforcement is relaxed for records
//! materialized from a store read, since partial projections are legal.

use chrono::DateTime;
use serde_json::Value;

use crate::ident::ObjectIdent;

use super::errors::{ValidationError, Violation};
use super::types::{FieldMap, Schema, SchemaNode, TypeSpec, TypeTag};

/// Validates field maps and values against one schema.
pub struct Validator<'a> {
    schema: &'a Schema,
    enforce_required: bool,
}

impl<'a> Validator<'a> {
    /// Full validation, required fields enforced.
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            enforce_required: true,
        }
    }

    /// Validation for records materialized from a store read: required
    /// fields may be absent, everything present must still conform.
    pub fn for_materialized(schema: &'a Schema) -> Self {
        Self {
            schema,
            enforce_required: false,
        }
    }

    /// Validates a record's field map against the schema root.
    ///
    /// The identifier field `_id` is not part of the structural schema and
    /// is skipped here; the record layer verifies its format separately.
    pub fn validate_fields(&self, fields: &FieldMap) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        self.check_object(self.schema.root(), fields, "", true, &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }

    /// Validates a single value against one schema node.
    pub fn validate_value(&self, node: &SchemaNode, value: &Value) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        self.check_node(node, value, "", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }

    fn check_node(&self, node: &SchemaNode, value: &Value, path: &str, out: &mut Vec<Violation>) {
        match node.type_spec() {
            TypeSpec::One(tag) => self.check_tag(*tag, node, value, path, out),
            TypeSpec::AnyOf(tags) => {
                for tag in tags {
                    let mut scratch = Vec::new();
                    self.check_tag(*tag, node, value, path, &mut scratch);
                    if scratch.is_empty() {
                        return;
                    }
                }
                out.push(Violation::no_alternative(path, tags, value));
            }
        }
    }

    fn check_tag(
        &self,
        tag: TypeTag,
        node: &SchemaNode,
        value: &Value,
        path: &str,
        out: &mut Vec<Violation>,
    ) {
        match tag {
            TypeTag::Integer | TypeTag::Number => {
                if !value.is_number() {
                    out.push(Violation::type_mismatch(path, tag, value));
                }
            }
            TypeTag::String => {
                if !value.is_string() {
                    out.push(Violation::type_mismatch(path, tag, value));
                }
            }
            TypeTag::Boolean => {
                if !value.is_boolean() {
                    out.push(Violation::type_mismatch(path, tag, value));
                }
            }
            TypeTag::Null => {
                if !value.is_null() {
                    out.push(Violation::type_mismatch(path, tag, value));
                }
            }
            TypeTag::Date => match value {
                Value::String(s) => {
                    if DateTime::parse_from_rfc3339(s).is_err() {
                        out.push(Violation::invalid_date(path, value));
                    }
                }
                _ => out.push(Violation::type_mismatch(path, tag, value)),
            },
            TypeTag::ObjectId => match value {
                Value::String(s) => {
                    if ObjectIdent::parse(s).is_err() {
                        out.push(Violation::invalid_identifier(path, value));
                    }
                }
                _ => out.push(Violation::type_mismatch(path, tag, value)),
            },
            TypeTag::Object => match value.as_object() {
                Some(map) => self.check_object(node, map, path, false, out),
                None => out.push(Violation::type_mismatch(path, tag, value)),
            },
            TypeTag::Array => match value.as_array() {
                Some(elements) => {
                    // An array without an items schema is untyped.
                    if let Some(items) = node.items() {
                        for (i, element) in elements.iter().enumerate() {
                            let element_path = format!("{}[{}]", path, i);
                            self.check_node(items, element, &element_path, out);
                        }
                    }
                }
                None => out.push(Violation::type_mismatch(path, tag, value)),
            },
        }
    }

    fn check_object(
        &self,
        node: &SchemaNode,
        map: &FieldMap,
        path: &str,
        is_root: bool,
        out: &mut Vec<Violation>,
    ) {
        if !node.additional_properties() {
            let extras: Vec<String> = map
                .keys()
                .filter(|key| {
                    node.property(key).is_none() && !(is_root && key.as_str() == "_id")
                })
                .cloned()
                .collect();
            if !extras.is_empty() {
                out.push(Violation::extra_fields(path, &extras));
            }
        }

        for (name, property) in node.properties() {
            let field_path = make_path(path, name);
            match map.get(name) {
                Some(value) => self.check_node(property, value, &field_path, out),
                None => {
                    if property.required() && self.enforce_required {
                        out.push(Violation::missing_field(field_path));
                    }
                }
            }
        }
    }
}

fn make_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}
