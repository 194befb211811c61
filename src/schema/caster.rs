//! Value casting.
//!
//! Casting normalizes a value into its canonical in-memory representation
//! before validation. It is total: malformed input passes through unchanged
//! and is left for the validator to reject. Two leaf rules exist:
//! - a floating-point value under an `integer` schema truncates toward zero
//! - a value under an `object_id` schema is rendered to its canonical
//!   lowercase string form
//!
//! Everything else, including values under union-typed nodes, passes
//! through untouched. Casting is idempotent.

use serde_json::Value;

use crate::ident::ObjectIdent;

use super::types::{FieldMap, Schema, SchemaNode, TypeTag};

/// Casts one value against one schema node.
pub fn cast(node: &SchemaNode, value: Value) -> Value {
    let tag = match node.type_spec().single() {
        Some(tag) => tag,
        None => return value,
    };

    match (tag, value) {
        (TypeTag::Object, Value::Object(map)) if !node.properties().is_empty() => {
            let mut result = FieldMap::with_capacity(map.len());
            for (key, entry) in map {
                let entry = match node.property(&key) {
                    Some(property) => cast(property, entry),
                    None => entry,
                };
                result.insert(key, entry);
            }
            Value::Object(result)
        }
        (TypeTag::Array, Value::Array(elements)) => match node.items() {
            Some(items) => Value::Array(
                elements
                    .into_iter()
                    .map(|element| cast(items, element))
                    .collect(),
            ),
            None => Value::Array(elements),
        },
        (TypeTag::Integer, Value::Number(n)) if n.is_f64() => {
            // as_f64 always succeeds for an f64-backed number
            match n.as_f64() {
                Some(float) => Value::from(float.trunc() as i64),
                None => Value::Number(n),
            }
        }
        (TypeTag::ObjectId, Value::String(token)) => match ObjectIdent::parse(&token) {
            Ok(ident) => ident.to_value(),
            Err(_) => Value::String(token),
        },
        (_, value) => value,
    }
}

/// Casts every declared field of a record's field map. Undeclared fields
/// pass through unchanged.
pub fn cast_fields(schema: &Schema, fields: FieldMap) -> FieldMap {
    let mut result = FieldMap::with_capacity(fields.len());
    for (key, value) in fields {
        let value = match schema.property(&key) {
            Some(property) => cast(property, value),
            None => value,
        };
        result.insert(key, value);
    }
    result
}
