//! Schema error taxonomy.
//!
//! Two failure families live here:
//! - `SchemaError`: the schema document itself is unusable. Raised once, at
//!   model construction, and never recoverable by this library.
//! - `ValidationError`: data does not conform to a valid schema. Always
//!   recoverable by the caller and never silently swallowed.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::schema::types::TypeTag;

/// Result type for schema-document operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// A malformed schema document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// The document is not a JSON object.
    #[error("schema document must be an object")]
    NotAnObject,

    /// A mandatory top-level attribute (`id`, `name`, `properties`) is
    /// absent or has the wrong shape.
    #[error("schema document is missing required attribute '{0}'")]
    MissingAttribute(&'static str),

    /// A node carries a type tag outside the recognized set.
    #[error("unrecognized type tag '{tag}' at '{path}'")]
    UnknownType { path: String, tag: String },

    /// A union type list must name at least one alternative.
    #[error("empty type list at '{path}'")]
    EmptyTypeList { path: String },

    /// A node attribute is structurally wrong (non-object `properties`,
    /// non-boolean `required`, and so on).
    #[error("invalid schema node at '{path}': {reason}")]
    InvalidNode { path: String, reason: String },

    /// A relational schema designates more than one primary key.
    #[error("primary key declared more than once: '{first}' and '{second}'")]
    DuplicatePrimaryKey { first: String, second: String },
}

/// One schema violation: where it happened, what was expected, what was
/// found, and the offending value itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Field path, e.g. `address.city` or `tags[1]`.
    pub path: String,
    /// Expected type or condition.
    pub expected: String,
    /// Actual type or condition found.
    pub actual: String,
    /// The received value (`Null` for absent fields).
    pub value: Value,
}

impl Violation {
    /// A value whose representation type does not match the schema tag.
    pub fn type_mismatch(path: impl Into<String>, expected: TypeTag, value: &Value) -> Self {
        Self {
            path: path.into(),
            expected: expected.type_name().to_string(),
            actual: value_type_name(value).to_string(),
            value: value.clone(),
        }
    }

    /// A required property absent from the data.
    pub fn missing_field(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            expected: "field to be present".into(),
            actual: "missing".into(),
            value: Value::Null,
        }
    }

    /// Undeclared properties on an object that forbids them. All offending
    /// keys are reported in this one violation.
    pub fn extra_fields(path: impl Into<String>, keys: &[String]) -> Self {
        Self {
            path: path.into(),
            expected: "no undeclared properties".into(),
            actual: format!("undeclared: {}", keys.join(", ")),
            value: Value::Null,
        }
    }

    /// A string that is not a well-formed identifier token. Distinct from a
    /// plain type mismatch so callers can tell format from shape errors.
    pub fn invalid_identifier(path: impl Into<String>, value: &Value) -> Self {
        Self {
            path: path.into(),
            expected: "24-hex-digit identifier".into(),
            actual: "malformed identifier".into(),
            value: value.clone(),
        }
    }

    /// A string that does not parse as an RFC 3339 date.
    pub fn invalid_date(path: impl Into<String>, value: &Value) -> Self {
        Self {
            path: path.into(),
            expected: "RFC 3339 date string".into(),
            actual: "unparseable date".into(),
            value: value.clone(),
        }
    }

    /// A value matching none of a union's alternatives. Names every
    /// attempted tag.
    pub fn no_alternative(path: impl Into<String>, tags: &[TypeTag], value: &Value) -> Self {
        let attempted: Vec<&str> = tags.iter().map(|t| t.type_name()).collect();
        Self {
            path: path.into(),
            expected: format!("one of: {}", attempted.join(", ")),
            actual: value_type_name(value).to_string(),
            value: value.clone(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}': expected {}, got {}",
            self.path, self.expected, self.actual
        )?;
        if !self.value.is_null() {
            write!(f, " (value: {})", self.value)?;
        }
        Ok(())
    }
}

/// Data rejected by the validator. Carries every violation collected during
/// the walk, not just the first.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub(crate) fn new(violations: Vec<Violation>) -> Self {
        debug_assert!(!violations.is_empty());
        Self { violations }
    }

    /// All collected violations, in walk order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// True when any violation touches the given field path.
    pub fn mentions(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: ")?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// JSON representation-type name for error messages.
pub(crate) fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_violation_display_includes_value() {
        let v = Violation::type_mismatch("age", TypeTag::Integer, &json!("hi"));
        let rendered = v.to_string();
        assert!(rendered.contains("age"));
        assert!(rendered.contains("integer"));
        assert!(rendered.contains("string"));
        assert!(rendered.contains("\"hi\""));
    }

    #[test]
    fn test_missing_field_display_omits_value() {
        let v = Violation::missing_field("email");
        assert!(!v.to_string().contains("value:"));
    }

    #[test]
    fn test_extra_fields_names_every_key() {
        let v = Violation::extra_fields("", &["extra".into(), "more".into()]);
        let rendered = v.to_string();
        assert!(rendered.contains("extra"));
        assert!(rendered.contains("more"));
    }

    #[test]
    fn test_validation_error_reports_all_violations() {
        let err = ValidationError::new(vec![
            Violation::missing_field("name"),
            Violation::type_mismatch("count", TypeTag::Integer, &json!("x")),
        ]);
        let rendered = err.to_string();
        assert!(rendered.contains("name"));
        assert!(rendered.contains("count"));
        assert!(err.mentions("name"));
        assert!(!err.mentions("age"));
    }

    #[test]
    fn test_value_type_names() {
        assert_eq!(value_type_name(&json!(null)), "null");
        assert_eq!(value_type_name(&json!(true)), "boolean");
        assert_eq!(value_type_name(&json!(3)), "integer");
        assert_eq!(value_type_name(&json!(3.5)), "number");
        assert_eq!(value_type_name(&json!("s")), "string");
        assert_eq!(value_type_name(&json!([])), "array");
        assert_eq!(value_type_name(&json!({})), "object");
    }
}
