//! Schema model types.
//!
//! A schema document is parsed once into an immutable tree of
//! [`SchemaNode`]s rooted in a [`Schema`]. The document is deep-copied into
//! owned storage during parsing and never aliased with caller-owned data;
//! the model exposes no mutation methods.
//!
//! Recognized leaf and container tags:
//! - `integer`: 64-bit signed integer (whole-valued floats are accepted and
//!   truncated by the caster)
//! - `number`: any numeric representation
//! - `string`: UTF-8 string
//! - `boolean`: boolean
//! - `object`: nested object with its own property schema
//! - `array`: sequence, optionally with a per-element `items` schema
//! - `object_id`: 24-hex-digit identifier token
//! - `date`: RFC 3339 date string
//! - `null`: exactly null
//!
//! A node's `type` may also be a non-empty ordered list of tags; values are
//! checked against each alternative in the listed order.

use serde_json::{Map, Value};

use super::errors::{SchemaError, SchemaResult};

/// Owned field map, the in-memory shape of one record or document.
///
/// Key order is preserved, which the relational adapter relies on when
/// zipping rows against declared property order.
pub type FieldMap = Map<String, Value>;

/// Recognized type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Integer,
    Number,
    String,
    Boolean,
    Object,
    Array,
    ObjectId,
    Date,
    Null,
}

impl TypeTag {
    /// Parses the wire spelling of a tag.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "integer" => Some(TypeTag::Integer),
            "number" => Some(TypeTag::Number),
            "string" => Some(TypeTag::String),
            "boolean" => Some(TypeTag::Boolean),
            "object" => Some(TypeTag::Object),
            "array" => Some(TypeTag::Array),
            "object_id" => Some(TypeTag::ObjectId),
            "date" => Some(TypeTag::Date),
            "null" => Some(TypeTag::Null),
            _ => None,
        }
    }

    /// Returns the tag name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            TypeTag::Integer => "integer",
            TypeTag::Number => "number",
            TypeTag::String => "string",
            TypeTag::Boolean => "boolean",
            TypeTag::Object => "object",
            TypeTag::Array => "array",
            TypeTag::ObjectId => "object_id",
            TypeTag::Date => "date",
            TypeTag::Null => "null",
        }
    }
}

/// A node's type: one tag, or an ordered list of alternatives.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    One(TypeTag),
    AnyOf(Vec<TypeTag>),
}

impl TypeSpec {
    /// The single tag, when this is not a union.
    pub fn single(&self) -> Option<TypeTag> {
        match self {
            TypeSpec::One(tag) => Some(*tag),
            TypeSpec::AnyOf(_) => None,
        }
    }

    /// All tags, in declared order.
    pub fn tags(&self) -> &[TypeTag] {
        match self {
            TypeSpec::One(tag) => std::slice::from_ref(tag),
            TypeSpec::AnyOf(tags) => tags,
        }
    }
}

/// One recursive unit of the structural schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    type_spec: TypeSpec,
    properties: Vec<(String, SchemaNode)>,
    items: Option<Box<SchemaNode>>,
    required: bool,
    default: Option<Value>,
    additional_properties: bool,
    primary: bool,
    length: Option<u64>,
}

impl SchemaNode {
    /// Parses one schema node out of a document fragment.
    ///
    /// An absent `type` means `object`, matching the top level of a schema
    /// document, which carries only `properties`.
    pub fn from_value(fragment: &Value, path: &str) -> SchemaResult<Self> {
        let obj = fragment.as_object().ok_or_else(|| SchemaError::InvalidNode {
            path: path.to_string(),
            reason: "node must be an object".into(),
        })?;

        let type_spec = match obj.get("type") {
            None => TypeSpec::One(TypeTag::Object),
            Some(Value::String(tag)) => {
                TypeSpec::One(TypeTag::parse(tag).ok_or_else(|| SchemaError::UnknownType {
                    path: path.to_string(),
                    tag: tag.clone(),
                })?)
            }
            Some(Value::Array(tags)) => {
                if tags.is_empty() {
                    return Err(SchemaError::EmptyTypeList {
                        path: path.to_string(),
                    });
                }
                let mut parsed = Vec::with_capacity(tags.len());
                for tag in tags {
                    let tag = tag.as_str().ok_or_else(|| SchemaError::InvalidNode {
                        path: path.to_string(),
                        reason: "type list entries must be strings".into(),
                    })?;
                    parsed.push(TypeTag::parse(tag).ok_or_else(|| SchemaError::UnknownType {
                        path: path.to_string(),
                        tag: tag.to_string(),
                    })?);
                }
                TypeSpec::AnyOf(parsed)
            }
            Some(other) => {
                return Err(SchemaError::InvalidNode {
                    path: path.to_string(),
                    reason: format!("'type' must be a string or list, got {}", other),
                })
            }
        };

        let properties = match obj.get("properties") {
            None => Vec::new(),
            Some(props) => parse_properties(props, path)?,
        };

        let items = match obj.get("items") {
            None => None,
            Some(fragment) => {
                let item_path = format!("{}[]", path);
                Some(Box::new(SchemaNode::from_value(fragment, &item_path)?))
            }
        };

        Ok(Self {
            type_spec,
            properties,
            items,
            required: parse_bool(obj, "required", false, path)?,
            default: obj.get("default").cloned(),
            additional_properties: parse_bool(obj, "additionalProperties", true, path)?,
            primary: parse_bool(obj, "primary", false, path)?,
            length: obj.get("length").and_then(Value::as_u64),
        })
    }

    pub fn type_spec(&self) -> &TypeSpec {
        &self.type_spec
    }

    /// Declared properties, in document order.
    pub fn properties(&self) -> &[(String, SchemaNode)] {
        &self.properties
    }

    /// Looks up a declared property by name.
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, node)| node)
    }

    pub fn items(&self) -> Option<&SchemaNode> {
        self.items.as_deref()
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn additional_properties(&self) -> bool {
        self.additional_properties
    }

    pub fn primary(&self) -> bool {
        self.primary
    }

    /// Declared string length, used for relational column sizing.
    pub fn length(&self) -> Option<u64> {
        self.length
    }
}

/// Immutable in-memory representation of one structural schema.
#[derive(Debug, Clone)]
pub struct Schema {
    id: String,
    name: String,
    root: SchemaNode,
    collection_name: Option<String>,
    database_name: Option<String>,
    sql: bool,
    primary: Option<String>,
    default_object: FieldMap,
}

impl Schema {
    /// Parses a schema document.
    ///
    /// Fails when `id`, `name`, or `properties` is absent, when any node is
    /// malformed, or when a relational (`sql: true`) schema designates more
    /// than one primary key.
    pub fn from_document(document: &Value) -> SchemaResult<Self> {
        let doc = document.as_object().ok_or(SchemaError::NotAnObject)?;

        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .ok_or(SchemaError::MissingAttribute("id"))?
            .to_string();
        let name = doc
            .get("name")
            .and_then(Value::as_str)
            .ok_or(SchemaError::MissingAttribute("name"))?
            .to_string();
        if !doc.contains_key("properties") {
            return Err(SchemaError::MissingAttribute("properties"));
        }

        // The document's top level is itself an object node.
        let root = SchemaNode::from_value(document, "")?;

        let sql = doc.get("sql").and_then(Value::as_bool).unwrap_or(false);

        let mut primary = None;
        for (field, node) in root.properties() {
            if !node.primary() {
                continue;
            }
            match &primary {
                None => primary = Some(field.clone()),
                Some(first) if sql => {
                    return Err(SchemaError::DuplicatePrimaryKey {
                        first: first.clone(),
                        second: field.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        let default_object = doc
            .get("default")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            id,
            name,
            root,
            collection_name: doc
                .get("collectionName")
                .and_then(Value::as_str)
                .map(str::to_string),
            database_name: doc
                .get("databaseName")
                .and_then(Value::as_str)
                .map(str::to_string),
            sql,
            primary,
            default_object,
        })
    }

    /// The schema's declared identifier, merged into every public view.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The schema's name, also the relational table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root object node holding the declared properties.
    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// Declared properties, in document order.
    pub fn properties(&self) -> &[(String, SchemaNode)] {
        self.root.properties()
    }

    /// Looks up a declared property by name.
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.root.property(name)
    }

    /// Whether undeclared fields are accepted at the top level.
    pub fn additional_properties(&self) -> bool {
        self.root.additional_properties()
    }

    /// True when this schema targets the relational backend.
    pub fn is_relational(&self) -> bool {
        self.sql
    }

    /// The designated primary-key property, when one is declared.
    pub fn primary_key(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    /// Declared collection-name override.
    pub fn collection_name(&self) -> Option<&str> {
        self.collection_name.as_deref()
    }

    /// Declared database-name override.
    pub fn database_name(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    /// The schema-level default object, seeded into `find_or_create`.
    pub fn default_object(&self) -> &FieldMap {
        &self.default_object
    }
}

fn parse_properties(props: &Value, path: &str) -> SchemaResult<Vec<(String, SchemaNode)>> {
    let obj = props.as_object().ok_or_else(|| SchemaError::InvalidNode {
        path: path.to_string(),
        reason: "'properties' must be an object".into(),
    })?;

    let mut parsed = Vec::with_capacity(obj.len());
    for (field, fragment) in obj {
        let field_path = if path.is_empty() {
            field.clone()
        } else {
            format!("{}.{}", path, field)
        };
        parsed.push((field.clone(), SchemaNode::from_value(fragment, &field_path)?));
    }
    Ok(parsed)
}

fn parse_bool(obj: &FieldMap, key: &str, default: bool, path: &str) -> SchemaResult<bool> {
    match obj.get(key) {
        None => Ok(default),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(other) => Err(SchemaError::InvalidNode {
            path: path.to_string(),
            reason: format!("'{}' must be a boolean, got {}", key, other),
        }),
    }
}
