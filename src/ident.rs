//! Record identifier tokens.
//!
//! Identifiers are 12-byte values rendered as 24 lowercase hex digits. The
//! document backend assigns one per stored document under the `_id` key;
//! the relational backend uses the schema's designated primary key instead
//! and never touches this type's generation path.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde_json::Value;
use thiserror::Error;

/// Raised when a value does not parse as a 24-hex-digit identifier token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid identifier token '{token}'")]
pub struct InvalidIdentifier {
    /// The offending token, rendered for the error message.
    pub token: String,
}

impl InvalidIdentifier {
    pub(crate) fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// A parsed record identifier.
///
/// Comparison order matches the canonical string order, so "latest by
/// identifier" is well-defined on either representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectIdent([u8; 12]);

impl ObjectIdent {
    /// Length of the canonical hex rendering.
    pub const HEX_LEN: usize = 24;

    /// Parses a 24-hex-digit token. Mixed-case hex is accepted; the
    /// canonical rendering is always lowercase.
    pub fn parse(token: &str) -> Result<Self, InvalidIdentifier> {
        if token.len() != Self::HEX_LEN {
            return Err(InvalidIdentifier::new(token));
        }
        let bytes = hex::decode(token).map_err(|_| InvalidIdentifier::new(token))?;
        let mut raw = [0u8; 12];
        raw.copy_from_slice(&bytes);
        Ok(Self(raw))
    }

    /// Parses an identifier out of a JSON value. Only strings qualify.
    pub fn from_value(value: &Value) -> Result<Self, InvalidIdentifier> {
        match value {
            Value::String(s) => Self::parse(s),
            other => Err(InvalidIdentifier::new(other.to_string())),
        }
    }

    /// Generates a fresh random identifier for an insert.
    pub fn generate() -> Self {
        Self(rand::thread_rng().gen())
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Canonical string form as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl fmt::Display for ObjectIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for ObjectIdent {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
