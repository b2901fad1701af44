//! Resource values exchanged between enablers and the wire codecs.

use bytes::Bytes;

use crate::{definition::ResourceType, error::TlvError};

/// A resource value.
///
/// `Multiple` holds `(resource_instance_id, value)` pairs for multi-instance
/// resources.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value.
    #[default]
    Empty,
    /// UTF-8 text.
    String(String),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Boolean(bool),
    /// Raw bytes.
    Opaque(Bytes),
    /// Seconds since the Unix epoch.
    Time(i64),
    /// Resource instances of a multi-instance resource.
    Multiple(Vec<(u16, Value)>),
}

impl Value {
    /// Whether this is [`Value::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Parse a plain-text (content format 0) representation according to
    /// the resource type.
    pub fn from_text(resource_type: ResourceType, text: &str) -> Result<Self, TlvError> {
        let invalid = || TlvError::InvalidValue { type_name: resource_type.name(), len: text.len() };
        let trimmed = text.trim();

        match resource_type {
            ResourceType::String => Ok(Self::String(text.to_owned())),
            ResourceType::Integer => trimmed.parse().map(Self::Integer).map_err(|_| invalid()),
            ResourceType::Time => trimmed.parse().map(Self::Time).map_err(|_| invalid()),
            ResourceType::Float => trimmed.parse().map(Self::Float).map_err(|_| invalid()),
            ResourceType::Boolean => match trimmed {
                "0" | "false" => Ok(Self::Boolean(false)),
                "1" | "true" => Ok(Self::Boolean(true)),
                _ => Err(invalid()),
            },
            ResourceType::Opaque => Ok(Self::Opaque(Bytes::copy_from_slice(text.as_bytes()))),
            ResourceType::None => Ok(Self::Empty),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Self::Opaque(v)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn text_parsing_by_type() {
        assert_eq!(Value::from_text(ResourceType::Integer, " 42 ").unwrap(), Value::Integer(42));
        assert_eq!(Value::from_text(ResourceType::Boolean, "1").unwrap(), Value::Boolean(true));
        assert_eq!(Value::from_text(ResourceType::Time, "1700000000").unwrap(), Value::Time(1_700_000_000));
        assert_eq!(Value::from_text(ResourceType::String, "+02:00").unwrap(), Value::from("+02:00"));
    }

    #[test]
    fn text_parsing_rejects_garbage() {
        let err = Value::from_text(ResourceType::Integer, "forty").unwrap_err();
        assert_eq!(err, TlvError::InvalidValue { type_name: "integer", len: 5 });
        assert!(Value::from_text(ResourceType::Boolean, "yes").is_err());
    }
}
