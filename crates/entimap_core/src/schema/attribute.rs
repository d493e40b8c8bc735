//! Attribute descriptors.

use entimap_codec::KEY_PATH_SEPARATOR;
use serde::{Deserialize, Serialize};

/// Native scalar type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// UTF-8 text.
    String,
    /// 64-bit signed integer.
    Integer,
    /// Arbitrary-precision decimal, kept in its textual form.
    Decimal,
    /// 64-bit float.
    Float,
    /// Boolean.
    #[serde(alias = "boolean")]
    Bool,
    /// UTC timestamp.
    Date,
    /// UUID.
    Uuid,
    /// Absolute URI.
    #[serde(alias = "url")]
    Uri,
    /// Opaque bytes; always receives the canonical CBOR form of the input.
    Binary,
    /// Structured value handed through a transformer, or stored as-is.
    Transformable,
}

impl AttributeType {
    /// Returns true if values of this type can serve as a primary key.
    pub fn is_keyable(self) -> bool {
        !matches!(self, Self::Binary | Self::Transformable)
    }
}

/// Describes one attribute of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    /// Local (camelCase) attribute name.
    pub name: String,
    /// Native type.
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    /// External key overriding inflection. May be a dotted key path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_key: Option<String>,
    /// Name of a registered value transformer that owns conversion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<String>,
    /// Whether export includes this attribute.
    #[serde(default = "default_exportable")]
    pub exportable: bool,
    /// Explicit primary-key marking.
    #[serde(default)]
    pub primary_key: bool,
}

fn default_exportable() -> bool {
    true
}

impl AttributeDescriptor {
    /// Creates an exportable attribute without overrides.
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            remote_key: None,
            transformer: None,
            exportable: true,
            primary_key: false,
        }
    }

    /// Creates a string attribute.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::String)
    }

    /// Creates an integer attribute.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Integer)
    }

    /// Creates a decimal attribute.
    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Decimal)
    }

    /// Creates a float attribute.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Float)
    }

    /// Creates a boolean attribute.
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Bool)
    }

    /// Creates a date attribute.
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Date)
    }

    /// Creates a UUID attribute.
    pub fn uuid(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Uuid)
    }

    /// Creates a URI attribute.
    pub fn uri(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Uri)
    }

    /// Creates a binary attribute.
    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Binary)
    }

    /// Creates a transformable attribute.
    pub fn transformable(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Transformable)
    }

    /// Sets a custom remote key.
    #[must_use]
    pub fn with_remote_key(mut self, key: impl Into<String>) -> Self {
        self.remote_key = Some(key.into());
        self
    }

    /// Sets the transformer that owns conversion of this attribute.
    #[must_use]
    pub fn with_transformer(mut self, name: impl Into<String>) -> Self {
        self.transformer = Some(name.into());
        self
    }

    /// Excludes the attribute from export.
    #[must_use]
    pub fn not_exportable(mut self) -> Self {
        self.exportable = false;
        self
    }

    /// Marks the attribute as the entity's primary key.
    #[must_use]
    pub fn as_primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Returns true if the custom remote key is a dotted key path.
    pub fn has_key_path(&self) -> bool {
        self.remote_key
            .as_deref()
            .is_some_and(|key| key.contains(KEY_PATH_SEPARATOR))
    }

    /// First segment of the custom remote key, if any.
    pub fn remote_key_root(&self) -> Option<&str> {
        self.remote_key
            .as_deref()
            .and_then(|key| key.split(KEY_PATH_SEPARATOR).next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_overrides() {
        let attr = AttributeDescriptor::string("firstName")
            .with_remote_key("profile.first")
            .not_exportable();
        assert_eq!(attr.remote_key.as_deref(), Some("profile.first"));
        assert!(attr.has_key_path());
        assert_eq!(attr.remote_key_root(), Some("profile"));
        assert!(!attr.exportable);
        assert!(!attr.primary_key);
    }

    #[test]
    fn plain_remote_key_is_its_own_root() {
        let attr = AttributeDescriptor::integer("remoteID").with_remote_key("identifier");
        assert!(!attr.has_key_path());
        assert_eq!(attr.remote_key_root(), Some("identifier"));
    }

    #[test]
    fn keyable_types() {
        assert!(AttributeType::Integer.is_keyable());
        assert!(AttributeType::String.is_keyable());
        assert!(!AttributeType::Binary.is_keyable());
        assert!(!AttributeType::Transformable.is_keyable());
    }

    #[test]
    fn deserialize_with_defaults() {
        let attr: AttributeDescriptor =
            serde_json::from_str(r#"{"name": "homepage", "type": "url"}"#).unwrap();
        assert_eq!(attr.attribute_type, AttributeType::Uri);
        assert!(attr.exportable);
        assert_eq!(attr.remote_key, None);
    }
}
