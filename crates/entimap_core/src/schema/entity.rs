//! Per-entity metadata.

use super::attribute::AttributeDescriptor;
use super::relationship::RelationshipDescriptor;
use serde::{Deserialize, Serialize};

/// Local attribute names that act as the primary key when no attribute is
/// explicitly marked.
pub const DEFAULT_PRIMARY_KEYS: [&str; 2] = ["id", "remoteID"];

/// Statically known shape of one entity.
///
/// Built once (directly or through [`Schema`](super::Schema)) and passed
/// by reference to the key mapper, coercer and reconciler. The primary key
/// is resolved whenever attributes change, so lookups never rescan names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EntityDocument", into = "EntityDocument")]
pub struct EntityMetadata {
    name: String,
    attributes: Vec<AttributeDescriptor>,
    relationships: Vec<RelationshipDescriptor>,
    primary_key: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct EntityDocument {
    name: String,
    #[serde(default)]
    attributes: Vec<AttributeDescriptor>,
    #[serde(default)]
    relationships: Vec<RelationshipDescriptor>,
}

impl From<EntityDocument> for EntityMetadata {
    fn from(doc: EntityDocument) -> Self {
        let mut entity = Self {
            name: doc.name,
            attributes: doc.attributes,
            relationships: doc.relationships,
            primary_key: None,
        };
        entity.resolve_primary_key();
        entity
    }
}

impl From<EntityMetadata> for EntityDocument {
    fn from(entity: EntityMetadata) -> Self {
        Self {
            name: entity.name,
            attributes: entity.attributes,
            relationships: entity.relationships,
        }
    }
}

impl EntityMetadata {
    /// Creates an entity with no attributes or relationships.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            primary_key: None,
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self.resolve_primary_key();
        self
    }

    /// Adds a relationship.
    #[must_use]
    pub fn with_relationship(mut self, relationship: RelationshipDescriptor) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    /// Relationships in declaration order.
    pub fn relationships(&self) -> &[RelationshipDescriptor] {
        &self.relationships
    }

    /// Looks up an attribute by local name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Looks up a relationship by local name.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// The primary-key attribute, if the entity has one.
    ///
    /// An explicitly marked attribute wins; otherwise an attribute named
    /// `id`, then one named `remoteID`.
    pub fn primary_key(&self) -> Option<&AttributeDescriptor> {
        self.primary_key.map(|index| &self.attributes[index])
    }

    fn resolve_primary_key(&mut self) {
        self.primary_key = self
            .attributes
            .iter()
            .position(|a| a.primary_key)
            .or_else(|| {
                DEFAULT_PRIMARY_KEYS
                    .iter()
                    .find_map(|name| self.attributes.iter().position(|a| a.name == *name))
            });
    }
}
