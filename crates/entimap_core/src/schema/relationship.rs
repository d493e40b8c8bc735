//! Relationship descriptors.

use serde::{Deserialize, Serialize};

/// How many destination objects a relationship links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// At most one destination object.
    ToOne,
    /// Any number of destination objects.
    ToMany,
}

/// Describes one relationship of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    /// Local relationship name.
    pub name: String,
    /// Destination entity name.
    pub destination: String,
    /// To-one or to-many.
    pub cardinality: Cardinality,
    /// Whether a to-many relationship keeps member order.
    #[serde(default)]
    pub ordered: bool,
    /// Name of the inverse relationship on the destination entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse: Option<String>,
    /// External key overriding inflection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_key: Option<String>,
    /// Whether export includes this relationship.
    #[serde(default = "default_exportable")]
    pub exportable: bool,
}

fn default_exportable() -> bool {
    true
}

impl RelationshipDescriptor {
    /// Creates a to-one relationship.
    pub fn to_one(name: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::new(name, destination, Cardinality::ToOne)
    }

    /// Creates an unordered to-many relationship.
    pub fn to_many(name: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::new(name, destination, Cardinality::ToMany)
    }

    fn new(name: impl Into<String>, destination: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
            cardinality,
            ordered: false,
            inverse: None,
            remote_key: None,
            exportable: true,
        }
    }

    /// Sets the inverse relationship name.
    #[must_use]
    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }

    /// Makes a to-many relationship ordered.
    #[must_use]
    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    /// Sets a custom remote key.
    #[must_use]
    pub fn with_remote_key(mut self, key: impl Into<String>) -> Self {
        self.remote_key = Some(key.into());
        self
    }

    /// Excludes the relationship from export.
    #[must_use]
    pub fn not_exportable(mut self) -> Self {
        self.exportable = false;
        self
    }

    /// Returns true for to-many relationships.
    pub fn is_to_many(&self) -> bool {
        self.cardinality == Cardinality::ToMany
    }
}
