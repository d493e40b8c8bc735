//! Error types for EntiMap core.

use crate::object::ObjectId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by metadata lookups and store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No entity with this name in the schema.
    #[error("entity not found: {name}")]
    EntityNotFound {
        /// Requested entity name.
        name: String,
    },

    /// The entity has no attribute with this name.
    #[error("attribute not found: {entity}.{attribute}")]
    AttributeNotFound {
        /// Entity searched.
        entity: String,
        /// Requested attribute.
        attribute: String,
    },

    /// The entity has no relationship with this name.
    #[error("relationship not found: {entity}.{relationship}")]
    RelationshipNotFound {
        /// Entity searched.
        entity: String,
        /// Requested relationship.
        relationship: String,
    },

    /// The schema is inconsistent.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the inconsistency.
        message: String,
    },

    /// No live object with this id.
    #[error("object not found: {id}")]
    ObjectNotFound {
        /// The missing object.
        id: ObjectId,
    },

    /// A predicate references something the entity does not have.
    #[error("invalid predicate: {message}")]
    InvalidPredicate {
        /// Description of the problem.
        message: String,
    },

    /// A relationship update violates cardinality or destination type.
    #[error("invalid link: {message}")]
    InvalidLink {
        /// Description of the problem.
        message: String,
    },

    /// The persistence layer failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },

    /// Codec error while serializing a value.
    #[error("codec error: {0}")]
    Codec(#[from] entimap_codec::CodecError),

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an entity not found error.
    pub fn entity_not_found(name: impl Into<String>) -> Self {
        Self::EntityNotFound { name: name.into() }
    }

    /// Creates an attribute not found error.
    pub fn attribute_not_found(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::AttributeNotFound {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }

    /// Creates a relationship not found error.
    pub fn relationship_not_found(
        entity: impl Into<String>,
        relationship: impl Into<String>,
    ) -> Self {
        Self::RelationshipNotFound {
            entity: entity.into(),
            relationship: relationship.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invalid predicate error.
    pub fn invalid_predicate(message: impl Into<String>) -> Self {
        Self::InvalidPredicate {
            message: message.into(),
        }
    }

    /// Creates an invalid link error.
    pub fn invalid_link(message: impl Into<String>) -> Self {
        Self::InvalidLink {
            message: message.into(),
        }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if the error comes from unresolvable metadata.
    pub fn is_metadata(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound { .. }
                | Self::AttributeNotFound { .. }
                | Self::RelationshipNotFound { .. }
                | Self::InvalidSchema { .. }
        )
    }
}
