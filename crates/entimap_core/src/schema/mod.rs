//! Entity metadata: attributes, relationships and primary keys.

mod attribute;
mod entity;
mod relationship;

pub use attribute::{AttributeDescriptor, AttributeType};
pub use entity::{EntityMetadata, DEFAULT_PRIMARY_KEYS};
pub use relationship::{Cardinality, RelationshipDescriptor};

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The validated set of entities one store knows about.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: Vec<EntityMetadata>,
    by_name: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct SchemaDocument {
    entities: Vec<EntityMetadata>,
}

impl Schema {
    /// Builds a schema and checks it for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSchema`] for duplicate names, several
    /// explicit primary keys, unkeyable primary-key types, unknown
    /// destinations, ordered to-one relationships, or inverses that do not
    /// point back.
    pub fn new(entities: Vec<EntityMetadata>) -> CoreResult<Self> {
        let mut by_name = HashMap::with_capacity(entities.len());
        for (index, entity) in entities.iter().enumerate() {
            if by_name.insert(entity.name().to_string(), index).is_some() {
                return Err(CoreError::invalid_schema(format!(
                    "duplicate entity {}",
                    entity.name()
                )));
            }
        }

        let schema = Self { entities, by_name };
        for entity in &schema.entities {
            schema.validate_entity(entity)?;
        }
        Ok(schema)
    }

    /// Parses a schema from its JSON document form.
    ///
    /// ```
    /// use entimap_core::Schema;
    ///
    /// let schema = Schema::from_json(r#"{
    ///     "entities": [
    ///         {"name": "User", "attributes": [{"name": "remoteID", "type": "integer"}]}
    ///     ]
    /// }"#).unwrap();
    /// assert!(schema.entity("User").is_ok());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSchema`] for malformed JSON or an
    /// inconsistent schema.
    pub fn from_json(text: &str) -> CoreResult<Self> {
        let doc: SchemaDocument =
            serde_json::from_str(text).map_err(|e| CoreError::invalid_schema(e.to_string()))?;
        Self::new(doc.entities)
    }

    /// Renders the schema as its JSON document form.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn to_json(&self) -> CoreResult<String> {
        let doc = SchemaDocument {
            entities: self.entities.clone(),
        };
        serde_json::to_string_pretty(&doc).map_err(|e| CoreError::invalid_schema(e.to_string()))
    }

    /// Looks up an entity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`] if the name is unknown.
    pub fn entity(&self, name: &str) -> CoreResult<&EntityMetadata> {
        self.get(name)
            .ok_or_else(|| CoreError::entity_not_found(name))
    }

    /// Looks up an entity, returning `None` if unknown.
    pub fn get(&self, name: &str) -> Option<&EntityMetadata> {
        self.by_name.get(name).map(|&index| &self.entities[index])
    }

    /// Entities in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityMetadata> {
        self.entities.iter()
    }

    /// Looks up a relationship of an entity.
    ///
    /// # Errors
    ///
    /// Returns a metadata error if either name is unknown.
    pub fn relationship(&self, entity: &str, name: &str) -> CoreResult<&RelationshipDescriptor> {
        self.entity(entity)?
            .relationship(name)
            .ok_or_else(|| CoreError::relationship_not_found(entity, name))
    }

    /// The inverse of a relationship, if one is declared.
    ///
    /// # Errors
    ///
    /// Returns a metadata error if the relationship is unknown.
    pub fn inverse_of(
        &self,
        relationship: &RelationshipDescriptor,
    ) -> CoreResult<Option<&RelationshipDescriptor>> {
        match &relationship.inverse {
            Some(inverse) => self.relationship(&relationship.destination, inverse).map(Some),
            None => Ok(None),
        }
    }

    /// Relationships of `from` whose destination is `to`.
    pub fn relationships_between<'a>(
        &'a self,
        from: &'a EntityMetadata,
        to: &'a str,
    ) -> impl Iterator<Item = &'a RelationshipDescriptor> + 'a {
        from.relationships()
            .iter()
            .filter(move |r| r.destination == to)
    }

    fn validate_entity(&self, entity: &EntityMetadata) -> CoreResult<()> {
        let name = entity.name();
        let mut seen = HashSet::new();
        let members = entity
            .attributes()
            .iter()
            .map(|a| a.name.as_str())
            .chain(entity.relationships().iter().map(|r| r.name.as_str()));
        for member in members {
            if !seen.insert(member) {
                return Err(CoreError::invalid_schema(format!(
                    "duplicate member {name}.{member}"
                )));
            }
        }

        if entity.attributes().iter().filter(|a| a.primary_key).count() > 1 {
            return Err(CoreError::invalid_schema(format!(
                "entity {name} marks more than one primary key"
            )));
        }
        if let Some(key) = entity.primary_key() {
            if !key.attribute_type.is_keyable() {
                return Err(CoreError::invalid_schema(format!(
                    "primary key {name}.{} has unkeyable type {:?}",
                    key.name, key.attribute_type
                )));
            }
        }

        for relationship in entity.relationships() {
            let destination = self.get(&relationship.destination).ok_or_else(|| {
                CoreError::invalid_schema(format!(
                    "{name}.{} targets unknown entity {}",
                    relationship.name, relationship.destination
                ))
            })?;
            if relationship.ordered && !relationship.is_to_many() {
                return Err(CoreError::invalid_schema(format!(
                    "{name}.{} is ordered but to-one",
                    relationship.name
                )));
            }
            if let Some(inverse_name) = &relationship.inverse {
                let inverse = destination.relationship(inverse_name).ok_or_else(|| {
                    CoreError::invalid_schema(format!(
                        "{name}.{} declares missing inverse {}.{inverse_name}",
                        relationship.name, relationship.destination
                    ))
                })?;
                let points_back = inverse.destination == name
                    && inverse
                        .inverse
                        .as_deref()
                        .map_or(true, |back| back == relationship.name);
                if !points_back {
                    return Err(CoreError::invalid_schema(format!(
                        "inverse {}.{inverse_name} does not point back to {name}.{}",
                        relationship.destination, relationship.name
                    )));
                }
            }
        }
        Ok(())
    }
}
