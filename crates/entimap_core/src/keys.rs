//! Mapping between external record keys and local attribute names.

use crate::config::RelationshipExport;
use crate::inflection::{capitalize, Inflection, InflectionCache, Inflector, RESERVED_KEYS};
use crate::schema::{
    AttributeDescriptor, EntityMetadata, RelationshipDescriptor, DEFAULT_PRIMARY_KEYS,
};
use entimap_codec::KEY_PATH_SEPARATOR;

/// Remote name of the primary key when nothing overrides it.
pub const REMOTE_PRIMARY_KEY: &str = "id";

/// Local attribute that exports as `_destroy` under nested export.
pub const DESTROY_KEY: &str = "destroy";

/// Suffix appended to relationship keys under nested export.
const NESTED_ATTRIBUTES: &str = "attributes";

/// Resolves keys for one entity in one naming convention.
#[derive(Debug, Clone, Copy)]
pub struct KeyMapper<'a> {
    metadata: &'a EntityMetadata,
    inflector: Inflector<'a>,
    inflection: Inflection,
}

impl<'a> KeyMapper<'a> {
    /// Creates a mapper for `metadata`.
    pub fn new(metadata: &'a EntityMetadata, inflection: Inflection) -> Self {
        Self {
            metadata,
            inflector: Inflector::default(),
            inflection,
        }
    }

    /// Memoises inflection through `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Option<&'a InflectionCache>) -> Self {
        self.inflector = Inflector::new(cache);
        self
    }

    /// The entity this mapper works on.
    pub fn metadata(&self) -> &'a EntityMetadata {
        self.metadata
    }

    /// The external naming convention.
    pub fn inflection(&self) -> Inflection {
        self.inflection
    }

    /// Prefix the entity name puts in front of reserved words.
    fn reserved_prefix(&self) -> String {
        match self.inflection {
            Inflection::SnakeCase => {
                format!("{}_", self.inflector.snake_case(self.metadata.name()))
            }
            Inflection::CamelCase => self
                .inflector
                .camel_case(self.metadata.name())
                .unwrap_or_else(|| self.metadata.name().to_string()),
        }
    }

    fn prefixed_reserved(&self, word: &str) -> String {
        match self.inflection {
            Inflection::SnakeCase => format!("{}{word}", self.reserved_prefix()),
            Inflection::CamelCase => format!("{}{}", self.reserved_prefix(), capitalize(word)),
        }
    }

    /// Finds the attribute an external key fills.
    ///
    /// ```
    /// use entimap_core::inflection::Inflection;
    /// use entimap_core::keys::KeyMapper;
    /// use entimap_core::schema::{AttributeDescriptor, EntityMetadata};
    ///
    /// let user = EntityMetadata::new("User")
    ///     .with_attribute(AttributeDescriptor::integer("remoteID"))
    ///     .with_attribute(AttributeDescriptor::string("firstName"))
    ///     .with_attribute(AttributeDescriptor::string("userDescription"));
    /// let mapper = KeyMapper::new(&user, Inflection::SnakeCase);
    ///
    /// assert_eq!(mapper.attribute_for_remote_key("first_name").unwrap().name, "firstName");
    /// assert_eq!(mapper.attribute_for_remote_key("description").unwrap().name, "userDescription");
    /// assert_eq!(mapper.attribute_for_remote_key("id").unwrap().name, "remoteID");
    /// assert!(mapper.attribute_for_remote_key("unknown").is_none());
    /// ```
    pub fn attribute_for_remote_key(&self, remote_key: &str) -> Option<&'a AttributeDescriptor> {
        let attributes = self.metadata.attributes();

        let custom = attributes.iter().find(|a| {
            a.remote_key.as_deref() == Some(remote_key) || a.remote_key_root() == Some(remote_key)
        });
        if custom.is_some() {
            return custom;
        }

        if let Some(found) = attributes.iter().find(|a| a.name == remote_key) {
            return Some(found);
        }

        let is_reserved = RESERVED_KEYS.contains(&remote_key);
        if !is_reserved {
            if let Some(local) = self.inflector.camel_case(remote_key) {
                if let Some(found) = attributes.iter().find(|a| a.name == local) {
                    return Some(found);
                }
            }
        } else if let Some(local) = self
            .inflector
            .camel_case(&self.prefixed_reserved(remote_key))
        {
            if let Some(found) = attributes.iter().find(|a| a.name == local) {
                return Some(found);
            }
        }

        if remote_key == REMOTE_PRIMARY_KEY {
            return DEFAULT_PRIMARY_KEYS
                .iter()
                .find_map(|name| self.metadata.attribute(name));
        }
        None
    }

    /// Attributes whose custom key path shares `remote_key`'s first segment.
    pub fn attributes_for_remote_key_path(&self, remote_key: &str) -> Vec<&'a AttributeDescriptor> {
        let root = remote_key
            .split(KEY_PATH_SEPARATOR)
            .next()
            .unwrap_or(remote_key);
        self.metadata
            .attributes()
            .iter()
            .filter(|a| a.remote_key_root() == Some(root))
            .collect()
    }

    /// The external key an attribute exports under.
    ///
    /// May be a dotted key path when the attribute has one as custom key.
    pub fn remote_key_for_attribute(
        &self,
        attribute: &AttributeDescriptor,
        relationships: RelationshipExport,
    ) -> String {
        if let Some(custom) = &attribute.remote_key {
            return custom.clone();
        }
        let local = attribute.name.as_str();
        let remote = if DEFAULT_PRIMARY_KEYS.contains(&local) {
            REMOTE_PRIMARY_KEY.to_string()
        } else if local == DESTROY_KEY && relationships == RelationshipExport::Nested {
            format!("_{DESTROY_KEY}")
        } else {
            self.inflector.remote_form(local, self.inflection)
        };

        let reserved = RESERVED_KEYS
            .iter()
            .any(|word| self.prefixed_reserved(word) == remote);
        if reserved {
            let bare = remote.replacen(&self.reserved_prefix(), "", 1);
            return match self.inflection {
                Inflection::SnakeCase => bare,
                Inflection::CamelCase => self.inflector.camel_case(&bare).unwrap_or(bare),
            };
        }
        remote
    }

    /// The entity's primary-key attribute.
    pub fn primary_key_attribute(&self) -> Option<&'a AttributeDescriptor> {
        self.metadata.primary_key()
    }

    /// External key of the primary key.
    pub fn remote_primary_key(&self) -> Option<String> {
        self.primary_key_attribute()
            .map(|key| self.remote_key_for_attribute(key, RelationshipExport::Array))
    }

    /// External key carrying a relationship's nested payload.
    pub fn remote_key_for_relationship(&self, relationship: &RelationshipDescriptor) -> String {
        match &relationship.remote_key {
            Some(custom) => custom.clone(),
            None => self.inflector.remote_form(&relationship.name, self.inflection),
        }
    }

    /// External key carrying bare ids for a relationship: `company_id` /
    /// `companyID` for to-one, `tags_ids` / `tagsIDs` for to-many.
    pub fn reference_key_for_relationship(&self, relationship: &RelationshipDescriptor) -> String {
        let base = self.remote_key_for_relationship(relationship);
        let suffix = match (self.inflection, relationship.is_to_many()) {
            (Inflection::SnakeCase, false) => "_id",
            (Inflection::SnakeCase, true) => "_ids",
            (Inflection::CamelCase, false) => "ID",
            (Inflection::CamelCase, true) => "IDs",
        };
        format!("{base}{suffix}")
    }

    /// Key a relationship exports under.
    pub fn relationship_export_key(
        &self,
        relationship: &RelationshipDescriptor,
        mode: RelationshipExport,
    ) -> String {
        let key = self.remote_key_for_relationship(relationship);
        match (mode, self.inflection) {
            (RelationshipExport::Nested, Inflection::SnakeCase) => {
                format!("{key}_{NESTED_ATTRIBUTES}")
            }
            (RelationshipExport::Nested, Inflection::CamelCase) => {
                format!("{key}{}", capitalize(NESTED_ATTRIBUTES))
            }
            _ => key,
        }
    }
}
