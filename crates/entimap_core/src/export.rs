//! Turning persisted objects back into external records.

use crate::coerce::{TransformerRegistry, ValueCoercer};
use crate::config::{ExportOptions, RelationshipExport};
use crate::error::{CoreError, CoreResult};
use crate::inflection::InflectionCache;
use crate::keys::KeyMapper;
use crate::object::ObjectId;
use crate::predicate::Predicate;
use crate::store::Store;
use entimap_codec::{Record, Value, KEY_PATH_SEPARATOR};

/// Deepest nesting rebuilt from dotted remote keys.
const MAX_KEY_PATH_DEPTH: usize = 3;

/// Renders objects as records.
#[derive(Debug, Clone, Copy)]
pub struct Exporter<'a> {
    coercer: ValueCoercer<'a>,
    options: &'a ExportOptions,
    cache: Option<&'a InflectionCache>,
}

impl<'a> Exporter<'a> {
    /// Creates an exporter using built-in value conversion.
    pub fn new(options: &'a ExportOptions) -> Self {
        Self {
            coercer: ValueCoercer::plain(),
            options,
            cache: None,
        }
    }

    /// Applies registered reverse transforms.
    #[must_use]
    pub fn with_transformers(mut self, transformers: &'a TransformerRegistry) -> Self {
        self.coercer = ValueCoercer::new(transformers);
        self
    }

    /// Memoises key inflection.
    #[must_use]
    pub fn with_cache(mut self, cache: Option<&'a InflectionCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Exports one object with its relationships.
    ///
    /// Unset attributes export as null. A to-one relationship pointing
    /// back at the entity being exported from is left out, and an object
    /// already on the current export path is never descended into again.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectNotFound`] for a missing object, or a
    /// store error while reading.
    pub fn export<S: Store + ?Sized>(&self, store: &S, id: ObjectId) -> CoreResult<Record> {
        let mut path = Vec::new();
        self.export_object(store, id, None, &mut path)
    }

    /// Exports every object of `entity` matching `predicate`.
    ///
    /// # Errors
    ///
    /// Fails like [`Store::fetch`] and [`export`](Self::export).
    pub fn export_all<S: Store + ?Sized>(
        &self,
        store: &S,
        entity: &str,
        predicate: Option<&Predicate>,
    ) -> CoreResult<Vec<Record>> {
        store
            .fetch(entity, predicate)?
            .into_iter()
            .map(|id| self.export(store, id))
            .collect()
    }

    fn export_object<S: Store + ?Sized>(
        &self,
        store: &S,
        id: ObjectId,
        parent_entity: Option<&str>,
        path: &mut Vec<ObjectId>,
    ) -> CoreResult<Record> {
        let schema = store.schema();
        let entity = store
            .entity_of(id)
            .ok_or(CoreError::ObjectNotFound { id })?
            .to_string();
        let metadata = schema.entity(&entity)?;
        let mapper = KeyMapper::new(metadata, self.options.inflection).with_cache(self.cache);
        let mode = self.options.relationships;

        let mut record = Record::with_capacity(metadata.attributes().len());
        for attribute in metadata.attributes().iter().filter(|a| a.exportable) {
            let value = store.get(id, &attribute.name)?;
            let external = self
                .coercer
                .to_external(value.as_ref(), attribute, self.options);
            let key = mapper.remote_key_for_attribute(attribute, mode);
            let segments: Vec<&str> = key.splitn(MAX_KEY_PATH_DEPTH, KEY_PATH_SEPARATOR).collect();
            insert_segments(&mut record, &segments, external);
        }

        if mode == RelationshipExport::None {
            return Ok(record);
        }

        path.push(id);
        for relationship in metadata.relationships().iter().filter(|r| r.exportable) {
            if !relationship.is_to_many() && parent_entity == Some(relationship.destination.as_str())
            {
                continue;
            }
            let key = mapper.relationship_export_key(relationship, mode);
            let members: Vec<ObjectId> = store
                .related(id, &relationship.name)?
                .into_iter()
                .filter(|member| !path.contains(member))
                .collect();

            if relationship.is_to_many() {
                let mut children = Vec::with_capacity(members.len());
                for member in members {
                    let child = self.export_object(store, member, Some(entity.as_str()), path)?;
                    if !child.is_empty() {
                        children.push(child);
                    }
                }
                let value = match mode {
                    RelationshipExport::Nested => Value::Map(
                        children
                            .into_iter()
                            .enumerate()
                            .map(|(index, child)| (index.to_string(), Value::Map(child)))
                            .collect(),
                    ),
                    _ => Value::Array(children.into_iter().map(Value::Map).collect()),
                };
                record.insert(key, value);
            } else if let Some(member) = members.first() {
                let child = self.export_object(store, *member, Some(entity.as_str()), path)?;
                if !child.is_empty() {
                    record.insert(key, Value::Map(child));
                }
            }
        }
        path.pop();
        Ok(record)
    }
}

fn insert_segments(record: &mut Record, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            record.insert(*last, value);
        }
        [head, rest @ ..] => {
            if !matches!(record.get(head), Some(Value::Map(_))) {
                record.insert(*head, Value::Map(Record::new()));
            }
            if let Some(Value::Map(child)) = record.get_mut(head) {
                insert_segments(child, rest, value);
            }
        }
    }
}
