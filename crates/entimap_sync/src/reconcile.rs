//! Diffing a batch of records against the persisted objects in scope.

use crate::error::{SyncError, SyncResult};
use crate::operations::Operations;
use entimap_codec::{Record, Value};
use entimap_core::{
    EntityMetadata, Inflection, InflectionCache, KeyMapper, KeyValue, NativeValue, ObjectId,
    Predicate, Store, ValueCoercer,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// The mutations one batch implies for one entity.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    /// Records with new keys, in first-occurrence order.
    pub inserts: Vec<Record>,
    /// Matched objects with the record to apply.
    pub updates: Vec<(ObjectId, Record)>,
    /// Scoped objects whose key is missing from the batch.
    pub deletes: Vec<ObjectId>,
    /// Extra objects sharing a key with an earlier one.
    pub duplicates: Vec<ObjectId>,
}

/// Matches records to objects of one entity by primary key.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    metadata: &'a EntityMetadata,
    mapper: KeyMapper<'a>,
    coercer: ValueCoercer<'a>,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler for `metadata`.
    pub fn new(
        metadata: &'a EntityMetadata,
        inflection: Inflection,
        coercer: ValueCoercer<'a>,
        cache: Option<&'a InflectionCache>,
    ) -> Self {
        Self {
            metadata,
            mapper: KeyMapper::new(metadata, inflection).with_cache(cache),
            coercer,
        }
    }

    /// The key mapper in use.
    pub fn mapper(&self) -> &KeyMapper<'a> {
        &self.mapper
    }

    /// Returns true if the entity has a primary key.
    pub fn is_keyed(&self) -> bool {
        self.metadata.primary_key().is_some()
    }

    /// The primary-key value a record carries, coerced into the key's type.
    ///
    /// Returns `Ok(None)` if the entity has no primary key.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MissingPrimaryKey`] if the record has no key,
    /// a null key, or one that does not coerce.
    pub fn record_key(&self, record: &Record) -> SyncResult<Option<NativeValue>> {
        let Some(key_attribute) = self.metadata.primary_key() else {
            return Ok(None);
        };
        let remote = self.mapper.remote_primary_key().unwrap_or_default();
        let missing = || SyncError::missing_primary_key(self.metadata.name(), &remote);

        let value = record.get_path(&remote).or_else(|| {
            record.iter().find_map(|(key, value)| {
                self.mapper
                    .attribute_for_remote_key(key)
                    .filter(|a| a.name == key_attribute.name)
                    .map(|_| value)
            })
        });
        value
            .and_then(|value| self.coerce_key(value))
            .map(Some)
            .ok_or_else(missing)
    }

    /// Coerces a bare external value into the primary key's type.
    pub fn coerce_key(&self, value: &Value) -> Option<NativeValue> {
        let key_attribute = self.metadata.primary_key()?;
        self.coercer
            .to_native(value, key_attribute)
            .ok()
            .flatten()
            .filter(|native| native.key().is_some())
    }

    /// Key form of a record's primary key.
    ///
    /// # Errors
    ///
    /// Fails like [`record_key`](Self::record_key).
    pub fn record_key_value(&self, record: &Record) -> SyncResult<Option<KeyValue>> {
        Ok(self.record_key(record)?.and_then(|v| v.key()))
    }

    /// Key form of an object's stored primary key.
    ///
    /// # Errors
    ///
    /// Returns a store error if the object cannot be read.
    pub fn object_key<S: Store + ?Sized>(
        &self,
        store: &S,
        id: ObjectId,
    ) -> SyncResult<Option<KeyValue>> {
        let Some(key_attribute) = self.metadata.primary_key() else {
            return Ok(None);
        };
        Ok(store
            .get(id, &key_attribute.name)?
            .and_then(|value| value.key()))
    }

    /// First object of the entity, anywhere in the store, with this key.
    ///
    /// # Errors
    ///
    /// Returns a store error if fetching fails.
    pub fn find_by_key<S: Store + ?Sized>(
        &self,
        store: &S,
        key: &NativeValue,
    ) -> SyncResult<Option<ObjectId>> {
        let Some(key_attribute) = self.metadata.primary_key() else {
            return Ok(None);
        };
        let predicate = Predicate::Eq {
            attribute: key_attribute.name.clone(),
            value: Some(key.clone()),
        };
        Ok(store
            .fetch(self.metadata.name(), Some(&predicate))?
            .first()
            .copied())
    }

    /// Partitions `records` against the objects in `scope`.
    ///
    /// Among records sharing a key the last one wins and takes the first
    /// one's position. Among scoped objects sharing a key the first in
    /// `scope` order survives and the rest are listed as duplicates. An
    /// entity without a primary key cannot be matched: every record is an
    /// insert and, when deletes are allowed, every scoped object a delete.
    ///
    /// ```
    /// use entimap_codec::Record;
    /// use entimap_core::{AttributeDescriptor, EntityMetadata, Inflection, MemoryStore, Schema, Store, ValueCoercer};
    /// use entimap_sync::{Operations, Reconciler};
    ///
    /// let schema = Schema::new(vec![
    ///     EntityMetadata::new("User").with_attribute(AttributeDescriptor::integer("remoteID")),
    /// ]).unwrap();
    /// let mut store = MemoryStore::new(schema.clone());
    /// let existing = store.insert("User").unwrap();
    /// store.set(existing, "remoteID", Some(1.into())).unwrap();
    ///
    /// let user = schema.entity("User").unwrap();
    /// let reconciler = Reconciler::new(user, Inflection::SnakeCase, ValueCoercer::plain(), None);
    /// let records = vec![Record::from_pairs([("id", 1)]), Record::from_pairs([("id", 2)])];
    /// let plan = reconciler.plan(&store, &[existing], records, Operations::ALL).unwrap();
    /// assert_eq!(plan.updates.len(), 1);
    /// assert_eq!(plan.inserts.len(), 1);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MissingPrimaryKey`] for a record without a
    /// usable key, or a store error.
    pub fn plan<S: Store + ?Sized>(
        &self,
        store: &S,
        scope: &[ObjectId],
        records: Vec<Record>,
        operations: Operations,
    ) -> SyncResult<ReconcilePlan> {
        let mut plan = ReconcilePlan::default();

        if !self.is_keyed() {
            if operations.contains(Operations::INSERT) {
                plan.inserts = records;
            }
            if operations.contains(Operations::DELETE) {
                plan.deletes = scope.to_vec();
            }
            return Ok(plan);
        }

        let mut persisted: HashMap<KeyValue, ObjectId> = HashMap::with_capacity(scope.len());
        for &id in scope {
            let Some(key) = self.object_key(store, id)? else {
                continue;
            };
            if persisted.contains_key(&key) {
                warn!(entity = self.metadata.name(), key = %key, object = %id, "duplicate object for key");
                plan.duplicates.push(id);
            } else {
                persisted.insert(key, id);
            }
        }

        let mut incoming: Vec<(KeyValue, Record)> = Vec::with_capacity(records.len());
        let mut positions: HashMap<KeyValue, usize> = HashMap::with_capacity(records.len());
        for record in records {
            let key = self
                .record_key_value(&record)?
                .ok_or_else(|| SyncError::missing_primary_key(self.metadata.name(), "id"))?;
            match positions.get(&key) {
                Some(&index) => {
                    debug!(entity = self.metadata.name(), key = %key, "repeated key, keeping last record");
                    incoming[index].1 = record;
                }
                None => {
                    positions.insert(key.clone(), incoming.len());
                    incoming.push((key, record));
                }
            }
        }

        let mut matched = HashSet::with_capacity(incoming.len());
        for (key, record) in incoming {
            match persisted.get(&key) {
                Some(&id) => {
                    matched.insert(id);
                    if operations.contains(Operations::UPDATE) {
                        plan.updates.push((id, record));
                    }
                }
                None => {
                    if operations.contains(Operations::INSERT) {
                        plan.inserts.push(record);
                    }
                }
            }
        }

        if operations.contains(Operations::DELETE) {
            let duplicates: HashSet<_> = plan.duplicates.iter().copied().collect();
            plan.deletes = scope
                .iter()
                .copied()
                .filter(|id| !matched.contains(id) && !duplicates.contains(id))
                .collect();
        }
        Ok(plan)
    }
}
