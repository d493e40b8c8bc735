//! Filling objects from records and wiring their relationships.
//!
//! Every record that reaches an object becomes a [`Job`]. Attributes are
//! written as soon as the job is queued, so lookups by key see objects
//! created earlier in the same pass. Relationships are resolved when the
//! job is taken off the queue, which may queue further jobs for nested
//! records. Each job only expands its own payload, so self-referential
//! entities finish once the payload is exhausted.

use crate::config::{OrphanPolicy, SyncConfig};
use crate::delegate::SyncDelegate;
use crate::error::SyncResult;
use crate::operations::Operations;
use crate::payload::{ListItem, RelationshipPayload};
use crate::reconcile::Reconciler;
use crate::state::SyncOutcome;
use entimap_codec::{Record, Value};
use entimap_core::{
    AttributeDescriptor, EntityMetadata, InflectionCache, KeyMapper, KeyValue, ObjectId,
    Predicate, RelationshipDescriptor, Schema, Store, ValueCoercer,
};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobKind {
    Insert,
    Update,
}

/// A record waiting for its relationships to be resolved.
#[derive(Debug)]
struct Job {
    object: ObjectId,
    entity: String,
    record: Record,
    operations: Operations,
    /// Relationship leading back to the object that queued this job.
    skip: Option<String>,
    kind: JobKind,
}

/// Applies records to objects within one pass.
pub(crate) struct Resolver<'a, S: Store + ?Sized> {
    store: &'a mut S,
    schema: &'a Schema,
    config: &'a SyncConfig,
    coercer: ValueCoercer<'a>,
    cache: Option<&'a InflectionCache>,
    delegate: &'a mut dyn SyncDelegate,
    queue: VecDeque<Job>,
    orphans: Vec<ObjectId>,
    outcome: SyncOutcome,
}

impl<'a, S: Store + ?Sized> Resolver<'a, S> {
    pub(crate) fn new(
        store: &'a mut S,
        schema: &'a Schema,
        config: &'a SyncConfig,
        coercer: ValueCoercer<'a>,
        cache: Option<&'a InflectionCache>,
        delegate: &'a mut dyn SyncDelegate,
    ) -> Self {
        Self {
            store,
            schema,
            config,
            coercer,
            cache,
            delegate,
            queue: VecDeque::new(),
            orphans: Vec::new(),
            outcome: SyncOutcome::default(),
        }
    }

    pub(crate) fn store(&mut self) -> &mut S {
        &mut *self.store
    }

    pub(crate) fn outcome_mut(&mut self) -> &mut SyncOutcome {
        &mut self.outcome
    }

    pub(crate) fn into_outcome(self) -> SyncOutcome {
        self.outcome
    }

    pub(crate) fn reconciler<'m>(&self, metadata: &'m EntityMetadata) -> Reconciler<'m>
    where
        'a: 'm,
    {
        Reconciler::new(metadata, self.config.inflection, self.coercer, self.cache)
    }

    fn mapper(&self, metadata: &'a EntityMetadata) -> KeyMapper<'a> {
        KeyMapper::new(metadata, self.config.inflection).with_cache(self.cache)
    }

    /// Creates an object for `record` and queues its relationships.
    pub(crate) fn enqueue_insert(
        &mut self,
        entity: &str,
        record: Record,
        parent: Option<ObjectId>,
        operations: Operations,
        skip: Option<String>,
    ) -> SyncResult<ObjectId> {
        let record = self.delegate.will_insert(entity, record, parent);
        let metadata = self.schema.entity(entity)?;
        let object = self.store.insert(entity)?;
        self.fill_attributes(metadata, object, &record)?;
        self.outcome.inserted += 1;
        trace!(entity, object = %object, "queued insert");
        self.queue.push_back(Job {
            object,
            entity: entity.to_string(),
            record,
            operations,
            skip,
            kind: JobKind::Insert,
        });
        Ok(object)
    }

    /// Applies `record` to an existing object and queues its relationships.
    pub(crate) fn enqueue_update(
        &mut self,
        entity: &str,
        object: ObjectId,
        record: Record,
        operations: Operations,
        skip: Option<String>,
    ) -> SyncResult<()> {
        let record = self.delegate.will_update(entity, record, object);
        let metadata = self.schema.entity(entity)?;
        self.fill_attributes(metadata, object, &record)?;
        self.outcome.updated += 1;
        trace!(entity, object = %object, "queued update");
        self.queue.push_back(Job {
            object,
            entity: entity.to_string(),
            record,
            operations,
            skip,
            kind: JobKind::Update,
        });
        Ok(())
    }

    /// Deletes an object and counts it.
    pub(crate) fn delete(&mut self, object: ObjectId) -> SyncResult<()> {
        self.store.delete(object)?;
        self.outcome.deleted += 1;
        Ok(())
    }

    /// Resolves queued jobs until none are left.
    pub(crate) fn drain(&mut self) -> SyncResult<()> {
        while let Some(job) = self.queue.pop_front() {
            self.process(&job)?;
            match job.kind {
                JobKind::Insert => self.delegate.did_insert(&job.entity, &job.record, job.object),
                JobKind::Update => self.delegate.did_update(&job.entity, &job.record, job.object),
            }
        }
        Ok(())
    }

    fn fill_attributes(
        &mut self,
        metadata: &'a EntityMetadata,
        object: ObjectId,
        record: &Record,
    ) -> SyncResult<()> {
        let mapper = self.mapper(metadata);
        for (key, value) in record.iter() {
            let nested: Vec<&AttributeDescriptor> = mapper
                .attributes_for_remote_key_path(key)
                .into_iter()
                .filter(|a| a.has_key_path())
                .collect();
            if !nested.is_empty() && !key.contains(entimap_codec::KEY_PATH_SEPARATOR) {
                match value {
                    Value::Map(_) => {
                        for attribute in nested {
                            let path = attribute.remote_key.as_deref().unwrap_or_default();
                            // Absent leaves keep their value
                            if let Some(leaf) = record.get_path(path) {
                                self.assign(object, attribute, leaf)?;
                            }
                        }
                    }
                    Value::Null => {
                        for attribute in nested {
                            self.store.set(object, &attribute.name, None)?;
                        }
                    }
                    other => {
                        warn!(
                            entity = metadata.name(),
                            key,
                            found = other.kind(),
                            "expected an object for nested keys"
                        );
                        self.outcome.coercion_failures += 1;
                    }
                }
                continue;
            }

            match mapper.attribute_for_remote_key(key) {
                Some(attribute) => self.assign(object, attribute, value)?,
                None => trace!(entity = metadata.name(), key, "no attribute for key"),
            }
        }
        Ok(())
    }

    fn assign(
        &mut self,
        object: ObjectId,
        attribute: &AttributeDescriptor,
        value: &Value,
    ) -> SyncResult<()> {
        match self.coercer.to_native(value, attribute) {
            Ok(native) => self.store.set(object, &attribute.name, native)?,
            Err(e) => {
                warn!(object = %object, error = %e, "skipping field");
                self.outcome.coercion_failures += 1;
            }
        }
        Ok(())
    }

    fn process(&mut self, job: &Job) -> SyncResult<()> {
        let metadata = self.schema.entity(&job.entity)?;
        let mapper = self.mapper(metadata);
        for relationship in metadata.relationships() {
            if job.skip.as_deref() == Some(relationship.name.as_str()) {
                continue;
            }
            let payload = RelationshipPayload::classify(&job.record, &mapper, relationship);
            if payload == RelationshipPayload::Absent {
                continue;
            }
            debug!(
                entity = %job.entity,
                relationship = %relationship.name,
                object = %job.object,
                "resolving relationship"
            );
            let operations = job.operations.relationship_operations();
            if relationship.is_to_many() {
                self.resolve_to_many(job.object, relationship, payload, operations)?;
            } else {
                self.resolve_to_one(job.object, relationship, payload, operations)?;
            }
        }
        Ok(())
    }

    fn resolve_to_one(
        &mut self,
        owner: ObjectId,
        relationship: &'a RelationshipDescriptor,
        payload: RelationshipPayload,
        operations: Operations,
    ) -> SyncResult<()> {
        let destination = self.schema.entity(&relationship.destination)?;
        let current = self.store.related(owner, &relationship.name)?;
        let target = match payload {
            RelationshipPayload::Null => {
                if operations.contains(Operations::DELETE) && !current.is_empty() {
                    self.store.set_related(owner, &relationship.name, &[])?;
                }
                return Ok(());
            }
            RelationshipPayload::ScalarRef(value) => {
                let reconciler = self.reconciler(destination);
                match reconciler.coerce_key(&value) {
                    Some(key) => reconciler.find_by_key(&*self.store, &key)?,
                    None => None,
                }
            }
            RelationshipPayload::NestedRecord(record) => {
                self.upsert_member(owner, relationship, destination, record, &HashMap::new(), operations)?
            }
            RelationshipPayload::Absent | RelationshipPayload::RecordList { .. } => None,
        };

        match target {
            Some(target) if current != [target] => {
                self.store
                    .set_related(owner, &relationship.name, &[target])?;
            }
            Some(_) => {}
            None => debug!(relationship = %relationship.name, "no target to link"),
        }
        Ok(())
    }

    fn resolve_to_many(
        &mut self,
        owner: ObjectId,
        relationship: &'a RelationshipDescriptor,
        payload: RelationshipPayload,
        operations: Operations,
    ) -> SyncResult<()> {
        let RelationshipPayload::RecordList {
            items,
            references_only,
        } = payload
        else {
            return Ok(());
        };
        let destination = self.schema.entity(&relationship.destination)?;
        let reconciler = self.reconciler(destination);
        let current = self.store.related(owner, &relationship.name)?;

        let mut linked = HashMap::with_capacity(current.len());
        for &member in &current {
            if let Some(key) = reconciler.object_key(&*self.store, member)? {
                linked.entry(key).or_insert(member);
            }
        }

        let mut desired: Vec<ObjectId> = Vec::with_capacity(items.len());
        for item in items {
            let member = match item {
                ListItem::Record(record) => {
                    self.upsert_member(owner, relationship, destination, record, &linked, operations)?
                }
                ListItem::Reference(value) => match reconciler.coerce_key(&value) {
                    Some(key) => match key.key().and_then(|k| linked.get(&k).copied()) {
                        Some(found) => Some(found),
                        None => reconciler.find_by_key(&*self.store, &key)?,
                    },
                    None => None,
                },
            };
            match member {
                Some(member) if !desired.contains(&member) => desired.push(member),
                Some(_) => {}
                None => debug!(relationship = %relationship.name, "skipping unresolved member"),
            }
        }

        let dropped: Vec<ObjectId> = current
            .iter()
            .copied()
            .filter(|member| !desired.contains(member))
            .collect();
        if operations.contains(Operations::DELETE) {
            if !references_only && self.config.orphan_policy == OrphanPolicy::DeleteUnreferenced {
                self.orphans.extend(&dropped);
            }
        } else {
            desired.extend(dropped);
        }

        if desired != current {
            self.store
                .set_related(owner, &relationship.name, &desired)?;
        }
        Ok(())
    }

    /// Finds or creates the object a nested record describes.
    ///
    /// Members already linked to the owner are matched first, then the
    /// whole destination entity.
    fn upsert_member(
        &mut self,
        owner: ObjectId,
        relationship: &'a RelationshipDescriptor,
        destination: &'a EntityMetadata,
        record: Record,
        linked: &HashMap<KeyValue, ObjectId>,
        operations: Operations,
    ) -> SyncResult<Option<ObjectId>> {
        let reconciler = self.reconciler(destination);
        let skip = relationship.inverse.clone();
        let existing = match reconciler.record_key(&record)? {
            Some(key) => match key.key().and_then(|k| linked.get(&k).copied()) {
                Some(found) => Some(found),
                None => reconciler.find_by_key(&*self.store, &key)?,
            },
            None => None,
        };

        match existing {
            Some(object) => {
                if operations.contains(Operations::UPDATE) {
                    self.enqueue_update(destination.name(), object, record, operations, skip)?;
                }
                Ok(Some(object))
            }
            None if operations.contains(Operations::INSERT) => self
                .enqueue_insert(destination.name(), record, Some(owner), operations, skip)
                .map(Some),
            None => Ok(None),
        }
    }

    /// Deletes dropped members nothing references any more.
    pub(crate) fn sweep_orphans(&mut self) -> SyncResult<()> {
        let mut seen = HashSet::new();
        let candidates: Vec<ObjectId> = self
            .orphans
            .drain(..)
            .filter(|id| seen.insert(*id))
            .collect();
        for candidate in candidates {
            if !self.store.exists(candidate) || self.is_referenced(candidate)? {
                continue;
            }
            debug!(object = %candidate, "deleting orphan");
            self.delete(candidate)?;
        }
        Ok(())
    }

    fn is_referenced(&self, object: ObjectId) -> SyncResult<bool> {
        let Some(entity) = self.store.entity_of(object) else {
            return Ok(false);
        };
        for owner in self.schema.entities() {
            for relationship in self.schema.relationships_between(owner, entity) {
                // A child pointing at its parent does not keep the parent alive
                let back_pointer = !relationship.is_to_many()
                    && self
                        .schema
                        .inverse_of(relationship)?
                        .is_some_and(RelationshipDescriptor::is_to_many);
                if back_pointer {
                    continue;
                }
                let predicate = Predicate::related_to(relationship.name.clone(), object);
                if !self.store.fetch(owner.name(), Some(&predicate))?.is_empty() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
