//! In-memory store with copy-on-write pending changes.

use super::Store;
use crate::coerce::NativeValue;
use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use crate::predicate::{ObjectView, Predicate};
use crate::schema::{Cardinality, Schema};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct ObjectState {
    entity: String,
    values: HashMap<String, NativeValue>,
    links: HashMap<String, Vec<ObjectId>>,
}

#[derive(Debug, Clone, Default)]
struct Graph {
    objects: HashMap<ObjectId, ObjectState>,
    /// Per-entity insertion order.
    order: HashMap<String, Vec<ObjectId>>,
}

impl Graph {
    fn object(&self, id: ObjectId) -> CoreResult<&ObjectState> {
        self.objects
            .get(&id)
            .ok_or(CoreError::ObjectNotFound { id })
    }

    fn object_mut(&mut self, id: ObjectId) -> CoreResult<&mut ObjectState> {
        self.objects
            .get_mut(&id)
            .ok_or(CoreError::ObjectNotFound { id })
    }

    fn unlink(&mut self, owner: ObjectId, relationship: &str, member: ObjectId) {
        if let Some(state) = self.objects.get_mut(&owner) {
            if let Some(links) = state.links.get_mut(relationship) {
                links.retain(|m| *m != member);
            }
        }
    }

    fn link(&mut self, owner: ObjectId, relationship: &str, member: ObjectId) {
        if let Some(state) = self.objects.get_mut(&owner) {
            let links = state.links.entry(relationship.to_string()).or_default();
            if !links.contains(&member) {
                links.push(member);
            }
        }
    }
}

impl ObjectView for Graph {
    fn attribute(&self, id: ObjectId, attribute: &str) -> Option<&NativeValue> {
        self.objects.get(&id)?.values.get(attribute)
    }

    fn related(&self, id: ObjectId, relationship: &str) -> &[ObjectId] {
        self.objects
            .get(&id)
            .and_then(|state| state.links.get(relationship))
            .map_or(&[][..], Vec::as_slice)
    }
}

/// A [`Store`] that keeps the whole graph in memory.
///
/// Reads see pending changes. The first write of a unit of work copies the
/// committed graph; [`save`](Store::save) swaps the copy in and
/// [`rollback`](Store::rollback) drops it, so a failed pass leaves no trace.
///
/// ```
/// use entimap_core::schema::{AttributeDescriptor, EntityMetadata};
/// use entimap_core::store::{MemoryStore, Store};
/// use entimap_core::Schema;
///
/// let schema = Schema::new(vec![
///     EntityMetadata::new("User").with_attribute(AttributeDescriptor::string("name")),
/// ]).unwrap();
/// let mut store = MemoryStore::new(schema);
/// let id = store.insert("User").unwrap();
/// store.set(id, "name", Some("Ada".into())).unwrap();
/// store.rollback();
/// assert!(!store.exists(id));
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    schema: Arc<Schema>,
    committed: Graph,
    working: Option<Graph>,
    failing_saves: usize,
    saves: usize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new(schema: Schema) -> Self {
        Self::with_shared_schema(Arc::new(schema))
    }

    /// Creates an empty store over a shared schema.
    pub fn with_shared_schema(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            committed: Graph::default(),
            working: None,
            failing_saves: 0,
            saves: 0,
        }
    }

    /// Makes the next `count` saves fail with a storage error.
    pub fn fail_next_saves(&mut self, count: usize) {
        self.failing_saves = count;
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves
    }

    /// Number of committed objects of `entity`.
    pub fn committed_len(&self, entity: &str) -> usize {
        self.committed.order.get(entity).map_or(0, Vec::len)
    }

    fn graph(&self) -> &Graph {
        self.working.as_ref().unwrap_or(&self.committed)
    }

    fn graph_mut(&mut self) -> &mut Graph {
        self.working
            .get_or_insert_with(|| self.committed.clone())
    }
}

impl Store for MemoryStore {
    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn fetch(&self, entity: &str, predicate: Option<&Predicate>) -> CoreResult<Vec<ObjectId>> {
        let metadata = self.schema.entity(entity)?;
        if let Some(predicate) = predicate {
            predicate.validate(metadata)?;
        }
        let graph = self.graph();
        let ids = graph.order.get(entity).map_or(&[][..], Vec::as_slice);
        Ok(ids
            .iter()
            .copied()
            .filter(|id| predicate.map_or(true, |p| p.matches(*id, graph)))
            .collect())
    }

    fn insert(&mut self, entity: &str) -> CoreResult<ObjectId> {
        self.schema.entity(entity)?;
        let id = ObjectId::new();
        let graph = self.graph_mut();
        graph.objects.insert(
            id,
            ObjectState {
                entity: entity.to_string(),
                values: HashMap::new(),
                links: HashMap::new(),
            },
        );
        graph.order.entry(entity.to_string()).or_default().push(id);
        Ok(id)
    }

    fn delete(&mut self, id: ObjectId) -> CoreResult<()> {
        let graph = self.graph_mut();
        let state = graph
            .objects
            .remove(&id)
            .ok_or(CoreError::ObjectNotFound { id })?;
        if let Some(order) = graph.order.get_mut(&state.entity) {
            order.retain(|other| *other != id);
        }
        for other in graph.objects.values_mut() {
            for links in other.links.values_mut() {
                links.retain(|member| *member != id);
            }
        }
        debug!(entity = %state.entity, object = %id, "deleted object");
        Ok(())
    }

    fn exists(&self, id: ObjectId) -> bool {
        self.graph().objects.contains_key(&id)
    }

    fn entity_of(&self, id: ObjectId) -> Option<&str> {
        self.graph().objects.get(&id).map(|s| s.entity.as_str())
    }

    fn get(&self, id: ObjectId, attribute: &str) -> CoreResult<Option<NativeValue>> {
        let state = self.graph().object(id)?;
        let metadata = self.schema.entity(&state.entity)?;
        if metadata.attribute(attribute).is_none() {
            return Err(CoreError::attribute_not_found(&state.entity, attribute));
        }
        Ok(state.values.get(attribute).cloned())
    }

    fn set(&mut self, id: ObjectId, attribute: &str, value: Option<NativeValue>) -> CoreResult<()> {
        let schema = Arc::clone(&self.schema);
        let entity = self.graph().object(id)?.entity.clone();
        let descriptor = schema
            .entity(&entity)?
            .attribute(attribute)
            .ok_or_else(|| CoreError::attribute_not_found(&entity, attribute))?;
        if let Some(value) = &value {
            if descriptor.transformer.is_none()
                && value.attribute_type() != descriptor.attribute_type
            {
                return Err(CoreError::invalid_operation(format!(
                    "{entity}.{attribute} is {:?}, got {:?}",
                    descriptor.attribute_type,
                    value.attribute_type()
                )));
            }
        }

        let state = self.graph_mut().object_mut(id)?;
        match value {
            Some(value) => state.values.insert(attribute.to_string(), value),
            None => state.values.remove(attribute),
        };
        Ok(())
    }

    fn related(&self, id: ObjectId, relationship: &str) -> CoreResult<Vec<ObjectId>> {
        let state = self.graph().object(id)?;
        self.schema.relationship(&state.entity, relationship)?;
        Ok(state.links.get(relationship).cloned().unwrap_or_default())
    }

    fn set_related(
        &mut self,
        id: ObjectId,
        relationship: &str,
        members: &[ObjectId],
    ) -> CoreResult<()> {
        let schema = Arc::clone(&self.schema);
        let entity = self.graph().object(id)?.entity.clone();
        let descriptor = schema.relationship(&entity, relationship)?;
        let inverse = schema.inverse_of(descriptor)?;

        let mut desired = Vec::with_capacity(members.len());
        for member in members {
            if desired.contains(member) {
                continue;
            }
            let member_entity = self.graph().object(*member)?.entity.as_str();
            if member_entity != descriptor.destination {
                return Err(CoreError::invalid_link(format!(
                    "{entity}.{relationship} expects {}, got {member_entity}",
                    descriptor.destination
                )));
            }
            desired.push(*member);
        }
        if descriptor.cardinality == Cardinality::ToOne && desired.len() > 1 {
            return Err(CoreError::invalid_link(format!(
                "{entity}.{relationship} is to-one, got {} members",
                desired.len()
            )));
        }

        let graph = self.graph_mut();
        let previous = graph
            .object_mut(id)?
            .links
            .insert(relationship.to_string(), desired.clone())
            .unwrap_or_default();

        // A to-one inverse moves each added member away from its old owner
        if let Some(inverse) = inverse {
            for removed in previous.iter().filter(|m| !desired.contains(m)) {
                graph.unlink(*removed, &inverse.name, id);
            }
            for added in desired.iter().filter(|m| !previous.contains(m)) {
                if inverse.cardinality == Cardinality::ToOne {
                    let owners = ObjectView::related(&*graph, *added, &inverse.name).to_vec();
                    for owner in owners.into_iter().filter(|o| *o != id) {
                        graph.unlink(owner, relationship, *added);
                    }
                    if let Some(state) = graph.objects.get_mut(added) {
                        state.links.insert(inverse.name.clone(), vec![id]);
                    }
                } else {
                    graph.link(*added, &inverse.name, id);
                }
            }
        }
        Ok(())
    }

    fn save(&mut self) -> CoreResult<()> {
        if self.failing_saves > 0 {
            self.failing_saves -= 1;
            return Err(CoreError::storage("injected save failure"));
        }
        if let Some(working) = self.working.take() {
            self.committed = working;
        }
        self.saves += 1;
        Ok(())
    }

    fn rollback(&mut self) {
        if self.working.take().is_some() {
            debug!("discarded pending changes");
        }
    }

    fn has_changes(&self) -> bool {
        self.working.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeDescriptor, EntityMetadata, RelationshipDescriptor};
    use crate::store::with_unit_of_work;

    fn schema() -> Schema {
        Schema::new(vec![
            EntityMetadata::new("User")
                .with_attribute(AttributeDescriptor::integer("remoteID"))
                .with_relationship(
                    RelationshipDescriptor::to_one("company", "Company").with_inverse("users"),
                )
                .with_relationship(
                    RelationshipDescriptor::to_many("notes", "Note").with_inverse("users"),
                ),
            EntityMetadata::new("Company")
                .with_attribute(AttributeDescriptor::integer("remoteID"))
                .with_relationship(
                    RelationshipDescriptor::to_many("users", "User").with_inverse("company"),
                ),
            EntityMetadata::new("Note")
                .with_attribute(AttributeDescriptor::integer("remoteID"))
                .with_relationship(
                    RelationshipDescriptor::to_many("users", "User").with_inverse("notes"),
                ),
        ])
        .unwrap()
    }

    #[test]
    fn insert_set_get() {
        let mut store = MemoryStore::new(schema());
        let id = store.insert("User").unwrap();
        assert!(store.has_changes());
        store.set(id, "remoteID", Some(1.into())).unwrap();
        assert_eq!(store.get(id, "remoteID").unwrap(), Some(NativeValue::Integer(1)));
        store.set(id, "remoteID", None).unwrap();
        assert_eq!(store.get(id, "remoteID").unwrap(), None);

        assert!(matches!(
            store.get(id, "age"),
            Err(CoreError::AttributeNotFound { .. })
        ));
        assert!(store.set(id, "remoteID", Some("one".into())).is_err());
        assert!(store.insert("Ghost").is_err());
    }

    #[test]
    fn fetch_in_insertion_order_with_predicate() {
        let mut store = MemoryStore::new(schema());
        let ids: Vec<_> = (0..4)
            .map(|n| {
                let id = store.insert("User").unwrap();
                store.set(id, "remoteID", Some(n.into())).unwrap();
                id
            })
            .collect();
        assert_eq!(store.fetch("User", None).unwrap(), ids);

        let odd = Predicate::is_in("remoteID", vec![1.into(), 3.into()]);
        assert_eq!(store.fetch("User", Some(&odd)).unwrap(), vec![ids[1], ids[3]]);
        assert!(matches!(
            store.fetch("User", Some(&Predicate::eq("age", 1))),
            Err(CoreError::InvalidPredicate { .. })
        ));
    }

    #[test]
    fn to_many_maintains_to_one_inverse() {
        let mut store = MemoryStore::new(schema());
        let acme = store.insert("Company").unwrap();
        let globex = store.insert("Company").unwrap();
        let ada = store.insert("User").unwrap();

        store.set_related(acme, "users", &[ada, ada]).unwrap();
        assert_eq!(store.related(acme, "users").unwrap(), vec![ada]);
        assert_eq!(store.related(ada, "company").unwrap(), vec![acme]);

        // Moving the user detaches it from its previous company
        store.set_related(globex, "users", &[ada]).unwrap();
        assert!(store.related(acme, "users").unwrap().is_empty());
        assert_eq!(store.related(ada, "company").unwrap(), vec![globex]);

        store.set_related(ada, "company", &[]).unwrap();
        assert!(store.related(globex, "users").unwrap().is_empty());
    }

    #[test]
    fn many_to_many_inverse() {
        let mut store = MemoryStore::new(schema());
        let ada = store.insert("User").unwrap();
        let bob = store.insert("User").unwrap();
        let note = store.insert("Note").unwrap();

        store.set_related(ada, "notes", &[note]).unwrap();
        store.set_related(bob, "notes", &[note]).unwrap();
        assert_eq!(store.related(note, "users").unwrap(), vec![ada, bob]);

        store.set_related(ada, "notes", &[]).unwrap();
        assert_eq!(store.related(note, "users").unwrap(), vec![bob]);
    }

    #[test]
    fn invalid_links_rejected() {
        let mut store = MemoryStore::new(schema());
        let ada = store.insert("User").unwrap();
        let acme = store.insert("Company").unwrap();
        let other = store.insert("Company").unwrap();
        let note = store.insert("Note").unwrap();

        assert!(matches!(
            store.set_related(ada, "company", &[acme, other]),
            Err(CoreError::InvalidLink { .. })
        ));
        assert!(matches!(
            store.set_related(ada, "company", &[note]),
            Err(CoreError::InvalidLink { .. })
        ));
    }

    #[test]
    fn delete_removes_links() {
        let mut store = MemoryStore::new(schema());
        let acme = store.insert("Company").unwrap();
        let ada = store.insert("User").unwrap();
        store.set_related(acme, "users", &[ada]).unwrap();

        store.delete(ada).unwrap();
        assert!(!store.exists(ada));
        assert!(store.related(acme, "users").unwrap().is_empty());
        assert!(matches!(
            store.delete(ada),
            Err(CoreError::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn unit_of_work_commits_or_rolls_back() {
        let mut store = MemoryStore::new(schema());
        let id = with_unit_of_work(&mut store, |s| s.insert("User")).unwrap();
        assert!(!store.has_changes());
        assert_eq!(store.committed_len("User"), 1);
        assert_eq!(store.save_count(), 1);

        let failed: CoreResult<()> = with_unit_of_work(&mut store, |s| {
            s.delete(id)?;
            Err(CoreError::invalid_operation("abort"))
        });
        assert!(failed.is_err());
        assert!(store.exists(id));

        store.fail_next_saves(1);
        let failed = with_unit_of_work(&mut store, |s| s.insert("User"));
        assert!(matches!(failed, Err(CoreError::Storage { .. })));
        assert_eq!(store.committed_len("User"), 1);
        assert!(!store.has_changes());
    }
}
