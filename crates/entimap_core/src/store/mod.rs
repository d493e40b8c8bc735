//! Persistence surface the sync engine writes through.
//!
//! A [`Store`] hands out object identities, holds typed attribute values
//! and relationship links, and keeps every change of a pass pending until
//! [`Store::save`]. [`with_unit_of_work`] wraps a pass so it either saves
//! once or rolls back.

mod memory;

pub use memory::MemoryStore;

use crate::coerce::NativeValue;
use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use crate::predicate::Predicate;
use crate::schema::{EntityMetadata, Schema};
use std::sync::Arc;

/// An entity graph with pending-change semantics.
pub trait Store {
    /// The schema every object conforms to.
    fn schema(&self) -> Arc<Schema>;

    /// Metadata of one entity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`] if the entity is unknown.
    fn metadata(&self, entity: &str) -> CoreResult<EntityMetadata> {
        self.schema().entity(entity).cloned()
    }

    /// Ids of `entity`'s objects matching `predicate`, in insertion order.
    ///
    /// # Errors
    ///
    /// Fails for an unknown entity or a predicate naming unknown members.
    fn fetch(&self, entity: &str, predicate: Option<&Predicate>) -> CoreResult<Vec<ObjectId>>;

    /// Creates an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`] if the entity is unknown.
    fn insert(&mut self, entity: &str) -> CoreResult<ObjectId>;

    /// Deletes an object and every link pointing at it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ObjectNotFound`] if the object does not exist.
    fn delete(&mut self, id: ObjectId) -> CoreResult<()>;

    /// Returns true if the object exists.
    fn exists(&self, id: ObjectId) -> bool;

    /// Entity name of an object.
    fn entity_of(&self, id: ObjectId) -> Option<&str>;

    /// Current value of an attribute.
    ///
    /// # Errors
    ///
    /// Fails for a missing object or an unknown attribute.
    fn get(&self, id: ObjectId, attribute: &str) -> CoreResult<Option<NativeValue>>;

    /// Assigns or clears an attribute.
    ///
    /// # Errors
    ///
    /// Fails for a missing object, an unknown attribute or a value of the
    /// wrong type.
    fn set(&mut self, id: ObjectId, attribute: &str, value: Option<NativeValue>) -> CoreResult<()>;

    /// Current members of a relationship, in stored order.
    ///
    /// # Errors
    ///
    /// Fails for a missing object or an unknown relationship.
    fn related(&self, id: ObjectId, relationship: &str) -> CoreResult<Vec<ObjectId>>;

    /// Replaces a relationship's members and maintains the inverse.
    ///
    /// Duplicate members collapse onto their first position.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidLink`] for several members on a to-one
    /// relationship or members of the wrong entity.
    fn set_related(
        &mut self,
        id: ObjectId,
        relationship: &str,
        members: &[ObjectId],
    ) -> CoreResult<()>;

    /// Makes pending changes durable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if persisting fails. Pending changes
    /// are kept so the caller can roll back.
    fn save(&mut self) -> CoreResult<()>;

    /// Discards pending changes.
    fn rollback(&mut self);

    /// Returns true if there are unsaved changes.
    fn has_changes(&self) -> bool;
}

/// Runs `f` as one unit of work: saves once if it succeeds, rolls back if
/// it or the save fails.
///
/// # Errors
///
/// Returns the error of `f`, or of the save converted into `E`.
pub fn with_unit_of_work<S, T, E, F>(store: &mut S, f: F) -> Result<T, E>
where
    S: Store + ?Sized,
    E: From<CoreError>,
    F: FnOnce(&mut S) -> Result<T, E>,
{
    match f(store) {
        Ok(result) => {
            if let Err(e) = store.save() {
                store.rollback();
                return Err(e.into());
            }
            Ok(result)
        }
        Err(e) => {
            store.rollback();
            Err(e)
        }
    }
}
