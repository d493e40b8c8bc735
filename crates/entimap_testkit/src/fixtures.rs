//! Fixture schemas, stores and record helpers.
//!
//! The fixture schema covers every relationship shape the engine handles:
//!
//! | entity | relationships |
//! |---|---|
//! | `User` | `company` (to-one, inverse `users`), `notes` (to-many, inverse `user`) |
//! | `Company` | `users` (to-many) |
//! | `Note` | `user` (to-one), `tags` (many-to-many, inverse `notes`) |
//! | `Tag` | `notes` (many-to-many) |
//! | `Playlist` | `songs` (ordered to-many, no inverse) |
//! | `Song` | none |
//! | `Category` | `parent` (to-one), `children` (ordered to-many), self-referential |
//! | `LogEntry` | none, and no primary key |

use entimap_codec::{Record, Value};
use entimap_core::{
    AttributeDescriptor, EntityMetadata, MemoryStore, ObjectId, RelationshipDescriptor, Schema,
    Store,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builds the fixture schema.
pub fn fixture_schema() -> Schema {
    Schema::new(vec![
        EntityMetadata::new("User")
            .with_attribute(AttributeDescriptor::integer("remoteID"))
            .with_attribute(AttributeDescriptor::string("name"))
            .with_attribute(AttributeDescriptor::integer("userID"))
            .with_attribute(AttributeDescriptor::date("birthDate"))
            .with_attribute(AttributeDescriptor::string("userDescription"))
            .with_attribute(AttributeDescriptor::string("localID").not_exportable())
            .with_relationship(
                RelationshipDescriptor::to_one("company", "Company").with_inverse("users"),
            )
            .with_relationship(
                RelationshipDescriptor::to_many("notes", "Note").with_inverse("user"),
            ),
        EntityMetadata::new("Company")
            .with_attribute(AttributeDescriptor::integer("remoteID"))
            .with_attribute(AttributeDescriptor::string("name"))
            .with_relationship(
                RelationshipDescriptor::to_many("users", "User").with_inverse("company"),
            ),
        EntityMetadata::new("Note")
            .with_attribute(AttributeDescriptor::integer("remoteID"))
            .with_attribute(AttributeDescriptor::string("text"))
            .with_relationship(RelationshipDescriptor::to_one("user", "User").with_inverse("notes"))
            .with_relationship(RelationshipDescriptor::to_many("tags", "Tag").with_inverse("notes")),
        EntityMetadata::new("Tag")
            .with_attribute(AttributeDescriptor::integer("remoteID"))
            .with_attribute(AttributeDescriptor::string("name"))
            .with_relationship(RelationshipDescriptor::to_many("notes", "Note").with_inverse("tags")),
        EntityMetadata::new("Playlist")
            .with_attribute(AttributeDescriptor::integer("remoteID"))
            .with_attribute(AttributeDescriptor::string("name"))
            .with_relationship(RelationshipDescriptor::to_many("songs", "Song").ordered()),
        EntityMetadata::new("Song")
            .with_attribute(AttributeDescriptor::integer("remoteID"))
            .with_attribute(AttributeDescriptor::string("title")),
        EntityMetadata::new("Category")
            .with_attribute(AttributeDescriptor::integer("remoteID"))
            .with_attribute(AttributeDescriptor::string("name"))
            .with_relationship(
                RelationshipDescriptor::to_one("parent", "Category").with_inverse("children"),
            )
            .with_relationship(
                RelationshipDescriptor::to_many("children", "Category")
                    .ordered()
                    .with_inverse("parent"),
            ),
        EntityMetadata::new("LogEntry").with_attribute(AttributeDescriptor::string("line")),
    ])
    .expect("fixture schema is valid")
}

/// An in-memory store over the fixture schema.
#[derive(Debug)]
pub struct TestStore {
    /// The store instance.
    pub store: MemoryStore,
}

impl TestStore {
    /// Creates an empty store over [`fixture_schema`].
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(fixture_schema()),
        }
    }

    /// Creates a store over a custom schema.
    pub fn with_schema(schema: Schema) -> Self {
        Self {
            store: MemoryStore::new(schema),
        }
    }

    /// Creates and saves objects of `entity` with the given `remoteID`s.
    pub fn seed(&mut self, entity: &str, keys: &[i64]) -> Vec<ObjectId> {
        let ids = keys
            .iter()
            .map(|key| {
                let id = self.store.insert(entity).expect("entity exists");
                self.store
                    .set(id, "remoteID", Some((*key).into()))
                    .expect("remoteID is an integer");
                id
            })
            .collect();
        self.store.save().expect("seed saves");
        ids
    }

    /// `remoteID`s of every object of `entity`, in insertion order.
    pub fn keys(&self, entity: &str) -> Vec<i64> {
        self.store
            .fetch(entity, None)
            .expect("entity exists")
            .into_iter()
            .filter_map(|id| self.key_of(id))
            .collect()
    }

    /// `remoteID` of one object.
    pub fn key_of(&self, id: ObjectId) -> Option<i64> {
        self.store
            .get(id, "remoteID")
            .ok()
            .flatten()
            .and_then(|value| value.as_integer())
    }

    /// `remoteID`s of an object's relationship members, in stored order.
    pub fn related_keys(&self, id: ObjectId, relationship: &str) -> Vec<i64> {
        self.store
            .related(id, relationship)
            .expect("relationship exists")
            .into_iter()
            .filter_map(|member| self.key_of(member))
            .collect()
    }

    /// The object of `entity` with the given `remoteID`.
    pub fn find(&self, entity: &str, key: i64) -> Option<ObjectId> {
        self.store
            .fetch(entity, None)
            .expect("entity exists")
            .into_iter()
            .find(|id| self.key_of(*id) == Some(key))
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = MemoryStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl std::ops::DerefMut for TestStore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

/// Runs a test against an empty fixture store.
///
/// # Example
///
/// ```rust
/// use entimap_core::Store;
/// use entimap_testkit::with_test_store;
///
/// with_test_store(|store| {
///     store.seed("User", &[1, 2]);
///     assert_eq!(store.fetch("User", None).unwrap().len(), 2);
/// });
/// ```
pub fn with_test_store<F, R>(f: F) -> R
where
    F: FnOnce(&mut TestStore) -> R,
{
    let mut store = TestStore::new();
    f(&mut store)
}

/// Builds a record from key/value pairs.
pub fn record<const N: usize>(pairs: [(&str, Value); N]) -> Record {
    Record::from_pairs(pairs)
}

/// Records carrying only an `id`.
pub fn keyed_records(keys: &[i64]) -> Vec<Record> {
    keys.iter()
        .map(|key| record([("id", Value::from(*key))]))
        .collect()
}

/// A list value of `{"id": key}` maps.
pub fn nested_list(keys: &[i64]) -> Value {
    Value::Array(
        keys.iter()
            .map(|key| Value::Map(record([("id", Value::from(*key))])))
            .collect(),
    )
}

/// A temporary directory for file-based tests.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: TempDir,
}

impl TempWorkspace {
    /// Creates an empty workspace.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// The workspace root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `contents` to `name` and returns its path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write fixture file");
        path
    }

    /// Writes the fixture schema as JSON and returns its path.
    pub fn write_schema(&self) -> PathBuf {
        let text = fixture_schema().to_json().expect("schema serializes");
        self.write("schema.json", &text)
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Prepared store states.
pub mod scenarios {
    use super::*;

    /// A store holding `count` users keyed `0..count`.
    pub fn populated_users(count: i64) -> TestStore {
        let mut store = TestStore::new();
        let keys: Vec<i64> = (0..count).collect();
        store.seed("User", &keys);
        store
    }

    /// A store holding `copies` users that all share `key`.
    pub fn duplicated_users(key: i64, copies: usize) -> TestStore {
        let mut store = TestStore::new();
        store.seed("User", &vec![key; copies]);
        store
    }
}
