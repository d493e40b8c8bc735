//! Integration tests for sync passes over the fixture schema.

use entimap_codec::{Record, Value};
use entimap_core::{Inflection, ObjectId, Predicate, Store};
use entimap_sync::{
    Operations, OrphanPolicy, SyncConfig, SyncDelegate, SyncEngine, SyncError, SyncPass,
    SyncScope, SyncState,
};
use entimap_testkit::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;

fn engine() -> SyncEngine {
    SyncEngine::new(SyncConfig::default())
}

fn named(key: i64, name: &str) -> Record {
    record([("id", Value::from(key)), ("name", Value::from(name))])
}

fn name_of(store: &TestStore, entity: &str, key: i64) -> Option<String> {
    let id = store.find(entity, key)?;
    store
        .get(id, "name")
        .unwrap()
        .and_then(|v| v.as_str().map(str::to_string))
}

#[test]
fn pass_partitions_inserts_updates_and_deletes() {
    let mut store = scenarios::populated_users(5);
    let records = [0, 1, 2, 3, 6, 7].map(|key| named(key, "synced")).to_vec();

    let outcome = engine().sync(&mut *store, records, "User").unwrap();

    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.updated, 4);
    assert_eq!(outcome.deleted, 1);
    assert_eq!(store.keys("User"), vec![0, 1, 2, 3, 6, 7]);
    assert_eq!(name_of(&store, "User", 6).as_deref(), Some("synced"));
    assert_eq!(store.save_count(), 2);
}

#[test]
fn operations_gate_the_pass() {
    let mut store = scenarios::populated_users(5);
    let records = [0, 1, 2, 3, 6, 7].map(|key| named(key, "synced")).to_vec();
    let engine = SyncEngine::new(SyncConfig::new().with_operations(Operations::INSERT));

    let outcome = engine.sync(&mut *store, records, "User").unwrap();

    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.updated, 0);
    assert_eq!(outcome.deleted, 0);
    assert_eq!(store.keys("User"), vec![0, 1, 2, 3, 4, 6, 7]);
    assert_eq!(name_of(&store, "User", 0), None);
}

#[test]
fn duplicate_objects_are_collapsed() {
    let mut store = scenarios::duplicated_users(5, 3);

    let outcome = engine()
        .sync(&mut *store, vec![named(5, "only")], "User")
        .unwrap();

    assert_eq!(outcome.deduplicated, 2);
    assert_eq!(outcome.updated, 1);
    assert_eq!(store.keys("User"), vec![5]);
    assert_eq!(name_of(&store, "User", 5).as_deref(), Some("only"));
}

#[test]
fn missing_key_aborts_without_changes() {
    let mut store = scenarios::populated_users(2);
    let engine = engine();
    let records = vec![named(9, "new"), record([("name", Value::from("anonymous"))])];

    let err = engine.sync(&mut *store, records, "User").unwrap_err();

    assert!(matches!(err, SyncError::MissingPrimaryKey { .. }));
    assert_eq!(store.keys("User"), vec![0, 1]);
    assert_eq!(engine.state(), SyncState::Error);
}

#[test]
fn failed_save_rolls_back() {
    let mut store = scenarios::populated_users(2);
    let engine = engine();
    store.fail_next_saves(1);

    let err = engine.sync(&mut *store, keyed_records(&[7]), "User").unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));
    assert_eq!(store.keys("User"), vec![0, 1]);
    assert!(engine.stats().last_error.is_some());

    engine.sync(&mut *store, keyed_records(&[7]), "User").unwrap();
    assert_eq!(store.keys("User"), vec![7]);
    assert_eq!(engine.state(), SyncState::Synced);
}

#[test]
fn failed_save_leaves_single_object_stats_alone() {
    let mut store = scenarios::populated_users(2);
    let engine = engine();
    store.fail_next_saves(1);

    let err = engine
        .insert_or_update(&mut *store, named(7, "lost"), "User")
        .unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));
    assert_eq!(store.keys("User"), vec![0, 1]);

    let stats = engine.stats();
    assert_eq!(stats.passes_completed, 0);
    assert_eq!(stats.inserted, 0);
    assert!(stats.last_sync_time.is_none());
    assert!(stats.last_error.is_some());

    engine
        .insert_or_update(&mut *store, named(7, "kept"), "User")
        .unwrap();
    let stats = engine.stats();
    assert_eq!(stats.passes_completed, 1);
    assert_eq!(stats.inserted, 1);
    assert!(stats.last_error.is_none());
}

#[test]
fn absent_null_and_empty_payloads() {
    let mut store = TestStore::new();
    let engine = engine();
    let first = record([
        ("id", Value::from(1)),
        ("name", Value::from("Ada")),
        ("company", Value::Map(named(100, "Acme"))),
        ("notes", nested_list(&[10, 11])),
    ]);
    engine.sync(&mut *store, vec![first], "User").unwrap();
    let user = store.find("User", 1).unwrap();
    assert_eq!(store.related_keys(user, "company"), vec![100]);
    assert_eq!(store.related_keys(user, "notes"), vec![10, 11]);

    // Absent keys leave everything alone
    engine.sync(&mut *store, keyed_records(&[1]), "User").unwrap();
    assert_eq!(name_of(&store, "User", 1).as_deref(), Some("Ada"));
    assert_eq!(store.related_keys(user, "company"), vec![100]);
    assert_eq!(store.related_keys(user, "notes"), vec![10, 11]);

    let cleared = record([
        ("id", Value::from(1)),
        ("name", Value::Null),
        ("company", Value::Null),
        ("notes", Value::Array(Vec::new())),
    ]);
    engine.sync(&mut *store, vec![cleared], "User").unwrap();
    assert_eq!(name_of(&store, "User", 1), None);
    assert!(store.related_keys(user, "company").is_empty());
    assert!(store.related_keys(user, "notes").is_empty());
    // Dropped notes had no other owner
    assert!(store.keys("Note").is_empty());
    // The company still exists; only the link went away
    assert_eq!(store.keys("Company"), vec![100]);
}

#[test]
fn nested_members_link_both_sides() {
    let mut store = TestStore::new();
    let user = record([
        ("id", Value::from(1)),
        (
            "notes",
            Value::Array(vec![Value::Map(record([
                ("id", Value::from(10)),
                ("text", Value::from("hello")),
            ]))]),
        ),
    ]);

    let outcome = engine().sync(&mut *store, vec![user], "User").unwrap();

    assert_eq!(outcome.inserted, 2);
    let note = store.find("Note", 10).unwrap();
    assert_eq!(store.related_keys(note, "user"), vec![1]);
}

#[test]
fn ordered_members_follow_the_payload() {
    let mut store = TestStore::new();
    let engine = engine();

    engine
        .sync(&mut *store, vec![playlist_record(1, &[1, 2, 3])], "Playlist")
        .unwrap();
    let playlist = store.find("Playlist", 1).unwrap();
    assert_eq!(store.related_keys(playlist, "songs"), vec![1, 2, 3]);

    let outcome = engine
        .sync(&mut *store, vec![playlist_record(1, &[3, 1, 2])], "Playlist")
        .unwrap();
    assert_eq!(store.related_keys(playlist, "songs"), vec![3, 1, 2]);
    assert_eq!(outcome.inserted, 0);
    assert_eq!(store.keys("Song"), vec![1, 2, 3]);

    engine
        .sync(&mut *store, vec![playlist_record(1, &[3, 1])], "Playlist")
        .unwrap();
    assert_eq!(store.related_keys(playlist, "songs"), vec![3, 1]);
    assert_eq!(store.keys("Song"), vec![1, 3]);
}

fn tagged_note(key: i64, tags: &[i64]) -> Record {
    record([("id", Value::from(key)), ("tags", nested_list(tags))])
}

#[test]
fn shrinking_many_to_many_unlinks_both_sides() {
    let mut store = TestStore::new();
    let engine = engine();
    engine
        .sync(
            &mut *store,
            vec![tagged_note(1, &[1, 2]), tagged_note(2, &[2])],
            "Note",
        )
        .unwrap();
    let shared = store.find("Tag", 2).unwrap();
    assert_eq!(store.related_keys(shared, "notes"), vec![1, 2]);

    engine
        .sync(
            &mut *store,
            vec![tagged_note(1, &[1]), keyed_records(&[2]).remove(0)],
            "Note",
        )
        .unwrap();
    assert_eq!(store.related_keys(shared, "notes"), vec![2]);
    assert_eq!(store.keys("Tag"), vec![1, 2]);

    engine
        .sync(&mut *store, vec![tagged_note(1, &[1]), tagged_note(2, &[])], "Note")
        .unwrap();
    assert_eq!(store.keys("Tag"), vec![1]);
}

fn tag_with_notes(key: i64, notes: &[i64]) -> Record {
    record([("id", Value::from(key)), ("notes", nested_list(notes))])
}

#[test]
fn shrinking_many_to_many_from_the_other_side() {
    let mut store = TestStore::new();
    let engine = engine();
    engine
        .sync(
            &mut *store,
            vec![tag_with_notes(1, &[10, 11]), tag_with_notes(2, &[11])],
            "Tag",
        )
        .unwrap();
    let note = store.find("Note", 11).unwrap();
    assert_eq!(store.related_keys(note, "tags"), vec![1, 2]);

    engine
        .sync(
            &mut *store,
            vec![tag_with_notes(1, &[10]), tag_with_notes(2, &[11])],
            "Tag",
        )
        .unwrap();
    assert_eq!(store.related_keys(note, "tags"), vec![2]);
    let tag = store.find("Tag", 1).unwrap();
    assert_eq!(store.related_keys(tag, "notes"), vec![10]);
    assert_eq!(store.keys("Note"), vec![10, 11]);
}

#[test]
fn unlink_only_keeps_dropped_members() {
    let mut store = TestStore::new();
    let engine =
        SyncEngine::new(SyncConfig::new().with_orphan_policy(OrphanPolicy::UnlinkOnly));
    engine
        .sync(&mut *store, vec![tagged_note(1, &[1, 2])], "Note")
        .unwrap();

    engine
        .sync(&mut *store, vec![tagged_note(1, &[1])], "Note")
        .unwrap();

    let dropped = store.find("Tag", 2).unwrap();
    assert!(store.related_keys(dropped, "notes").is_empty());
    assert_eq!(store.keys("Tag"), vec![1, 2]);
}

#[test]
fn references_link_existing_objects() {
    let mut store = TestStore::new();
    store.seed("Tag", &[1, 2]);

    let note = record([
        ("id", Value::from(5)),
        ("tags_ids", Value::Array(vec![Value::from(2), Value::from(9)])),
    ]);
    engine().sync(&mut *store, vec![note], "Note").unwrap();

    let note = store.find("Note", 5).unwrap();
    assert_eq!(store.related_keys(note, "tags"), vec![2]);
    assert_eq!(store.keys("Tag"), vec![1, 2]);
}

#[test]
fn self_referential_tree() {
    let mut store = TestStore::new();
    let engine = engine();
    let scope = SyncScope::new("Category").with_predicate(Predicate::eq("remoteID", 1_i64));
    let tree = record([
        ("id", Value::from(1)),
        ("name", Value::from("root")),
        (
            "children",
            Value::Array(vec![
                Value::Map(record([("id", Value::from(2)), ("children", nested_list(&[4]))])),
                Value::Map(record([("id", Value::from(3))])),
            ]),
        ),
    ]);

    engine.sync_scoped(&mut *store, vec![tree], &scope).unwrap();

    let root = store.find("Category", 1).unwrap();
    let leaf = store.find("Category", 4).unwrap();
    assert_eq!(store.related_keys(root, "children"), vec![2, 3]);
    assert!(store.related_keys(root, "parent").is_empty());
    assert_eq!(store.related_keys(leaf, "parent"), vec![2]);

    let pruned = record([("id", Value::from(1)), ("children", nested_list(&[3]))]);
    engine.sync_scoped(&mut *store, vec![pruned], &scope).unwrap();

    assert!(store.find("Category", 2).is_none());
    assert_eq!(store.keys("Category"), vec![1, 3, 4]);
    assert!(store.related_keys(leaf, "parent").is_empty());
}

#[test]
fn parent_scope_limits_the_pass() {
    let mut store = TestStore::new();
    let engine = engine();
    let users = vec![
        record([("id", Value::from(1)), ("notes", nested_list(&[10, 11]))]),
        record([("id", Value::from(2)), ("notes", nested_list(&[20]))]),
    ];
    engine.sync(&mut *store, users, "User").unwrap();
    let ada = store.find("User", 1).unwrap();
    let bob = store.find("User", 2).unwrap();

    let scope = SyncScope::new("Note").with_parent(ada);
    let outcome = engine
        .sync_scoped(&mut *store, keyed_records(&[11, 12]), &scope)
        .unwrap();

    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.deleted, 1);
    assert_eq!(store.related_keys(ada, "notes"), vec![11, 12]);
    assert_eq!(store.related_keys(bob, "notes"), vec![20]);
    let created = store.find("Note", 12).unwrap();
    assert_eq!(store.related_keys(created, "user"), vec![1]);
}

#[test]
fn batch_skips_unresolvable_scopes() {
    let mut store = TestStore::new();
    let category = store.seed("Category", &[1])[0];
    let playlist = store.seed("Playlist", &[1])[0];
    let engine = engine();

    let passes = vec![
        SyncPass::new(keyed_records(&[2]), SyncScope::new("Category").with_parent(category)),
        SyncPass::new(keyed_records(&[5]), SyncScope::new("Song").with_parent(playlist)),
        SyncPass::new(keyed_records(&[1]), SyncScope::new("User")),
    ];
    let report = engine.sync_all(&mut *store, passes).unwrap();

    assert_eq!(report.committed, 1);
    assert_eq!(report.scope_errors.len(), 2);
    assert!(report.scope_errors.iter().all(SyncError::is_scope));
    assert_eq!(report.outcome.inserted, 1);
    assert_eq!(store.keys("User"), vec![1]);
    assert_eq!(store.keys("Song"), Vec::<i64>::new());
    assert_eq!(engine.state(), SyncState::Synced);
}

#[derive(Default)]
struct Recorder {
    inserted: Vec<String>,
    updated: Vec<String>,
}

impl SyncDelegate for Recorder {
    fn will_insert(&mut self, entity: &str, mut record: Record, _parent: Option<ObjectId>) -> Record {
        if entity == "User" {
            record.insert("name", "from hook");
        }
        record
    }

    fn did_insert(&mut self, entity: &str, _record: &Record, _object: ObjectId) {
        self.inserted.push(entity.to_string());
    }

    fn did_update(&mut self, entity: &str, _record: &Record, _object: ObjectId) {
        self.updated.push(entity.to_string());
    }
}

#[test]
fn hooks_run_at_every_level() {
    let mut store = TestStore::new();
    store.seed("User", &[1]);
    let mut recorder = Recorder::default();
    let records = vec![
        record([("id", Value::from(1)), ("notes", nested_list(&[10]))]),
        named(2, "ignored"),
    ];

    engine()
        .sync_with_delegate(&mut *store, records, &SyncScope::new("User"), &mut recorder)
        .unwrap();

    assert_eq!(recorder.updated, vec!["User"]);
    assert_eq!(recorder.inserted.len(), 2);
    assert!(recorder.inserted.iter().any(|e| e == "Note"));
    assert_eq!(name_of(&store, "User", 2).as_deref(), Some("from hook"));
    assert_eq!(name_of(&store, "User", 1), None);
}

struct CancelOnInsert {
    engine: Arc<SyncEngine>,
}

impl SyncDelegate for CancelOnInsert {
    fn did_insert(&mut self, _entity: &str, _record: &Record, _object: ObjectId) {
        self.engine.cancel();
    }
}

#[test]
fn cancellation_stops_between_passes() {
    let mut store = TestStore::new();
    let engine = Arc::new(engine());
    let mut delegate = CancelOnInsert {
        engine: Arc::clone(&engine),
    };
    let passes = vec![
        SyncPass::new(keyed_records(&[1]), SyncScope::new("User")),
        SyncPass::new(keyed_records(&[1]), SyncScope::new("Company")),
    ];

    let err = engine
        .sync_all_with_delegate(&mut *store, passes, &mut delegate)
        .unwrap_err();

    assert!(matches!(err, SyncError::Cancelled));
    assert_eq!(engine.state(), SyncState::Cancelled);
    assert_eq!(store.keys("User"), vec![1]);
    assert!(store.keys("Company").is_empty());
}

#[test]
fn cancel_while_idle_stops_the_next_batch_only() {
    let mut store = TestStore::new();
    let engine = engine();
    let passes = || vec![SyncPass::new(keyed_records(&[1]), SyncScope::new("User"))];

    engine.cancel();
    let err = engine.sync_all(&mut *store, passes()).unwrap_err();
    assert!(matches!(err, SyncError::Cancelled));
    assert!(store.keys("User").is_empty());
    assert!(!engine.is_cancelled());

    engine.sync_all(&mut *store, passes()).unwrap();
    assert_eq!(store.keys("User"), vec![1]);
}

#[test]
fn keyless_entities_are_replaced() {
    let mut store = TestStore::new();
    let engine = engine();
    let lines = |texts: &[&str]| -> Vec<Record> {
        texts
            .iter()
            .map(|t| record([("line", Value::from(*t))]))
            .collect()
    };

    engine.sync(&mut *store, lines(&["a", "b"]), "LogEntry").unwrap();
    assert_eq!(store.committed_len("LogEntry"), 2);

    let outcome = engine.sync(&mut *store, lines(&["c"]), "LogEntry").unwrap();
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.deleted, 2);
    assert_eq!(store.committed_len("LogEntry"), 1);
}

#[test]
fn records_round_trip_through_export() {
    let mut store = TestStore::new();
    let engine = engine();
    let user = record([
        ("id", Value::from(1)),
        ("user_id", Value::from(7)),
        ("name", Value::from("Ada")),
        ("description", Value::from("admin")),
    ]);

    engine.sync(&mut *store, vec![user], "User").unwrap();

    let id = store.find("User", 1).unwrap();
    assert_eq!(store.get(id, "userID").unwrap().and_then(|v| v.as_integer()), Some(7));
    let exported = engine.export(&*store, id).unwrap();
    assert_eq!(exported.get("id").and_then(Value::as_integer), Some(1));
    assert_eq!(exported.get("user_id").and_then(Value::as_integer), Some(7));
    assert_eq!(exported.get("description").and_then(Value::as_text), Some("admin"));
    assert!(exported.get("local_id").is_none());
}

#[test]
fn camel_case_records() {
    let mut store = TestStore::new();
    let engine = SyncEngine::new(SyncConfig::new().with_inflection(Inflection::CamelCase));
    let user = record([("id", Value::from(1)), ("userID", Value::from(7))]);

    engine.sync(&mut *store, vec![user], "User").unwrap();

    let id = store.find("User", 1).unwrap();
    assert_eq!(store.get(id, "userID").unwrap().and_then(|v| v.as_integer()), Some(7));
}

#[test]
fn single_object_operations() {
    let mut store = TestStore::new();
    let engine = engine();

    let id = engine.insert_or_update(&mut *store, named(3, "first"), "User").unwrap();
    let again = engine.insert_or_update(&mut *store, named(3, "second"), "User").unwrap();
    assert_eq!(id, again);
    assert_eq!(name_of(&store, "User", 3).as_deref(), Some("second"));

    assert!(engine.delete(&mut *store, &Value::from("3"), "User").unwrap());
    assert!(store.keys("User").is_empty());
    assert!(!engine.delete(&mut *store, &Value::from(3), "User").unwrap());
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn repeated_passes_are_idempotent(batch in user_batch_strategy(12)) {
        let mut store = TestStore::new();
        let engine = engine();

        engine.sync(&mut *store, batch.clone(), "User").unwrap();
        let before = engine.export_all(&*store, "User").unwrap();

        let outcome = engine.sync(&mut *store, batch.clone(), "User").unwrap();
        let after = engine.export_all(&*store, "User").unwrap();

        prop_assert_eq!(outcome.inserted, 0);
        prop_assert_eq!(outcome.deleted, 0);
        prop_assert_eq!(outcome.updated, batch.len() as u64);
        prop_assert_eq!(before, after);
    }

    #[test]
    fn pass_leaves_exactly_the_batch_keys(
        seeded in key_set_strategy(12),
        incoming in key_set_strategy(12),
    ) {
        let mut store = TestStore::new();
        store.seed("User", &seeded);

        engine().sync(&mut *store, keyed_records(&incoming), "User").unwrap();

        let mut keys = store.keys("User");
        keys.sort_unstable();
        prop_assert_eq!(keys, incoming);
    }
}
