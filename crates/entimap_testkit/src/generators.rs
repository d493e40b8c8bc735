//! Property-based test generators using proptest.
//!
//! Provides strategies for generating record batches and keys that
//! respect the fixture schema.

use entimap_codec::{Record, Value};
use proptest::prelude::*;

/// Strategy for lowercase words that are not acronyms.
pub fn word_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{2,8}")
        .expect("Invalid regex")
        .prop_filter("acronyms inflect differently", |w| {
            !entimap_core::inflection::ACRONYMS.contains(&w.as_str())
        })
}

/// Strategy for snake_case keys of one to four words.
pub fn snake_key_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(word_strategy(), 1..5).prop_map(|words| words.join("_"))
}

/// Strategy for a set of distinct primary keys.
pub fn key_set_strategy(max: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(0i64..64, 0..max).prop_map(|keys| keys.into_iter().collect())
}

/// Strategy for scalar external values.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        prop::string::string_regex("[a-zA-Z0-9 ]{0,16}")
            .expect("Invalid regex")
            .prop_map(Value::Text),
    ]
}

/// Strategy for one `User` record with key `key`.
pub fn user_record_strategy(key: i64) -> impl Strategy<Value = Record> {
    (
        prop::option::of(prop::string::string_regex("[A-Z][a-z]{1,10}").expect("Invalid regex")),
        prop::option::of(0i64..10_000),
    )
        .prop_map(move |(name, user_id)| {
            let mut record = Record::new();
            record.insert("id", key);
            if let Some(name) = name {
                record.insert("name", name);
            }
            if let Some(user_id) = user_id {
                record.insert("user_id", user_id);
            }
            record
        })
}

/// Strategy for a batch of `User` records with distinct keys.
pub fn user_batch_strategy(max: usize) -> impl Strategy<Value = Vec<Record>> {
    key_set_strategy(max).prop_flat_map(|keys| {
        keys.into_iter()
            .map(user_record_strategy)
            .collect::<Vec<_>>()
    })
}

/// A `Playlist` record whose songs follow `order`.
pub fn playlist_record(key: i64, order: &[i64]) -> Record {
    let songs = order
        .iter()
        .map(|song| {
            let mut record = Record::new();
            record.insert("id", *song);
            record.insert("title", format!("song {song}"));
            Value::Map(record)
        })
        .collect::<Vec<_>>();
    let mut record = Record::new();
    record.insert("id", key);
    record.insert("songs", Value::Array(songs));
    record
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn snake_keys_are_lowercase(key in snake_key_strategy()) {
            prop_assert!(key.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
            prop_assert!(!key.starts_with('_'));
        }

        #[test]
        fn key_sets_are_distinct(keys in key_set_strategy(16)) {
            let mut sorted = keys.clone();
            sorted.dedup();
            prop_assert_eq!(sorted, keys);
        }

        #[test]
        fn user_batches_carry_keys(batch in user_batch_strategy(8)) {
            for record in &batch {
                prop_assert!(record.get("id").and_then(Value::as_integer).is_some());
            }
        }
    }

    #[test]
    fn playlist_keeps_song_order() {
        let record = playlist_record(1, &[3, 1, 2]);
        let songs = record.get("songs").and_then(Value::as_array).unwrap();
        let keys: Vec<i64> = songs
            .iter()
            .filter_map(|song| song.get("id").and_then(Value::as_integer))
            .collect();
        assert_eq!(keys, vec![3, 1, 2]);
    }
}
