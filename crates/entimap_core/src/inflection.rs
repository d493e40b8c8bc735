//! Acronym-aware snake_case / camelCase inflection.
//!
//! Both conversions are pure functions. Callers that convert the same keys
//! over and over can hand an [`InflectionCache`] to an [`Inflector`]; the
//! cache is owned by the caller and only memoises the pure results.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Acronyms kept as one unit by both conversions.
pub const ACRONYMS: [&str; 9] = ["uuid", "id", "pdf", "url", "png", "jpg", "uri", "json", "xml"];

/// Remote keys that collide with common local property names and are
/// therefore stored locally with an entity-name prefix.
pub const RESERVED_KEYS: [&str; 3] = ["type", "description", "signed"];

/// Naming convention used on the external side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inflection {
    /// `first_name`, `user_id`.
    #[default]
    SnakeCase,
    /// `firstName`, `userID`.
    CamelCase,
}

fn is_separator(c: char) -> bool {
    matches!(c, '_' | '-' | ' ')
}

fn is_acronym(lower: &str) -> bool {
    ACRONYMS.contains(&lower)
}

fn acronym_prefix(lower: &str) -> Option<&'static str> {
    ACRONYMS.iter().copied().find(|a| lower.starts_with(a))
}

/// Lowercase the first character, leaving the rest untouched.
pub fn lowercase_first(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Uppercase the first character and lowercase the rest.
pub fn capitalize(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Convert a key to snake_case.
///
/// Every maximal run of uppercase letters starts a new word. A run whose
/// lowercase form starts with a known acronym keeps the acronym together
/// and splits the remainder into its own word (`"userIDFirst"` becomes
/// `"user_id_first"`). Separators (`_`, `-`, space) become single
/// underscores. Digits and other characters pass through.
///
/// ```
/// use entimap_core::inflection::snake_case;
///
/// assert_eq!(snake_case("iUUID"), "i_uuid");
/// assert_eq!(snake_case("OrderedUser"), "ordered_user");
/// assert_eq!(snake_case("integer16"), "integer16");
/// ```
pub fn snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut chars = input.chars().peekable();
    let mut pending_boundary = false;

    while let Some(&c) = chars.peek() {
        if is_separator(c) {
            chars.next();
            pending_boundary = true;
            continue;
        }

        if c.is_uppercase() {
            let mut run = String::new();
            while let Some(&u) = chars.peek() {
                if !u.is_uppercase() {
                    break;
                }
                run.push(u);
                chars.next();
            }
            let lower = run.to_lowercase();
            if !out.is_empty() {
                out.push('_');
            }
            match acronym_prefix(&lower) {
                Some(acronym) if acronym.len() < lower.len() => {
                    out.push_str(acronym);
                    out.push('_');
                    out.push_str(&lower[acronym.len()..]);
                }
                _ => out.push_str(&lower),
            }
        } else {
            if pending_boundary && !out.is_empty() {
                out.push('_');
            }
            out.push(c);
            chars.next();
        }
        pending_boundary = false;
    }

    out
}

/// Convert a key to camelCase.
///
/// Input without separators only has its first letter lowercased. Input
/// with separators is split into words: the first word is lowercased,
/// acronyms among the following words are uppercased and the rest are
/// capitalized.
///
/// Returns `None` when nothing is left after removing separators or when a
/// word contains characters other than letters and digits.
///
/// ```
/// use entimap_core::inflection::camel_case;
///
/// assert_eq!(camel_case("updated_uuid").as_deref(), Some("updatedUUID"));
/// assert_eq!(camel_case("first_name").as_deref(), Some("firstName"));
/// assert_eq!(camel_case("id").as_deref(), Some("id"));
/// assert_eq!(camel_case("___"), None);
/// ```
pub fn camel_case(input: &str) -> Option<String> {
    if !input.chars().any(is_separator) {
        let out = lowercase_first(input);
        return if out.is_empty() { None } else { Some(out) };
    }

    let mut out = String::with_capacity(input.len());
    let words = input.split(is_separator).filter(|w| !w.is_empty());
    for (index, word) in words.enumerate() {
        if !word.chars().all(char::is_alphanumeric) {
            return None;
        }
        let lower = word.to_lowercase();
        if index == 0 {
            out.push_str(&lower);
        } else if is_acronym(&lower) {
            out.push_str(&lower.to_uppercase());
        } else {
            out.push_str(&capitalize(&lower));
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Memoised results of [`snake_case`] and [`camel_case`].
///
/// Shared between threads behind `&`; lookups take a read lock and only
/// misses take the write lock.
#[derive(Debug, Default)]
pub struct InflectionCache {
    snake: RwLock<HashMap<String, String>>,
    camel: RwLock<HashMap<String, Option<String>>>,
}

impl InflectionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached [`snake_case`].
    pub fn snake_case(&self, input: &str) -> String {
        if let Some(hit) = self.snake.read().get(input) {
            return hit.clone();
        }
        let converted = snake_case(input);
        self.snake
            .write()
            .insert(input.to_string(), converted.clone());
        converted
    }

    /// Cached [`camel_case`].
    pub fn camel_case(&self, input: &str) -> Option<String> {
        if let Some(hit) = self.camel.read().get(input) {
            return hit.clone();
        }
        let converted = camel_case(input);
        self.camel
            .write()
            .insert(input.to_string(), converted.clone());
        converted
    }

    /// Number of memoised conversions.
    pub fn len(&self) -> usize {
        self.snake.read().len() + self.camel.read().len()
    }

    /// Returns true if nothing has been memoised yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every memoised conversion.
    pub fn clear(&self) {
        self.snake.write().clear();
        self.camel.write().clear();
    }
}

/// Inflection front end that optionally consults a cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inflector<'a> {
    cache: Option<&'a InflectionCache>,
}

impl<'a> Inflector<'a> {
    /// Creates an inflector, memoising through `cache` when given.
    pub fn new(cache: Option<&'a InflectionCache>) -> Self {
        Self { cache }
    }

    /// snake_case conversion.
    pub fn snake_case(&self, input: &str) -> String {
        match self.cache {
            Some(cache) => cache.snake_case(input),
            None => snake_case(input),
        }
    }

    /// camelCase conversion.
    pub fn camel_case(&self, input: &str) -> Option<String> {
        match self.cache {
            Some(cache) => cache.camel_case(input),
            None => camel_case(input),
        }
    }

    /// Render a local (camelCase) name in the given external convention.
    pub fn remote_form(&self, local: &str, inflection: Inflection) -> String {
        match inflection {
            Inflection::SnakeCase => self.snake_case(local),
            Inflection::CamelCase => local.to_string(),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn word() -> impl Strategy<Value = String> {
        "[a-z]{2,6}".prop_filter("acronyms split differently", |w| !is_acronym(w))
    }

    proptest! {
        #[test]
        fn snake_case_is_idempotent(input in "[a-zA-Z][a-zA-Z0-9_ -]{0,24}") {
            let once = snake_case(&input);
            prop_assert_eq!(snake_case(&once), once);
        }

        #[test]
        fn snake_words_survive_camel_round_trip(words in prop::collection::vec(word(), 1..5)) {
            let snake = words.join("_");
            let camel = camel_case(&snake).unwrap();
            prop_assert_eq!(snake_case(&camel), snake);
        }
    }
}
