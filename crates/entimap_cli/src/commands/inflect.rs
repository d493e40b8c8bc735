//! Inflect command implementation.

use entimap_core::inflection::{camel_case, snake_case};

/// Target convention of the inflect command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// snake_case.
    Snake,
    /// camelCase.
    Camel,
}

/// Converts every word, one per line. Words with no camelCase form are
/// reported as errors.
pub fn convert(words: &[String], target: Target) -> Result<Vec<String>, String> {
    words
        .iter()
        .map(|word| match target {
            Target::Snake => Ok(snake_case(word)),
            Target::Camel => camel_case(word).ok_or_else(|| format!("no camelCase form for {word:?}")),
        })
        .collect()
}

/// Runs the inflect command.
pub fn run(words: &[String], target: Target) -> Result<(), Box<dyn std::error::Error>> {
    for line in convert(words, target)? {
        println!("{line}");
    }
    Ok(())
}
