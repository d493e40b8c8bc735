//! CLI command implementations.

pub mod export;
pub mod inflect;
pub mod sync;

use entimap_codec::{records_from_json, Record};
use entimap_core::Schema;
use std::path::Path;

/// Boxed error returned by every command.
pub type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Reads a schema document.
pub fn load_schema(path: &Path) -> CommandResult<Schema> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read schema {}: {e}", path.display()))?;
    Ok(Schema::from_json(&text)?)
}

/// Reads a JSON array (or single object) of records.
pub fn load_records(path: &Path) -> CommandResult<Vec<Record>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read records {}: {e}", path.display()))?;
    Ok(records_from_json(&text)?)
}
