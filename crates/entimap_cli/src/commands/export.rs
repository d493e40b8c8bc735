//! Export command implementation.
//!
//! Imports records written in one naming convention and prints them back
//! in another, going through the schema's typed attributes.

use super::sync::SyncOptions;
use super::{load_records, load_schema, CommandResult};
use entimap_codec::records_to_json;
use entimap_core::{ExportOptions, Exporter, Inflection, MemoryStore, RelationshipExport};
use entimap_sync::{SyncConfig, SyncEngine};
use std::path::Path;

/// Converts `records` from `input` naming to the options' naming.
pub fn execute(options: &SyncOptions<'_>, records: &Path, input: Inflection) -> CommandResult<String> {
    let schema = load_schema(options.schema)?;
    let mut store = MemoryStore::new(schema);

    let engine = SyncEngine::new(SyncConfig::new().with_inflection(input));
    engine.sync(&mut store, load_records(records)?, options.entity)?;

    let relationships = if options.nested {
        RelationshipExport::Nested
    } else {
        RelationshipExport::Array
    };
    let export = ExportOptions::new()
        .inflection(options.inflection)
        .relationships(relationships);
    let exported = Exporter::new(&export).export_all(&store, options.entity, None)?;
    Ok(records_to_json(&exported, true)?)
}

/// Runs the export command.
pub fn run(options: &SyncOptions<'_>, records: &Path, input: Inflection) -> CommandResult<()> {
    println!("{}", execute(options, records, input)?);
    Ok(())
}
