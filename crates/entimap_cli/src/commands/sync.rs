//! Sync command implementation.

use super::{load_records, load_schema, CommandResult};
use entimap_codec::records_to_json;
use entimap_core::{ExportOptions, Inflection, MemoryStore, RelationshipExport};
use entimap_sync::{Operations, SyncConfig, SyncEngine, SyncOutcome};
use std::path::Path;
use tracing::info;

/// Options shared by the sync and export commands.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions<'a> {
    /// Schema document.
    pub schema: &'a Path,
    /// Entity to sync and print.
    pub entity: &'a str,
    /// Comma-separated operation names. `None` allows everything.
    pub operations: Option<&'a str>,
    /// Naming convention of the records and the output.
    pub inflection: Inflection,
    /// Print relationships as nested attributes.
    pub nested: bool,
}

impl SyncOptions<'_> {
    fn config(&self) -> CommandResult<SyncConfig> {
        let operations = match self.operations {
            Some(list) => Operations::parse_list(list)
                .ok_or_else(|| format!("unknown operation in {list:?}"))?,
            None => Operations::ALL,
        };
        let relationships = if self.nested {
            RelationshipExport::Nested
        } else {
            RelationshipExport::Array
        };
        Ok(SyncConfig::new()
            .with_operations(operations)
            .with_inflection(self.inflection)
            .with_export_options(
                ExportOptions::new()
                    .inflection(self.inflection)
                    .relationships(relationships),
            ))
    }
}

/// Loads `seed` into an empty store, syncs `records` over it and renders
/// the entity's objects as JSON.
pub fn execute(options: &SyncOptions<'_>, records: &Path, seed: Option<&Path>) -> CommandResult<String> {
    let schema = load_schema(options.schema)?;
    let mut store = MemoryStore::new(schema);
    let config = options.config()?;

    if let Some(seed) = seed {
        let seeding = SyncEngine::new(config.clone().with_operations(Operations::ALL));
        let outcome = seeding.sync(&mut store, load_records(seed)?, options.entity)?;
        info!(inserted = outcome.inserted, "seeded store");
    }

    let engine = SyncEngine::new(config);
    let outcome = engine.sync(&mut store, load_records(records)?, options.entity)?;
    report(&outcome);

    let exported = engine.export_all(&store, options.entity)?;
    Ok(records_to_json(&exported, true)?)
}

fn report(outcome: &SyncOutcome) {
    info!(
        inserted = outcome.inserted,
        updated = outcome.updated,
        deleted = outcome.deleted,
        deduplicated = outcome.deduplicated,
        coercion_failures = outcome.coercion_failures,
        "sync finished"
    );
}

/// Runs the sync command.
pub fn run(options: &SyncOptions<'_>, records: &Path, seed: Option<&Path>) -> CommandResult<()> {
    println!("{}", execute(options, records, seed)?);
    Ok(())
}
