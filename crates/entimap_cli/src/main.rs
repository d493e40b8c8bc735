//! entimap CLI
//!
//! Command-line tools for syncing JSON records into an entity graph.
//!
//! # Commands
//!
//! - `inflect` - Convert keys between snake_case and camelCase
//! - `sync` - Sync a record file over an optional seed and print the result
//! - `export` - Re-export a record file in another naming convention

mod commands;

use clap::{Parser, Subcommand};
use commands::inflect::Target;
use commands::sync::SyncOptions;
use entimap_core::Inflection;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Record-to-entity-graph sync tools.
#[derive(Parser)]
#[command(name = "entimap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert keys between snake_case and camelCase
    Inflect {
        /// Convert to camelCase instead of snake_case
        #[arg(short, long)]
        camel: bool,

        /// Keys to convert
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Sync records into an entity and print its objects
    Sync {
        /// Schema document (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Entity to sync
        #[arg(short, long)]
        entity: String,

        /// Record file (JSON array)
        #[arg(short, long)]
        records: PathBuf,

        /// Records loaded before the sync
        #[arg(long)]
        seed: Option<PathBuf>,

        /// Allowed operations, comma-separated (insert,update,delete,...)
        #[arg(short, long)]
        operations: Option<String>,

        /// Records and output use camelCase keys
        #[arg(long)]
        camel: bool,

        /// Print relationships as nested attributes
        #[arg(long)]
        nested: bool,
    },

    /// Re-export records in another naming convention
    Export {
        /// Schema document (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Entity of the records
        #[arg(short, long)]
        entity: String,

        /// Record file (JSON array)
        #[arg(short, long)]
        records: PathBuf,

        /// Input records use camelCase keys
        #[arg(long)]
        from_camel: bool,

        /// Output uses camelCase keys
        #[arg(long)]
        camel: bool,

        /// Print relationships as nested attributes
        #[arg(long)]
        nested: bool,
    },

    /// Show version information
    Version,
}

fn inflection(camel: bool) -> Inflection {
    if camel {
        Inflection::CamelCase
    } else {
        Inflection::SnakeCase
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable
    let fallback = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inflect { camel, words } => {
            let target = if camel { Target::Camel } else { Target::Snake };
            commands::inflect::run(&words, target)?;
        }
        Commands::Sync {
            schema,
            entity,
            records,
            seed,
            operations,
            camel,
            nested,
        } => {
            let options = SyncOptions {
                schema: &schema,
                entity: &entity,
                operations: operations.as_deref(),
                inflection: inflection(camel),
                nested,
            };
            commands::sync::run(&options, &records, seed.as_deref())?;
        }
        Commands::Export {
            schema,
            entity,
            records,
            from_camel,
            camel,
            nested,
        } => {
            let options = SyncOptions {
                schema: &schema,
                entity: &entity,
                operations: None,
                inflection: inflection(camel),
                nested,
            };
            commands::export::run(&options, &records, inflection(from_camel))?;
        }
        Commands::Version => {
            println!("entimap v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
