//! Configuration for the sync engine.

use crate::operations::Operations;
use entimap_core::{ExportOptions, Inflection};

/// What happens to related objects dropped from a to-many payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Delete dropped objects that nothing references at the end of the
    /// pass.
    #[default]
    DeleteUnreferenced,
    /// Only remove the link.
    UnlinkOnly,
}

/// Configuration for sync passes.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Mutations passes may perform.
    pub operations: Operations,
    /// Naming convention of incoming records.
    pub inflection: Inflection,
    /// Treatment of dropped to-many members.
    pub orphan_policy: OrphanPolicy,
    /// Options used by [`SyncEngine::export`](crate::SyncEngine::export).
    pub export: ExportOptions,
}

impl SyncConfig {
    /// Creates a configuration with every operation enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the allowed operations.
    pub fn with_operations(mut self, operations: Operations) -> Self {
        self.operations = operations;
        self
    }

    /// Sets the naming convention of incoming records.
    pub fn with_inflection(mut self, inflection: Inflection) -> Self {
        self.inflection = inflection;
        self
    }

    /// Sets the orphan policy.
    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    /// Sets the export options.
    pub fn with_export_options(mut self, export: ExportOptions) -> Self {
        self.export = export;
        self
    }
}
