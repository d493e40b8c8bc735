//! Engine state, lifetime statistics and per-pass outcomes.

use std::time::Instant;

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No pass has run yet.
    Idle,
    /// A pass or batch is running.
    Syncing,
    /// The last pass committed.
    Synced,
    /// The last pass failed and was rolled back.
    Error,
    /// The last batch was cancelled.
    Cancelled,
}

impl SyncState {
    /// Returns true while a pass is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Syncing)
    }

    /// Returns true if a new pass may start.
    pub fn can_start_sync(&self) -> bool {
        !self.is_active()
    }
}

/// Counts of what one pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Objects created, nested ones included.
    pub inserted: u64,
    /// Objects updated, nested ones included.
    pub updated: u64,
    /// Objects deleted as stale or orphaned.
    pub deleted: u64,
    /// Duplicate objects removed by uniquing.
    pub deduplicated: u64,
    /// Field values that failed to coerce and were skipped.
    pub coercion_failures: u64,
}

impl SyncOutcome {
    /// Adds another outcome's counts to this one.
    pub fn merge(&mut self, other: &SyncOutcome) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.deduplicated += other.deduplicated;
        self.coercion_failures += other.coercion_failures;
    }

    /// Returns true if the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.deleted == 0 && self.deduplicated == 0
    }
}

/// Statistics accumulated over the engine's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Number of passes that committed.
    pub passes_completed: u64,
    /// Total objects created.
    pub inserted: u64,
    /// Total objects updated.
    pub updated: u64,
    /// Total objects deleted.
    pub deleted: u64,
    /// Total duplicates removed.
    pub deduplicated: u64,
    /// Total skipped field values.
    pub coercion_failures: u64,
    /// When the last pass committed.
    pub last_sync_time: Option<Instant>,
    /// Message of the last failed pass.
    pub last_error: Option<String>,
}

impl SyncStats {
    pub(crate) fn record(&mut self, outcome: &SyncOutcome) {
        self.passes_completed += 1;
        self.inserted += outcome.inserted;
        self.updated += outcome.updated;
        self.deleted += outcome.deleted;
        self.deduplicated += outcome.deduplicated;
        self.coercion_failures += outcome.coercion_failures;
        self.last_sync_time = Some(Instant::now());
        self.last_error = None;
    }
}
