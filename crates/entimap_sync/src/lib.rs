//! # EntiMap Sync
//!
//! Reconciles batches of external records into an entity graph.
//!
//! This crate provides:
//! - Operation flags gating inserts, updates and deletes
//! - The reconciler, which partitions a batch by primary key
//! - The relationship resolver for nested and keyed payloads
//! - The sync engine with hooks, cancellation and statistics
//!
//! ## Passes
//!
//! A pass takes records for one entity and a scope of persisted objects:
//! 1. Records and scoped objects are matched by primary key
//! 2. Matched objects are updated, new keys inserted, stale objects deleted
//! 3. Nested relationship payloads are resolved the same way
//! 4. The store saves once, or rolls back if anything failed
//!
//! ## Key Invariants
//!
//! - A relationship absent from a record is left untouched
//! - An explicit null or empty list clears it
//! - Ordered relationships take the payload's order
//! - Duplicate objects sharing a key collapse to one

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod delegate;
mod engine;
mod error;
mod operations;
mod payload;
mod reconcile;
mod resolve;
mod state;

pub use config::{OrphanPolicy, SyncConfig};
pub use delegate::{NoopDelegate, SyncDelegate};
pub use engine::{BatchReport, SyncEngine, SyncPass, SyncScope};
pub use error::{SyncError, SyncResult};
pub use operations::Operations;
pub use payload::{ListItem, RelationshipPayload};
pub use reconcile::{ReconcilePlan, Reconciler};
pub use state::{SyncOutcome, SyncState, SyncStats};
