//! Per-record hooks.

use entimap_codec::Record;
use entimap_core::ObjectId;

/// Observes and rewrites records as a pass applies them.
///
/// Hooks run for records at every nesting level, synchronously on the
/// pass's thread. They must not start another pass over the same scope.
pub trait SyncDelegate {
    /// Called before a record creates an object. The returned record is
    /// applied instead.
    fn will_insert(&mut self, entity: &str, record: Record, parent: Option<ObjectId>) -> Record {
        let _ = (entity, parent);
        record
    }

    /// Called before a record updates `object`. The returned record is
    /// applied instead.
    fn will_update(&mut self, entity: &str, record: Record, object: ObjectId) -> Record {
        let _ = (entity, object);
        record
    }

    /// Called after a record filled a new object.
    fn did_insert(&mut self, entity: &str, record: &Record, object: ObjectId) {
        let _ = (entity, record, object);
    }

    /// Called after a record updated an object.
    fn did_update(&mut self, entity: &str, record: &Record, object: ObjectId) {
        let _ = (entity, record, object);
    }
}

/// A delegate that changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDelegate;

impl SyncDelegate for NoopDelegate {}
