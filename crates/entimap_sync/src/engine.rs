//! The sync engine: runs passes against a store.

use crate::config::SyncConfig;
use crate::delegate::{NoopDelegate, SyncDelegate};
use crate::error::{SyncError, SyncResult};
use crate::operations::Operations;
use crate::reconcile::Reconciler;
use crate::resolve::Resolver;
use crate::state::{SyncOutcome, SyncState, SyncStats};
use entimap_codec::{Record, Value};
use entimap_core::{
    with_unit_of_work, CoreError, Exporter, InflectionCache, ObjectId, Predicate,
    RelationshipDescriptor, Schema, Store, TransformerRegistry, ValueCoercer,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which persisted objects a pass reconciles against.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncScope {
    /// Entity being synced.
    pub entity: String,
    /// Filter on the entity's objects. `None` means all of them.
    pub predicate: Option<Predicate>,
    /// Object the synced records belong to.
    pub parent: Option<ObjectId>,
}

impl SyncScope {
    /// Scope covering every object of `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            predicate: None,
            parent: None,
        }
    }

    /// Restricts the scope to objects matching `predicate`.
    #[must_use]
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Restricts the scope to objects related to `parent`.
    ///
    /// The relationship to the parent is found from the schema: the synced
    /// entity must have exactly one relationship to the parent's entity.
    #[must_use]
    pub fn with_parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// One top-level pass of a batch.
#[derive(Debug, Clone)]
pub struct SyncPass {
    /// Records to reconcile.
    pub records: Vec<Record>,
    /// Objects to reconcile them against.
    pub scope: SyncScope,
}

impl SyncPass {
    /// Creates a pass.
    pub fn new(records: Vec<Record>, scope: SyncScope) -> Self {
        Self { records, scope }
    }
}

/// Result of a batch of passes.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Counts summed over committed passes.
    pub outcome: SyncOutcome,
    /// Number of passes that committed.
    pub committed: usize,
    /// Passes skipped because their scope could not be resolved.
    pub scope_errors: Vec<SyncError>,
}

/// Reconciles record batches into a [`Store`].
///
/// The engine holds no store: every operation borrows one exclusively for
/// its duration. `cancel` may be called from another thread and takes
/// effect before the next pass of a batch.
///
/// # Example
///
/// ```
/// use entimap_codec::records_from_json;
/// use entimap_core::{AttributeDescriptor, EntityMetadata, MemoryStore, Schema, Store};
/// use entimap_sync::{SyncConfig, SyncEngine};
///
/// let schema = Schema::new(vec![EntityMetadata::new("User")
///     .with_attribute(AttributeDescriptor::integer("remoteID"))
///     .with_attribute(AttributeDescriptor::string("firstName"))])
/// .unwrap();
/// let mut store = MemoryStore::new(schema);
/// let engine = SyncEngine::new(SyncConfig::default());
///
/// let records = records_from_json(r#"[{"id": 1, "first_name": "Ada"}]"#).unwrap();
/// let outcome = engine.sync(&mut store, records, "User").unwrap();
/// assert_eq!(outcome.inserted, 1);
/// assert_eq!(store.fetch("User", None).unwrap().len(), 1);
/// ```
pub struct SyncEngine {
    config: SyncConfig,
    transformers: Arc<TransformerRegistry>,
    cache: Option<Arc<InflectionCache>>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    cancelled: AtomicBool,
}

impl SyncEngine {
    /// Creates an engine without transformers or inflection cache.
    pub fn new(config: SyncConfig) -> Self {
        Self::with_transformers(config, TransformerRegistry::new())
    }

    /// Creates an engine that converts through `transformers`.
    pub fn with_transformers(config: SyncConfig, transformers: TransformerRegistry) -> Self {
        Self {
            config,
            transformers: Arc::new(transformers),
            cache: None,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Memoises key inflection in `cache`, which may be shared with other
    /// engines.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<InflectionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The engine's configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Cancels the running batch before its next pass.
    ///
    /// The flag is cleared when a batch finishes, so a request made while
    /// the engine is idle stops the next batch before its first pass.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Resets the cancelled flag.
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Moves to `Syncing`, failing if another pass is running.
    fn begin(&self) -> SyncResult<()> {
        let mut state = self.state.write();
        if !state.can_start_sync() {
            return Err(SyncError::InvalidState {
                message: format!("cannot start a pass while {:?}", *state),
            });
        }
        *state = SyncState::Syncing;
        Ok(())
    }

    fn handle_error(&self, error: &SyncError) {
        self.set_state(SyncState::Error);
        self.stats.write().last_error = Some(error.to_string());
    }

    fn finish<T>(&self, result: SyncResult<T>) -> SyncResult<T> {
        match &result {
            Ok(_) => self.set_state(SyncState::Synced),
            Err(SyncError::Cancelled) => self.set_state(SyncState::Cancelled),
            Err(e) => self.handle_error(e),
        }
        result
    }

    fn coercer(&self) -> ValueCoercer<'_> {
        ValueCoercer::new(&self.transformers)
    }

    /// Reconciles `records` against every object of `entity`.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the pass; nothing is saved then.
    pub fn sync<S: Store + ?Sized>(
        &self,
        store: &mut S,
        records: Vec<Record>,
        entity: &str,
    ) -> SyncResult<SyncOutcome> {
        self.sync_scoped(store, records, &SyncScope::new(entity))
    }

    /// Reconciles `records` against the objects in `scope`.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the pass; nothing is saved then.
    pub fn sync_scoped<S: Store + ?Sized>(
        &self,
        store: &mut S,
        records: Vec<Record>,
        scope: &SyncScope,
    ) -> SyncResult<SyncOutcome> {
        self.sync_with_delegate(store, records, scope, &mut NoopDelegate)
    }

    /// Reconciles `records` against `scope`, calling `delegate` for every
    /// record applied.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the pass; nothing is saved then.
    pub fn sync_with_delegate<S: Store + ?Sized>(
        &self,
        store: &mut S,
        records: Vec<Record>,
        scope: &SyncScope,
        delegate: &mut dyn SyncDelegate,
    ) -> SyncResult<SyncOutcome> {
        self.begin()?;
        let result = self.run_pass(store, records, scope, delegate);
        self.finish(result)
    }

    /// Runs several passes, each committed on its own.
    ///
    /// Cancellation is checked before every pass. A pass whose scope
    /// cannot be resolved is recorded in the report and skipped; any other
    /// error stops the batch. Passes committed before the error stay
    /// committed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if cancelled, or the first
    /// non-scope error.
    pub fn sync_all<S: Store + ?Sized>(
        &self,
        store: &mut S,
        passes: Vec<SyncPass>,
    ) -> SyncResult<BatchReport> {
        self.sync_all_with_delegate(store, passes, &mut NoopDelegate)
    }

    /// [`sync_all`](Self::sync_all) with hooks.
    ///
    /// # Errors
    ///
    /// Fails like [`sync_all`](Self::sync_all).
    pub fn sync_all_with_delegate<S: Store + ?Sized>(
        &self,
        store: &mut S,
        passes: Vec<SyncPass>,
        delegate: &mut dyn SyncDelegate,
    ) -> SyncResult<BatchReport> {
        self.begin()?;

        let mut report = BatchReport::default();
        let result = (|| {
            for pass in passes {
                self.check_cancelled()?;
                match self.run_pass(store, pass.records, &pass.scope, delegate) {
                    Ok(outcome) => {
                        report.outcome.merge(&outcome);
                        report.committed += 1;
                    }
                    Err(e) if e.is_scope() => {
                        warn!(entity = %pass.scope.entity, error = %e, "skipping pass");
                        self.stats.write().last_error = Some(e.to_string());
                        report.scope_errors.push(e);
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })();
        self.reset_cancel();
        self.finish(result).map(|()| report)
    }

    /// Inserts `record` as a new object of `entity`, or updates the object
    /// with its key.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MissingPrimaryKey`] for a record without a key,
    /// or the error that aborted the pass.
    pub fn insert_or_update<S: Store + ?Sized>(
        &self,
        store: &mut S,
        record: Record,
        entity: &str,
    ) -> SyncResult<ObjectId> {
        self.begin()?;
        let result = self.single_object(store, |resolver, schema| {
            let metadata = schema.entity(entity)?;
            let reconciler = resolver.reconciler(metadata);
            let existing = match reconciler.record_key(&record)? {
                Some(key) => reconciler.find_by_key(&*resolver.store(), &key)?,
                None => None,
            };
            let operations = self.config.operations | Operations::INSERT | Operations::UPDATE;
            match existing {
                Some(object) => {
                    resolver.enqueue_update(entity, object, record, operations, None)?;
                    Ok(object)
                }
                None => resolver.enqueue_insert(entity, record, None, operations, None),
            }
        });
        self.finish(result)
    }

    /// Updates the object of `entity` whose primary key is `key`.
    ///
    /// Returns `None`, and changes nothing, if there is no such object.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the pass.
    pub fn update<S: Store + ?Sized>(
        &self,
        store: &mut S,
        key: &Value,
        record: Record,
        entity: &str,
    ) -> SyncResult<Option<ObjectId>> {
        self.begin()?;
        let result = self.single_object(store, |resolver, schema| {
            let metadata = schema.entity(entity)?;
            let reconciler = resolver.reconciler(metadata);
            let existing = match reconciler.coerce_key(key) {
                Some(key) => reconciler.find_by_key(&*resolver.store(), &key)?,
                None => None,
            };
            if let Some(object) = existing {
                let operations = self.config.operations | Operations::UPDATE;
                resolver.enqueue_update(entity, object, record, operations, None)?;
            }
            Ok(existing)
        });
        self.finish(result)
    }

    /// Deletes the object of `entity` whose primary key is `key`.
    ///
    /// Returns false if there is no such object.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the pass.
    pub fn delete<S: Store + ?Sized>(
        &self,
        store: &mut S,
        key: &Value,
        entity: &str,
    ) -> SyncResult<bool> {
        self.begin()?;
        let result = self.single_object(store, |resolver, schema| {
            let metadata = schema.entity(entity)?;
            let reconciler = resolver.reconciler(metadata);
            let existing = match reconciler.coerce_key(key) {
                Some(key) => reconciler.find_by_key(&*resolver.store(), &key)?,
                None => None,
            };
            match existing {
                Some(object) => {
                    resolver.delete(object)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        });
        self.finish(result)
    }

    /// Finds the object of `entity` whose primary key is `key`.
    ///
    /// # Errors
    ///
    /// Returns a metadata error for an unknown entity, or a store error.
    pub fn fetch<S: Store + ?Sized>(
        &self,
        store: &S,
        key: &Value,
        entity: &str,
    ) -> SyncResult<Option<ObjectId>> {
        let schema = store.schema();
        let metadata = schema.entity(entity)?;
        let reconciler = Reconciler::new(
            metadata,
            self.config.inflection,
            self.coercer(),
            self.cache.as_deref(),
        );
        match reconciler.coerce_key(key) {
            Some(key) => reconciler.find_by_key(store, &key),
            None => Ok(None),
        }
    }

    /// Renders one object as an external record using the configured
    /// export options.
    ///
    /// # Errors
    ///
    /// Returns a store error if the object cannot be read.
    pub fn export<S: Store + ?Sized>(&self, store: &S, object: ObjectId) -> SyncResult<Record> {
        Ok(Exporter::new(&self.config.export)
            .with_transformers(&self.transformers)
            .with_cache(self.cache.as_deref())
            .export(store, object)?)
    }

    /// Renders every object of `entity` as external records.
    ///
    /// # Errors
    ///
    /// Returns a metadata error for an unknown entity, or a store error.
    pub fn export_all<S: Store + ?Sized>(&self, store: &S, entity: &str) -> SyncResult<Vec<Record>> {
        Ok(Exporter::new(&self.config.export)
            .with_transformers(&self.transformers)
            .with_cache(self.cache.as_deref())
            .export_all(store, entity, None)?)
    }

    fn single_object<S, T, F>(&self, store: &mut S, f: F) -> SyncResult<T>
    where
        S: Store + ?Sized,
        F: FnOnce(&mut Resolver<'_, S>, &Schema) -> SyncResult<T>,
    {
        let schema = store.schema();
        let mut delegate = NoopDelegate;
        let (result, outcome) = with_unit_of_work(store, |store| -> SyncResult<(T, SyncOutcome)> {
            let mut resolver = Resolver::new(
                store,
                &schema,
                &self.config,
                self.coercer(),
                self.cache.as_deref(),
                &mut delegate,
            );
            let result = f(&mut resolver, &schema)?;
            resolver.drain()?;
            resolver.sweep_orphans()?;
            Ok((result, resolver.into_outcome()))
        })?;
        self.stats.write().record(&outcome);
        Ok(result)
    }

    fn run_pass<S: Store + ?Sized>(
        &self,
        store: &mut S,
        records: Vec<Record>,
        scope: &SyncScope,
        delegate: &mut dyn SyncDelegate,
    ) -> SyncResult<SyncOutcome> {
        let schema = store.schema();
        let metadata = schema.entity(&scope.entity)?;
        let parent = match scope.parent {
            Some(parent) => Some((parent, self.parent_relationship(store, &schema, scope, parent)?)),
            None => None,
        };

        let mut predicate = scope.predicate.clone();
        if let Some(predicate) = &predicate {
            predicate
                .validate(metadata)
                .map_err(|e| SyncError::scope(&scope.entity, e.to_string()))?;
        }
        if let Some((parent, relationship)) = &parent {
            let related = Predicate::related_to(relationship.name.clone(), *parent);
            predicate = Some(match predicate {
                Some(p) => p.and(related),
                None => related,
            });
        }

        let operations = self.config.operations;
        let outcome = with_unit_of_work(store, |store| -> SyncResult<SyncOutcome> {
            let scope_ids = store
                .fetch(&scope.entity, predicate.as_ref())
                .map_err(|e| match e {
                    CoreError::InvalidPredicate { message } => {
                        SyncError::scope(&scope.entity, message)
                    }
                    other => other.into(),
                })?;

            let mut resolver = Resolver::new(
                store,
                &schema,
                &self.config,
                self.coercer(),
                self.cache.as_deref(),
                delegate,
            );
            let plan = resolver
                .reconciler(metadata)
                .plan(&*resolver.store(), &scope_ids, records, operations)?;
            debug!(
                entity = %scope.entity,
                inserts = plan.inserts.len(),
                updates = plan.updates.len(),
                deletes = plan.deletes.len(),
                duplicates = plan.duplicates.len(),
                "reconciled batch"
            );

            for duplicate in plan.duplicates {
                resolver.store().delete(duplicate)?;
                resolver.outcome_mut().deduplicated += 1;
            }
            for stale in plan.deletes {
                resolver.delete(stale)?;
            }

            let skip = parent.as_ref().map(|(_, r)| r.name.clone());
            for (object, record) in plan.updates {
                resolver.enqueue_update(&scope.entity, object, record, operations, skip.clone())?;
            }
            for record in plan.inserts {
                let object = resolver.enqueue_insert(
                    &scope.entity,
                    record,
                    parent.as_ref().map(|(p, _)| *p),
                    operations,
                    skip.clone(),
                )?;
                if let Some((parent, relationship)) = &parent {
                    let mut members = resolver.store().related(object, &relationship.name)?;
                    if !members.contains(parent) {
                        members.push(*parent);
                        resolver
                            .store()
                            .set_related(object, &relationship.name, &members)?;
                    }
                }
            }

            resolver.drain()?;
            resolver.sweep_orphans()?;
            Ok(resolver.into_outcome())
        })?;

        self.stats.write().record(&outcome);
        info!(
            entity = %scope.entity,
            inserted = outcome.inserted,
            updated = outcome.updated,
            deleted = outcome.deleted,
            deduplicated = outcome.deduplicated,
            "pass committed"
        );
        Ok(outcome)
    }

    /// The one relationship from the scope's entity to the parent's entity.
    fn parent_relationship<S: Store + ?Sized>(
        &self,
        store: &S,
        schema: &Schema,
        scope: &SyncScope,
        parent: ObjectId,
    ) -> SyncResult<RelationshipDescriptor> {
        let parent_entity = store.entity_of(parent).ok_or_else(|| {
            SyncError::scope(&scope.entity, format!("parent object {parent} does not exist"))
        })?;
        let child = schema.entity(&scope.entity)?;
        let mut candidates = schema.relationships_between(child, parent_entity);
        match (candidates.next(), candidates.next()) {
            (Some(relationship), None) => Ok(relationship.clone()),
            (None, _) => Err(SyncError::scope(
                &scope.entity,
                format!("no relationship to parent entity {parent_entity}"),
            )),
            (Some(_), Some(_)) => Err(SyncError::scope(
                &scope.entity,
                format!("several relationships to parent entity {parent_entity}"),
            )),
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("transformers", &self.transformers)
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
