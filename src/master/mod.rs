//! Bitemporal document master
//!
//! [`Master`] owns every row of one document type and exposes the only
//! legal transitions of each lineage: add, update, correct, remove and the
//! bulk replacements in [`replace`]. Reads resolve a single row per object
//! at a [`VersionCorrection`] coordinate.

pub mod config;
pub mod events;
mod keys;
pub mod replace;

pub use config::MasterConfig;
pub use events::{ChangeEvent, ChangeType};
pub use replace::Replacement;

use crate::core::{
    Clock, Document, IdAllocator, Instant, MasterError, ObjectId, Result, SystemClock, UniqueId,
    VersionCorrection,
};
use crate::expression::WildcardMatcher;
use crate::query::{ExternalIdSearch, ExternalIdSearchType, HistoryRequest, Page, PagingRequest, SearchRequest};
use crate::source::SourceQuery;
use crate::storage::{InMemoryStore, Lineage, Row, WritePlan};
use keys::KeyIndex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{Instrument, Level, event, info_span};

pub struct Master<V> {
    config: MasterConfig,
    clock: Arc<dyn Clock>,
    ids: IdAllocator,
    store: InMemoryStore<V>,
    keys: KeyIndex,
    matcher: WildcardMatcher,
    default_vc: RwLock<VersionCorrection>,
    changes: broadcast::Sender<ChangeEvent>,
    open: AtomicBool,
}

impl<V: Document> Master<V> {
    /// Master on the system clock.
    ///
    /// # Examples
    ///
    /// ```
    /// use bitemporal_master::{Master, MasterConfig, VersionCorrection};
    ///
    /// # tokio_test::block_on(async {
    /// let master = Master::new(MasterConfig::new("DbCnv")).unwrap();
    /// let uid = master.add("USD-OIS".to_string(), "USD-OIS").await.unwrap();
    /// let row = master.get_at(uid.object_id(), VersionCorrection::LATEST).await.unwrap();
    /// assert_eq!(row.value(), "USD-OIS");
    /// # });
    /// ```
    pub fn new(config: MasterConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: MasterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let (changes, _) = broadcast::channel(config.change_buffer);
        Ok(Self {
            ids: IdAllocator::new(config.scheme.clone(), config.id_strategy),
            matcher: WildcardMatcher::new(config.pattern_cache_size),
            default_vc: RwLock::new(config.default_version_correction),
            store: InMemoryStore::new(),
            keys: KeyIndex::default(),
            changes,
            open: AtomicBool::new(true),
            clock,
            config,
        })
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    pub fn scheme(&self) -> &str {
        self.ids.scheme()
    }

    pub fn default_version_correction(&self) -> VersionCorrection {
        *self.default_vc.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Coordinate used by reads that do not name one, including the key
    /// lookup inside [`Master::add_or_update`].
    pub fn set_default_version_correction(&self, vc: VersionCorrection) {
        *self.default_vc.write().unwrap_or_else(PoisonError::into_inner) = vc;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    /// Every later call fails with `Unavailable`.
    pub fn shutdown(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            event!(Level::INFO, scheme = %self.scheme(), "master shut down");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub async fn object_count(&self) -> usize {
        self.store.len().await
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Starts a new lineage at version 1.
    pub async fn add(&self, value: V, business_key: impl Into<String>) -> Result<UniqueId> {
        let business_key = business_key.into();
        let span = info_span!("master.add", business_key = %business_key);
        async move {
            self.ensure_open()?;
            let object_id = self.ids.next_object_id();
            if self.config.enforce_unique_keys {
                self.keys.transfer(&object_id, None, Some(&business_key))?;
            }

            let mut lineage = Lineage::new(object_id.clone());
            let plan = lineage.plan_add(self.clock.now(), business_key.clone(), Arc::new(value));
            let change = ChangeEvent::of(ChangeType::Added, &object_id, &plan);
            let stored = match single(lineage.apply(plan)) {
                Ok(unique_id) => self.store.insert(lineage).await.map(|_| unique_id),
                Err(e) => Err(e),
            };
            let unique_id = match stored {
                Ok(unique_id) => unique_id,
                Err(e) => {
                    if self.config.enforce_unique_keys {
                        self.keys.transfer(&object_id, Some(&business_key), None)?;
                    }
                    return Err(e);
                }
            };
            self.publish(change);
            event!(Level::DEBUG, unique_id = %unique_id, "document added");
            Ok(unique_id)
        }
        .instrument(span)
        .await
    }

    /// Supersedes the current version. A versioned `unique_id` must name the
    /// current version; the business key follows the value's own name when
    /// it declares one.
    pub async fn update(&self, unique_id: &UniqueId, value: V) -> Result<UniqueId> {
        let business_key = value.name().map(str::to_string);
        self.update_with_key(unique_id, value, business_key).await
    }

    async fn update_with_key(
        &self,
        unique_id: &UniqueId,
        value: V,
        business_key: Option<String>,
    ) -> Result<UniqueId> {
        let value = Arc::new(value);
        let expected = unique_id.version();
        let ids = self
            .mutate(unique_id.object_id(), "update", move |lineage, stamp| {
                let plan = lineage.plan_update(stamp, expected, business_key, value)?;
                Ok((plan, ChangeType::Changed))
            })
            .await?;
        single(ids)
    }

    /// Re-states one version without moving it on the version axis. The
    /// returned id keeps the corrected version's `VersionId`.
    pub async fn correct(&self, unique_id: &UniqueId, value: V) -> Result<UniqueId> {
        let business_key = value.name().map(str::to_string);
        let value = Arc::new(value);
        let version = unique_id.version();
        let ids = self
            .mutate(unique_id.object_id(), "correct", move |lineage, stamp| {
                let plan = lineage.plan_correct(stamp, version, business_key, value)?;
                Ok((plan, ChangeType::Changed))
            })
            .await?;
        single(ids)
    }

    /// Ends the current version. History stays queryable.
    pub async fn remove(&self, object_id: &ObjectId) -> Result<()> {
        self.mutate(object_id, "remove", |lineage, stamp| {
            Ok((lineage.plan_remove(stamp)?, ChangeType::Removed))
        })
        .await
        .map(|_| ())
    }

    /// Updates the document holding `business_key` under the default
    /// coordinate, or adds one when there is none.
    pub async fn add_or_update(&self, value: V, business_key: impl Into<String>) -> Result<UniqueId> {
        let business_key = business_key.into();
        let vc = self.default_version_correction();
        let Some(found) = self.find_by_key(&business_key, vc).await? else {
            return self.add(value, business_key).await;
        };

        let handle = self.store.get(&found.object_id).await?;
        let current = handle.read().await.current().map(Row::unique_id);
        match current {
            None => self.add(value, business_key).await,
            Some(current) => match self.update_with_key(&current, value, Some(business_key)).await {
                Err(MasterError::NotFound(message)) => Err(MasterError::ConcurrentModification(message)),
                other => other,
            },
        }
    }

    /// Runs one write against a lineage under its write lock: read the
    /// clock once, build the plan, move the business key, apply, publish.
    async fn mutate<F>(&self, object_id: &ObjectId, op: &'static str, build: F) -> Result<Vec<UniqueId>>
    where
        F: FnOnce(&Lineage<V>, Instant) -> Result<(WritePlan<V>, ChangeType)>,
    {
        let span = info_span!("master.write", op, object_id = %object_id);
        async move {
            self.ensure_open()?;
            let handle = self.store.get(object_id).await?;
            let mut lineage = handle.write().await;

            let stamp = lineage.stamp(self.clock.now());
            let (plan, change_type) = build(&*lineage, stamp).inspect_err(|err| {
                event!(Level::DEBUG, error = %err, "write rejected");
            })?;
            if plan.is_empty() {
                return Ok(Vec::new());
            }

            if self.config.enforce_unique_keys {
                let before = lineage.current().map(|row| row.business_key.as_str());
                let after = lineage.key_after(&plan);
                self.keys.transfer(object_id, before, after)?;
            }

            let change = ChangeEvent::of(change_type, object_id, &plan);
            let ids = lineage.apply(plan);
            drop(lineage);

            self.publish(change);
            event!(Level::DEBUG, rows = ids.len(), "write applied");
            Ok(ids)
        }
        .instrument(span)
        .await
    }

    fn publish(&self, change: ChangeEvent) {
        // No subscribers is not an error.
        let _ = self.changes.send(change);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(MasterError::Unavailable(format!("master '{}' is shut down", self.scheme())))
        }
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Exact lookup: a versioned id resolves that version's live correction,
    /// a latest id the row valid now.
    pub async fn get(&self, unique_id: &UniqueId) -> Result<Row<V>> {
        self.ensure_open()?;
        let now = self.clock.now();
        let handle = self.store.get(unique_id.object_id()).await?;
        let lineage = handle.read().await;
        lineage
            .lookup(unique_id, now)
            .cloned()
            .ok_or_else(|| MasterError::not_found(unique_id))
    }

    /// As [`Master::get`], but as the correction axis stood at `corrected_to`.
    pub async fn get_corrected(&self, unique_id: &UniqueId, corrected_to: Instant) -> Result<Row<V>> {
        self.ensure_open()?;
        let now = self.clock.now();
        let handle = self.store.get(unique_id.object_id()).await?;
        let lineage = handle.read().await;
        let row = match unique_id.version() {
            Some(version) => lineage.resolve_version(version, Some(corrected_to)),
            None => lineage.resolve_at(&VersionCorrection::of_corrected_to(corrected_to), now),
        };
        row.cloned().ok_or_else(|| MasterError::not_found(unique_id))
    }

    /// LATEST on either axis means the instant the read runs at.
    pub async fn get_at(&self, object_id: &ObjectId, vc: VersionCorrection) -> Result<Row<V>> {
        self.ensure_open()?;
        let now = self.clock.now();
        let handle = self.store.get(object_id).await?;
        let lineage = handle.read().await;
        lineage
            .resolve_at(&vc, now)
            .cloned()
            .ok_or_else(|| MasterError::NotFound(format!("{} at {}", object_id, vc)))
    }

    /// Resolves under the default coordinate.
    pub async fn get_object(&self, object_id: &ObjectId) -> Result<Row<V>> {
        self.get_at(object_id, self.default_version_correction()).await
    }

    /// Batched [`Master::get`]. Ids that resolve to nothing are left out.
    pub async fn get_many(&self, unique_ids: &[UniqueId]) -> Result<HashMap<UniqueId, Row<V>>> {
        let mut found = HashMap::with_capacity(unique_ids.len());
        for unique_id in unique_ids {
            match self.get(unique_id).await {
                Ok(row) => {
                    found.insert(unique_id.clone(), row);
                }
                Err(MasterError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(found)
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Page<Row<V>>> {
        self.ensure_open()?;
        request.validate()?;
        let vc = request
            .version_correction
            .unwrap_or_else(|| self.default_version_correction());
        let now = self.clock.now();

        let mut rows = Vec::new();
        for handle in self.store.handles().await {
            let lineage = handle.read().await;
            if !request.admits_object(lineage.object_id()) {
                continue;
            }
            if let Some(row) = lineage.resolve_at(&vc, now)
                && request.matches(row, &self.matcher)?
            {
                rows.push(row.clone());
            }
        }

        request.sort_order.sort(&mut rows);
        Ok(request.paging.select(rows))
    }

    pub async fn history(&self, request: &HistoryRequest) -> Result<Page<Row<V>>> {
        self.ensure_open()?;
        request.validate()?;
        let handle = self.store.get(&request.object_id).await?;
        let lineage = handle.read().await;
        let mut rows: Vec<Row<V>> = lineage
            .rows()
            .iter()
            .filter(|row| request.matches(row))
            .cloned()
            .collect();
        rows.sort_by(HistoryRequest::order);
        Ok(request.paging.select(rows))
    }

    /// First document, in object id order, matching any of the query's
    /// external ids and all of its attributes.
    pub async fn find(&self, query: &SourceQuery) -> Result<Row<V>> {
        let mut request = SearchRequest::new()
            .external_ids(ExternalIdSearch::of(
                ExternalIdSearchType::Any,
                query.external_ids.iter().cloned(),
            ))
            .version_correction(query.version_correction)
            .paging(PagingRequest::ONE);
        request.attributes = query.attributes.clone();

        self.search(&request)
            .await?
            .items
            .into_iter()
            .next()
            .ok_or_else(|| MasterError::NotFound(format!("no document matches {}", query)))
    }

    /// Batched [`Master::find`]. Queries that match nothing are left out.
    pub async fn find_many(&self, queries: &[SourceQuery]) -> Result<HashMap<SourceQuery, Row<V>>> {
        let mut found = HashMap::with_capacity(queries.len());
        for query in queries {
            match self.find(query).await {
                Ok(row) => {
                    found.insert(query.clone(), row);
                }
                Err(MasterError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(found)
    }

    /// Document whose business key is exactly `business_key` at `vc`.
    pub async fn find_by_key(&self, business_key: &str, vc: VersionCorrection) -> Result<Option<Row<V>>> {
        self.ensure_open()?;
        // The index tracks open rows; a hit still has to be valid now.
        if vc.is_latest()
            && self.config.enforce_unique_keys
            && let Some(object_id) = self.keys.holder(business_key)?
        {
            match self.get_at(&object_id, vc).await {
                Ok(row) if row.business_key == business_key => return Ok(Some(row)),
                Ok(_) | Err(MasterError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        let now = self.clock.now();
        for handle in self.store.handles().await {
            let lineage = handle.read().await;
            if let Some(row) = lineage.resolve_at(&vc, now)
                && row.business_key == business_key
            {
                return Ok(Some(row.clone()));
            }
        }
        Ok(None)
    }
}

fn single(ids: Vec<UniqueId>) -> Result<UniqueId> {
    ids.into_iter()
        .next()
        .ok_or_else(|| MasterError::Unavailable("write produced no row".to_string()))
}
