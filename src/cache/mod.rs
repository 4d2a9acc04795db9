//! Read-through cache
//!
//! Lookups resolve in two steps, mirroring the master: a lookup key maps to
//! the identity of the row it resolved to, and that identity maps to the
//! row. Two lookups that land on the same row share one entry.
//!
//! Entries for an object are dropped as soon as its change event is seen.
//! Every read drains the change feed first, so a read issued after a write
//! returned never sees the pre-write row.

mod stats;

pub use stats::CacheStats;

use crate::core::{
    DateWindow, Document, MasterError, ObjectId, Result, TimeSeries, UniqueId, VersionCorrection, Windowed,
};
use crate::master::ChangeEvent;
use crate::query::{HistoryRequest, Page, SearchRequest};
use crate::source::{DocumentSource, SourceQuery};
use crate::storage::{Row, RowKey};
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use stats::Counters;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{Level, event};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LookupKey {
    Pinned(UniqueId),
    At(ObjectId, VersionCorrection),
    Query(SourceQuery),
}

impl LookupKey {
    fn for_unique_id(unique_id: &UniqueId) -> Self {
        if unique_id.is_latest() {
            Self::At(unique_id.object_id().clone(), VersionCorrection::LATEST)
        } else {
            Self::Pinned(unique_id.clone())
        }
    }

    /// Whether the key reads LATEST on the version axis. Such a key may
    /// only keep a row whose version is open: a bounded version stops
    /// being the answer once its end passes, with no change event.
    fn tracks_latest(&self) -> bool {
        match self {
            Self::Pinned(_) => false,
            Self::At(_, vc) => vc.version_as_of().is_none(),
            Self::Query(query) => query.version_correction.version_as_of().is_none(),
        }
    }
}

/// Everything cached on behalf of one object.
#[derive(Debug, Default)]
struct ObjectEntries {
    lookups: HashSet<LookupKey>,
    rows: HashSet<RowKey>,
}

/// Memoizing decorator with the same read contract as the source it wraps.
pub struct ReadThroughCache<V, S> {
    source: Arc<S>,
    changes: Mutex<broadcast::Receiver<ChangeEvent>>,
    resolved: DashMap<LookupKey, RowKey>,
    queries: DashMap<SourceQuery, RowKey>,
    missed: DashMap<SourceQuery, ()>,
    rows: DashMap<RowKey, Arc<Row<V>>>,
    by_object: DashMap<ObjectId, ObjectEntries>,
    epoch: AtomicU64,
    counters: Counters,
    _value: PhantomData<fn() -> V>,
}

impl<V: Document, S: DocumentSource<V> + 'static> ReadThroughCache<V, S> {
    pub fn new(source: Arc<S>) -> Self {
        let changes = Mutex::new(source.changes());
        Self {
            source,
            changes,
            resolved: DashMap::new(),
            queries: DashMap::new(),
            missed: DashMap::new(),
            rows: DashMap::new(),
            by_object: DashMap::new(),
            epoch: AtomicU64::new(0),
            counters: Counters::default(),
            _value: PhantomData,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    /// Number of distinct rows held.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.resolved.clear();
        self.queries.clear();
        self.missed.clear();
        self.rows.clear();
        self.by_object.clear();
    }

    /// Applies every change event published since the last read.
    fn sync(&self) {
        let mut changes = self.changes.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match changes.try_recv() {
                Ok(change) => self.invalidate(&change.object_id),
                Err(TryRecvError::Lagged(skipped)) => {
                    event!(Level::WARN, skipped, "cache fell behind the change feed, clearing");
                    self.clear();
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    /// Drops the object's own entries. Business queries may now resolve to
    /// a different object, so all of them go too.
    fn invalidate(&self, object_id: &ObjectId) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.queries.clear();
        self.missed.clear();

        let Some((_, entries)) = self.by_object.remove(object_id) else {
            return;
        };
        for key in &entries.lookups {
            self.resolved.remove(key);
        }
        let dropped = entries
            .rows
            .iter()
            .filter(|row_key| self.rows.remove(*row_key).is_some())
            .count();
        self.counters.invalidated(dropped as u64);
    }

    fn lookup(&self, key: &LookupKey) -> Option<Row<V>> {
        let row_key = match key {
            LookupKey::Query(query) => self.queries.get(query)?.value().clone(),
            key => self.resolved.get(key)?.value().clone(),
        };
        self.rows.get(&row_key).map(|row| Row::clone(row.value()))
    }

    /// Stores a row fetched while the cache stood at `epoch`. A change seen
    /// in between means the row may already be stale, so it is not kept.
    fn remember(&self, key: LookupKey, row: &Row<V>, epoch: u64) {
        self.sync();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        if key.tracks_latest() && !row.version.is_open() {
            return;
        }

        let row_key = row.key();
        self.rows.insert(row_key.clone(), Arc::new(row.clone()));
        let mut entries = self.by_object.entry(row.object_id.clone()).or_default();
        entries.rows.insert(row_key.clone());
        match key {
            LookupKey::Query(query) => {
                self.queries.insert(query, row_key);
            }
            key => {
                entries.lookups.insert(key.clone());
                self.resolved.insert(key, row_key);
            }
        }
    }

    /// Records that `query` matched nothing, unless a change came in since.
    fn remember_miss(&self, query: SourceQuery, epoch: u64) {
        self.sync();
        if self.epoch.load(Ordering::SeqCst) == epoch {
            self.missed.insert(query, ());
        }
    }

    fn known_miss(&self, query: &SourceQuery) -> Option<MasterError> {
        self.missed
            .contains_key(query)
            .then(|| MasterError::NotFound(format!("no document matches {}", query)))
    }

    async fn read_through<F, Fut>(&self, key: LookupKey, fetch: F) -> Result<Row<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Row<V>>>,
    {
        self.sync();
        if let Some(row) = self.lookup(&key) {
            self.counters.hit();
            return Ok(row);
        }

        self.counters.miss(1);
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.counters.source_call();
        let row = fetch().await?;
        self.remember(key, &row, epoch);
        Ok(row)
    }
}

impl<V: Document + Windowed, S: DocumentSource<V> + 'static> ReadThroughCache<V, S> {
    /// Slice of a cached value; the full value is fetched at most once.
    pub async fn get_window(&self, unique_id: &UniqueId, window: &DateWindow) -> Result<V> {
        let row = DocumentSource::get(self, unique_id).await?;
        Ok(row.value().window(window))
    }

    pub async fn find_window(&self, query: &SourceQuery, window: &DateWindow) -> Result<V> {
        let row = DocumentSource::find(self, query).await?;
        Ok(row.value().window(window))
    }
}

impl<S: DocumentSource<TimeSeries> + 'static> ReadThroughCache<TimeSeries, S> {
    /// Last point of the series inside `window`, `None` when the window
    /// holds no points.
    pub async fn latest_point(
        &self,
        unique_id: &UniqueId,
        window: &DateWindow,
    ) -> Result<Option<(NaiveDate, f64)>> {
        Ok(self.get_window(unique_id, window).await?.latest_point())
    }

    pub async fn find_latest_point(
        &self,
        query: &SourceQuery,
        window: &DateWindow,
    ) -> Result<Option<(NaiveDate, f64)>> {
        Ok(self.find_window(query, window).await?.latest_point())
    }
}

#[async_trait]
impl<V: Document, S: DocumentSource<V> + 'static> DocumentSource<V> for ReadThroughCache<V, S> {
    async fn get(&self, unique_id: &UniqueId) -> Result<Row<V>> {
        self.read_through(LookupKey::for_unique_id(unique_id), || self.source.get(unique_id))
            .await
    }

    async fn get_at(&self, object_id: &ObjectId, vc: VersionCorrection) -> Result<Row<V>> {
        self.read_through(LookupKey::At(object_id.clone(), vc), || self.source.get_at(object_id, vc))
            .await
    }

    /// Hits are answered from memory; all misses go to the source in one
    /// batched call.
    async fn get_many(&self, unique_ids: &[UniqueId]) -> Result<HashMap<UniqueId, Row<V>>> {
        self.sync();
        let mut found = HashMap::with_capacity(unique_ids.len());
        let mut missing = Vec::new();
        for unique_id in unique_ids {
            match self.lookup(&LookupKey::for_unique_id(unique_id)) {
                Some(row) => {
                    self.counters.hit();
                    found.insert(unique_id.clone(), row);
                }
                None => missing.push(unique_id.clone()),
            }
        }
        if missing.is_empty() {
            return Ok(found);
        }

        self.counters.miss(missing.len() as u64);
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.counters.source_call();
        let fetched = self.source.get_many(&missing).await?;
        for (unique_id, row) in fetched {
            self.remember(LookupKey::for_unique_id(&unique_id), &row, epoch);
            found.insert(unique_id, row);
        }
        Ok(found)
    }

    async fn find(&self, query: &SourceQuery) -> Result<Row<V>> {
        self.sync();
        if let Some(err) = self.known_miss(query) {
            self.counters.hit();
            return Err(err);
        }
        let epoch = self.epoch.load(Ordering::SeqCst);
        let result = self
            .read_through(LookupKey::Query(query.clone()), || self.source.find(query))
            .await;
        if let Err(MasterError::NotFound(_)) = &result {
            self.remember_miss(query.clone(), epoch);
        }
        result
    }

    /// Same split as [`get_many`](DocumentSource::get_many), keyed by
    /// business query. Queries known to match nothing are not asked again.
    async fn find_many(&self, queries: &[SourceQuery]) -> Result<HashMap<SourceQuery, Row<V>>> {
        self.sync();
        let mut found = HashMap::with_capacity(queries.len());
        let mut missing = Vec::new();
        for query in queries {
            if self.missed.contains_key(query) {
                self.counters.hit();
                continue;
            }
            match self.lookup(&LookupKey::Query(query.clone())) {
                Some(row) => {
                    self.counters.hit();
                    found.insert(query.clone(), row);
                }
                None => missing.push(query.clone()),
            }
        }
        if missing.is_empty() {
            return Ok(found);
        }

        self.counters.miss(missing.len() as u64);
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.counters.source_call();
        let mut fetched = self.source.find_many(&missing).await?;
        for query in missing {
            match fetched.remove(&query) {
                Some(row) => {
                    self.remember(LookupKey::Query(query.clone()), &row, epoch);
                    found.insert(query, row);
                }
                None => self.remember_miss(query, epoch),
            }
        }
        Ok(found)
    }

    async fn search(&self, request: &SearchRequest) -> Result<Page<Row<V>>> {
        self.counters.source_call();
        self.source.search(request).await
    }

    async fn history(&self, request: &HistoryRequest) -> Result<Page<Row<V>>> {
        self.counters.source_call();
        self.source.history(request).await
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.source.changes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_latest_unique_id_shares_key_with_latest_coordinate() {
        let object_id = ObjectId::of("Db", "1");
        assert_eq!(
            LookupKey::for_unique_id(&object_id.at_latest()),
            LookupKey::At(object_id.clone(), VersionCorrection::LATEST)
        );
    }

    #[test]
    fn test_only_version_latest_keys_track_latest() {
        let object_id = ObjectId::of("Db", "1");
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(LookupKey::for_unique_id(&object_id.at_latest()).tracks_latest());
        assert!(!LookupKey::Pinned(object_id.at_version(crate::core::VersionId::FIRST)).tracks_latest());
        assert!(!LookupKey::At(object_id, VersionCorrection::of_version_as_of(instant)).tracks_latest());
        assert!(LookupKey::Query(SourceQuery::default()).tracks_latest());
    }
}
