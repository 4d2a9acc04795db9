use crate::core::{Document, ExternalId, ObjectId, Result, UniqueId, VersionCorrection};
use crate::master::{ChangeEvent, Master};
use crate::query::{HistoryRequest, Page, SearchRequest};
use crate::storage::Row;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tokio::sync::broadcast;

/// Lookup by identifying bundle: any of the external ids, all of the
/// attributes, at one coordinate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceQuery {
    pub external_ids: BTreeSet<ExternalId>,
    pub attributes: BTreeMap<String, String>,
    pub version_correction: VersionCorrection,
}

impl SourceQuery {
    pub fn of(ids: impl IntoIterator<Item = ExternalId>) -> Self {
        Self {
            external_ids: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn at(mut self, vc: VersionCorrection) -> Self {
        self.version_correction = vc;
        self
    }
}

impl fmt::Display for SourceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.external_ids.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", ids.join(", "))?;
        for (key, value) in &self.attributes {
            write!(f, " {}={}", key, value)?;
        }
        write!(f, " at {}", self.version_correction)
    }
}

/// Read side of a master, as seen by consumers such as
/// [`ReadThroughCache`](crate::cache::ReadThroughCache).
#[async_trait]
pub trait DocumentSource<V: Document>: Send + Sync {
    async fn get(&self, unique_id: &UniqueId) -> Result<Row<V>>;

    async fn get_at(&self, object_id: &ObjectId, vc: VersionCorrection) -> Result<Row<V>>;

    async fn get_many(&self, unique_ids: &[UniqueId]) -> Result<HashMap<UniqueId, Row<V>>>;

    async fn find(&self, query: &SourceQuery) -> Result<Row<V>>;

    /// Batched [`DocumentSource::find`]; queries that match nothing are
    /// absent from the result.
    async fn find_many(&self, queries: &[SourceQuery]) -> Result<HashMap<SourceQuery, Row<V>>>;

    async fn search(&self, request: &SearchRequest) -> Result<Page<Row<V>>>;

    async fn history(&self, request: &HistoryRequest) -> Result<Page<Row<V>>>;

    /// Feed of every change made after the call.
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;
}

#[async_trait]
impl<V: Document> DocumentSource<V> for Master<V> {
    async fn get(&self, unique_id: &UniqueId) -> Result<Row<V>> {
        Master::get(self, unique_id).await
    }

    async fn get_at(&self, object_id: &ObjectId, vc: VersionCorrection) -> Result<Row<V>> {
        Master::get_at(self, object_id, vc).await
    }

    async fn get_many(&self, unique_ids: &[UniqueId]) -> Result<HashMap<UniqueId, Row<V>>> {
        Master::get_many(self, unique_ids).await
    }

    async fn find(&self, query: &SourceQuery) -> Result<Row<V>> {
        Master::find(self, query).await
    }

    async fn find_many(&self, queries: &[SourceQuery]) -> Result<HashMap<SourceQuery, Row<V>>> {
        Master::find_many(self, queries).await
    }

    async fn search(&self, request: &SearchRequest) -> Result<Page<Row<V>>> {
        Master::search(self, request).await
    }

    async fn history(&self, request: &HistoryRequest) -> Result<Page<Row<V>>> {
        Master::history(self, request).await
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.subscribe()
    }
}
