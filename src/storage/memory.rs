use super::Lineage;
use crate::core::{MasterError, ObjectId, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Lineage handle; writers to one object serialize on its lock.
pub type LineageHandle<V> = Arc<RwLock<Lineage<V>>>;

/// All lineages of one document type, each behind its own lock.
///
/// The outer map lock is held only long enough to find or register a
/// handle, so writers on different objects never wait on each other.
pub struct InMemoryStore<V> {
    lineages: RwLock<BTreeMap<ObjectId, LineageHandle<V>>>,
}

impl<V> InMemoryStore<V> {
    pub fn new() -> Self {
        Self {
            lineages: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers a freshly created lineage.
    pub async fn insert(&self, lineage: Lineage<V>) -> Result<LineageHandle<V>> {
        let object_id = lineage.object_id().clone();
        let mut lineages = self.lineages.write().await;
        if lineages.contains_key(&object_id) {
            return Err(MasterError::invalid(format!(
                "Object id {} is already allocated",
                object_id
            )));
        }
        let handle = Arc::new(RwLock::new(lineage));
        lineages.insert(object_id, Arc::clone(&handle));
        Ok(handle)
    }

    pub async fn get(&self, object_id: &ObjectId) -> Result<LineageHandle<V>> {
        self.lineages
            .read()
            .await
            .get(object_id)
            .cloned()
            .ok_or_else(|| MasterError::not_found(object_id))
    }

    /// Handles in object id order.
    pub async fn handles(&self) -> Vec<LineageHandle<V>> {
        self.lineages.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.lineages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.lineages.read().await.is_empty()
    }
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
