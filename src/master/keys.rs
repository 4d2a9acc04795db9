use crate::core::{MasterError, ObjectId, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// Business keys held by current documents, for uniqueness enforcement.
///
/// Callers hold the lineage write lock while moving that lineage's key, so
/// the index always matches the rows visible at LATEST/LATEST.
#[derive(Debug, Default)]
pub(crate) struct KeyIndex {
    active: Mutex<HashMap<String, ObjectId>>,
}

impl KeyIndex {
    /// Moves `object_id` from key `from` to key `to`.
    pub(crate) fn transfer(&self, object_id: &ObjectId, from: Option<&str>, to: Option<&str>) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let mut active = self.active.lock()?;
        if let Some(to) = to
            && let Some(holder) = active.get(to)
            && holder != object_id
        {
            return Err(MasterError::DuplicateKey(format!(
                "'{}' is already active on {}",
                to, holder
            )));
        }
        if let Some(from) = from
            && active.get(from) == Some(object_id)
        {
            active.remove(from);
        }
        if let Some(to) = to {
            active.insert(to.to_string(), object_id.clone());
        }
        Ok(())
    }

    pub(crate) fn holder(&self, key: &str) -> Result<Option<ObjectId>> {
        Ok(self.active.lock()?.get(key).cloned())
    }
}
