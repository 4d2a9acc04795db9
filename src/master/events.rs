use crate::core::{Instant, ObjectId};
use crate::storage::WritePlan;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Added,
    Changed,
    Removed,
}

/// Published after every successful mutation of one lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub change_type: ChangeType,
    pub object_id: ObjectId,
    /// Version span written by the change, if it wrote any rows.
    pub version_from: Option<Instant>,
    pub version_to: Option<Instant>,
    pub instant: Instant,
}

impl ChangeEvent {
    pub(crate) fn of<V>(change_type: ChangeType, object_id: &ObjectId, plan: &WritePlan<V>) -> Self {
        let inserts = plan.inserts();
        let version_from = inserts.iter().map(|row| row.version.from).min();
        let version_to = if inserts.iter().any(|row| row.version.is_open()) {
            None
        } else {
            inserts.iter().filter_map(|row| row.version.to).max()
        };
        Self {
            change_type,
            object_id: object_id.clone(),
            version_from,
            version_to,
            instant: plan.stamp(),
        }
    }
}
