use super::paging::PagingRequest;
use crate::core::{Instant, MasterError, ObjectId, Result};
use crate::storage::{Interval, Row};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Scan of one lineage across both axes.
///
/// On each axis, equal bounds select rows whose interval contains that
/// instant; otherwise rows whose interval intersects `[from, to]`.
/// Absent bounds are unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    pub object_id: ObjectId,
    #[serde(default)]
    pub versions_from: Option<Instant>,
    #[serde(default)]
    pub versions_to: Option<Instant>,
    #[serde(default)]
    pub corrections_from: Option<Instant>,
    #[serde(default)]
    pub corrections_to: Option<Instant>,
    #[serde(default)]
    pub paging: PagingRequest,
}

impl HistoryRequest {
    pub fn new(object_id: ObjectId) -> Self {
        Self {
            object_id,
            versions_from: None,
            versions_to: None,
            corrections_from: None,
            corrections_to: None,
            paging: PagingRequest::ALL,
        }
    }

    pub fn versions(mut self, from: Option<Instant>, to: Option<Instant>) -> Self {
        self.versions_from = from;
        self.versions_to = to;
        self
    }

    pub fn version_point(self, instant: Instant) -> Self {
        self.versions(Some(instant), Some(instant))
    }

    pub fn corrections(mut self, from: Option<Instant>, to: Option<Instant>) -> Self {
        self.corrections_from = from;
        self.corrections_to = to;
        self
    }

    pub fn correction_point(self, instant: Instant) -> Self {
        self.corrections(Some(instant), Some(instant))
    }

    pub fn paging(mut self, paging: PagingRequest) -> Self {
        self.paging = paging;
        self
    }

    /// Rejects a range that starts after it ends.
    pub fn validate(&self) -> Result<()> {
        let axes = [
            ("versions", self.versions_from, self.versions_to),
            ("corrections", self.corrections_from, self.corrections_to),
        ];
        for (axis, from, to) in axes {
            if let (Some(from), Some(to)) = (from, to)
                && from > to
            {
                return Err(MasterError::invalid(format!(
                    "{} range starts at {}, after its end {}",
                    axis, from, to
                )));
            }
        }
        Ok(())
    }

    pub fn matches<V>(&self, row: &Row<V>) -> bool {
        axis_matches(&row.version, self.versions_from, self.versions_to)
            && axis_matches(&row.correction, self.corrections_from, self.corrections_to)
    }

    /// Newest version first, then newest correction.
    pub fn order<V>(a: &Row<V>, b: &Row<V>) -> Ordering {
        b.version
            .from
            .cmp(&a.version.from)
            .then_with(|| b.correction.from.cmp(&a.correction.from))
    }
}

fn axis_matches(interval: &Interval, from: Option<Instant>, to: Option<Instant>) -> bool {
    match (from, to) {
        (Some(from), Some(to)) if from == to => interval.contains_instant(from),
        _ => interval.intersects(from, to),
    }
}
