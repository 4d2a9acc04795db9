use crate::core::{Instant, MasterError, ObjectId, Result, UniqueId, VersionId};
use std::sync::Arc;

/// Half-open interval `[from, to)`; `to == None` is the open end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub from: Instant,
    pub to: Option<Instant>,
}

impl Interval {
    pub fn open(from: Instant) -> Self {
        Self { from, to: None }
    }

    pub fn new(from: Instant, to: Option<Instant>) -> Result<Self> {
        match to {
            Some(to) if to <= from => Err(MasterError::invalid(format!(
                "Interval must end after it starts: [{}, {})",
                from, to
            ))),
            _ => Ok(Self { from, to }),
        }
    }

    pub fn is_open(&self) -> bool {
        self.to.is_none()
    }

    /// `None` matches only open intervals. Writes use it to find the row they
    /// close; reads pin LATEST to an instant first.
    pub fn contains(&self, at: Option<Instant>) -> bool {
        match at {
            Some(at) => self.contains_instant(at),
            None => self.is_open(),
        }
    }

    pub fn contains_instant(&self, at: Instant) -> bool {
        self.from <= at && self.to.is_none_or(|to| at < to)
    }

    /// Intersection with the closed range `[from, to]`, unbounded where `None`.
    pub fn intersects(&self, from: Option<Instant>, to: Option<Instant>) -> bool {
        let starts_in_time = to.is_none_or(|to| self.from <= to);
        let ends_in_time = match (self.to, from) {
            (Some(end), Some(from)) => end > from,
            _ => true,
        };
        starts_in_time && ends_in_time
    }
}

/// Identity of one stored row. A version keeps its `VersionId` across
/// corrections, so the correction start tells the rows apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub unique_id: UniqueId,
    pub correction_from: Instant,
}

/// One stored bitemporal fact.
#[derive(Debug, Clone)]
pub struct Row<V> {
    pub object_id: ObjectId,
    pub version_id: VersionId,
    pub business_key: String,
    pub value: Arc<V>,
    pub version: Interval,
    pub correction: Interval,
}

impl<V> Row<V> {
    pub fn unique_id(&self) -> UniqueId {
        self.object_id.at_version(self.version_id)
    }

    pub fn key(&self) -> RowKey {
        RowKey {
            unique_id: self.unique_id(),
            correction_from: self.correction.from,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn version_from(&self) -> Instant {
        self.version.from
    }

    pub fn version_to(&self) -> Option<Instant> {
        self.version.to
    }

    pub fn correction_from(&self) -> Instant {
        self.correction.from
    }

    pub fn correction_to(&self) -> Option<Instant> {
        self.correction.to
    }

    /// Open on both axes: the row visible at LATEST/LATEST.
    pub fn is_current(&self) -> bool {
        self.version.is_open() && self.correction.is_open()
    }
}
