use super::resolver;
use super::row::{Interval, Row};
use crate::core::time::tick;
use crate::core::{Instant, MasterError, ObjectId, Result, UniqueId, VersionCorrection, VersionId};
use std::sync::Arc;

/// Every row ever written for one object id.
///
/// Rows are append-only. The only in-place change is closing the open end
/// of an interval, and that only happens through [`Lineage::apply`].
#[derive(Debug)]
pub struct Lineage<V> {
    object_id: ObjectId,
    rows: Vec<Row<V>>,
    last_version: VersionId,
    last_stamp: Option<Instant>,
}

impl<V> Lineage<V> {
    pub fn new(object_id: ObjectId) -> Self {
        Self {
            object_id,
            rows: Vec::new(),
            last_version: VersionId::new(0),
            last_stamp: None,
        }
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    pub fn rows(&self) -> &[Row<V>] {
        &self.rows
    }

    pub fn last_version(&self) -> VersionId {
        self.last_version
    }

    /// Stamp for an operation reading `now`, strictly after every stamp
    /// already issued for this lineage.
    pub fn stamp(&self, now: Instant) -> Instant {
        match self.last_stamp {
            Some(last) if now <= last => last + tick(),
            _ => now,
        }
    }

    pub fn current(&self) -> Option<&Row<V>> {
        resolver::current_index(&self.rows).map(|index| &self.rows[index])
    }

    pub fn resolve(&self, vc: &VersionCorrection) -> Option<&Row<V>> {
        resolver::resolve(&self.rows, vc)
    }

    pub fn resolve_version(&self, version: VersionId, corrected_to: Option<Instant>) -> Option<&Row<V>> {
        resolver::resolve_version_index(&self.rows, version, corrected_to).map(|index| &self.rows[index])
    }

    /// Instant a read issued at `now` sees this lineage at. Never earlier
    /// than the lineage's last write.
    pub fn read_instant(&self, now: Instant) -> Instant {
        self.last_stamp.map_or(now, |last| last.max(now))
    }

    /// Read-side resolution: LATEST on either axis is pinned to the read
    /// instant, so a version dated in the future or already ended is
    /// treated like any other interval.
    pub fn resolve_at(&self, vc: &VersionCorrection, now: Instant) -> Option<&Row<V>> {
        self.resolve(&vc.with_latest_fixed(self.read_instant(now)))
    }

    /// Row a unique id names for a read at `now`.
    pub fn lookup(&self, unique_id: &UniqueId, now: Instant) -> Option<&Row<V>> {
        let at = self.read_instant(now);
        match unique_id.version() {
            Some(version) => self.resolve_version(version, Some(at)),
            None => self.resolve_at(&VersionCorrection::LATEST, at),
        }
    }

    /// Index of the live correction a unique id names; a latest id names
    /// the row open on both axes. Writes address rows this way.
    pub fn locate(&self, unique_id: &UniqueId) -> Option<usize> {
        match unique_id.version() {
            Some(version) => resolver::resolve_version_index(&self.rows, version, None),
            None => resolver::current_index(&self.rows),
        }
    }

    /// Indices of rows whose correction is still open.
    pub fn live(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.correction.is_open())
            .map(|(index, _)| index)
    }

    /// Business key of the most recently written row.
    pub fn last_business_key(&self) -> Option<&str> {
        self.rows.last().map(|row| row.business_key.as_str())
    }

    pub fn plan(&self, stamp: Instant) -> WritePlan<V> {
        WritePlan {
            object_id: self.object_id.clone(),
            stamp,
            close_versions: Vec::new(),
            close_corrections: Vec::new(),
            inserts: Vec::new(),
            returned: Vec::new(),
            last_version: self.last_version,
        }
    }

    /// Business key of the current row once `plan` is applied.
    pub fn key_after<'a>(&'a self, plan: &'a WritePlan<V>) -> Option<&'a str> {
        if let Some(row) = plan.inserts.iter().find(|row| row.is_current()) {
            return Some(&row.business_key);
        }
        let index = resolver::current_index(&self.rows)?;
        if plan.close_versions.contains(&index) || plan.close_corrections.contains(&index) {
            None
        } else {
            Some(&self.rows[index].business_key)
        }
    }

    pub fn apply(&mut self, plan: WritePlan<V>) -> Vec<UniqueId> {
        for index in plan.close_versions {
            self.rows[index].version.to = Some(plan.stamp);
        }
        for index in plan.close_corrections {
            self.rows[index].correction.to = Some(plan.stamp);
        }
        self.rows.extend(plan.inserts);
        self.last_version = plan.last_version;
        self.last_stamp = Some(plan.stamp);
        plan.returned
    }

    // ------------------------------------------------------------------------
    // Single-row transitions
    // ------------------------------------------------------------------------

    pub fn plan_add(&self, stamp: Instant, business_key: String, value: Arc<V>) -> WritePlan<V> {
        let mut plan = self.plan(stamp);
        let unique_id = plan.insert_version(business_key, value, Interval::open(stamp));
        plan.returning(unique_id);
        plan
    }

    /// Closes the current version and opens a new one. `expected` pins the
    /// version the caller believes is current.
    pub fn plan_update(
        &self,
        stamp: Instant,
        expected: Option<VersionId>,
        business_key: Option<String>,
        value: Arc<V>,
    ) -> Result<WritePlan<V>> {
        let index = self.current_index_or_not_found()?;
        let current = &self.rows[index];
        if let Some(expected) = expected
            && expected != current.version_id
        {
            return Err(MasterError::NotFound(format!(
                "{} is not the latest version",
                self.object_id.at_version(expected)
            )));
        }

        let business_key = business_key.unwrap_or_else(|| current.business_key.clone());
        let mut plan = self.plan(stamp);
        plan.close_version(index, current)?;
        let unique_id = plan.insert_version(business_key, value, Interval::open(stamp));
        plan.returning(unique_id);
        Ok(plan)
    }

    pub fn plan_remove(&self, stamp: Instant) -> Result<WritePlan<V>> {
        let index = self.current_index_or_not_found()?;
        let mut plan = self.plan(stamp);
        plan.close_version(index, &self.rows[index])?;
        Ok(plan)
    }

    /// Retires the live correction of a version and re-states it with a new
    /// value over the same version interval.
    pub fn plan_correct(
        &self,
        stamp: Instant,
        version: Option<VersionId>,
        business_key: Option<String>,
        value: Arc<V>,
    ) -> Result<WritePlan<V>> {
        let index = match version {
            Some(version) => resolver::resolve_version_index(&self.rows, version, None).ok_or_else(|| {
                MasterError::NotFound(format!(
                    "{} has no live correction",
                    self.object_id.at_version(version)
                ))
            })?,
            None => self.current_index_or_not_found()?,
        };
        let row = &self.rows[index];

        let business_key = business_key.unwrap_or_else(|| row.business_key.clone());
        let mut plan = self.plan(stamp);
        plan.close_correction(index);
        let unique_id = plan.insert_correction(row.version_id, business_key, value, row.version);
        plan.returning(unique_id);
        Ok(plan)
    }

    fn current_index_or_not_found(&self) -> Result<usize> {
        resolver::current_index(&self.rows)
            .ok_or_else(|| MasterError::NotFound(format!("{} has no current version", self.object_id)))
    }
}

/// Mutations of one lineage, computed up front and applied in one step.
#[derive(Debug)]
pub struct WritePlan<V> {
    object_id: ObjectId,
    stamp: Instant,
    close_versions: Vec<usize>,
    close_corrections: Vec<usize>,
    inserts: Vec<Row<V>>,
    returned: Vec<UniqueId>,
    last_version: VersionId,
}

impl<V> WritePlan<V> {
    pub fn stamp(&self) -> Instant {
        self.stamp
    }

    pub fn inserts(&self) -> &[Row<V>] {
        &self.inserts
    }

    pub fn returned(&self) -> &[UniqueId] {
        &self.returned
    }

    /// True when applying the plan would change nothing.
    pub fn is_empty(&self) -> bool {
        self.close_versions.is_empty() && self.close_corrections.is_empty() && self.inserts.is_empty()
    }

    /// Ends `row`'s version interval at the plan stamp.
    pub fn close_version(&mut self, index: usize, row: &Row<V>) -> Result<()> {
        if row.version.from >= self.stamp {
            return Err(MasterError::invalid(format!(
                "{} starts at {}, after the closing instant {}",
                row.unique_id(),
                row.version.from,
                self.stamp
            )));
        }
        if !self.close_versions.contains(&index) {
            self.close_versions.push(index);
        }
        Ok(())
    }

    /// Ends a row's correction interval at the plan stamp. Correction starts
    /// are earlier stamps of the same lineage, so this cannot invert.
    pub fn close_correction(&mut self, index: usize) {
        if !self.close_corrections.contains(&index) {
            self.close_corrections.push(index);
        }
    }

    /// New row under a fresh version id, known from the plan stamp on.
    pub fn insert_version(&mut self, business_key: String, value: Arc<V>, version: Interval) -> UniqueId {
        self.last_version = self.last_version.next();
        let version_id = self.last_version;
        self.insert_correction(version_id, business_key, value, version)
    }

    /// New row re-stating an existing version id.
    pub fn insert_correction(
        &mut self,
        version_id: VersionId,
        business_key: String,
        value: Arc<V>,
        version: Interval,
    ) -> UniqueId {
        let row = Row {
            object_id: self.object_id.clone(),
            version_id,
            business_key,
            value,
            version,
            correction: Interval::open(self.stamp),
        };
        let unique_id = row.unique_id();
        self.inserts.push(row);
        unique_id
    }

    pub fn returning(&mut self, unique_id: UniqueId) {
        self.returned.push(unique_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t(minute: u32) -> Instant {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, minute, 0).unwrap()
    }

    fn added(value: &str, at: Instant) -> Lineage<String> {
        let mut lineage = Lineage::new(ObjectId::of("Test", "1"));
        let plan = lineage.plan_add(at, value.to_string(), Arc::new(value.to_string()));
        lineage.apply(plan);
        lineage
    }

    #[test]
    fn test_update_closes_version_and_increments() {
        let mut lineage = added("A", t(0));
        let plan = lineage
            .plan_update(t(5), Some(VersionId::FIRST), None, Arc::new("B".to_string()))
            .unwrap();
        let ids = lineage.apply(plan);

        assert_eq!(ids, vec![ObjectId::of("Test", "1").at_version(VersionId::new(2))]);
        assert_eq!(lineage.rows().len(), 2);
        assert_eq!(lineage.rows()[0].version.to, Some(t(5)));
        assert!(lineage.rows()[0].correction.is_open());
        assert_eq!(lineage.current().unwrap().value(), "B");
    }

    #[test]
    fn test_update_of_retired_version_is_not_found() {
        let mut lineage = added("A", t(0));
        let plan = lineage.plan_update(t(5), None, None, Arc::new("B".to_string())).unwrap();
        lineage.apply(plan);

        let err = lineage
            .plan_update(t(6), Some(VersionId::FIRST), None, Arc::new("C".to_string()))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_correct_keeps_version_id_and_interval() {
        let mut lineage = added("A", t(0));
        let plan = lineage
            .plan_correct(t(3), Some(VersionId::FIRST), None, Arc::new("A2".to_string()))
            .unwrap();
        let ids = lineage.apply(plan);

        assert_eq!(ids[0].version(), Some(VersionId::FIRST));
        assert_eq!(lineage.rows()[0].correction.to, Some(t(3)));
        assert_eq!(lineage.rows()[1].version, lineage.rows()[0].version);
        assert_eq!(lineage.resolve_version(VersionId::FIRST, None).unwrap().value(), "A2");
        assert_eq!(lineage.resolve_version(VersionId::FIRST, Some(t(1))).unwrap().value(), "A");
    }

    #[test]
    fn test_remove_leaves_no_current_row() {
        let mut lineage = added("A", t(0));
        let plan = lineage.plan_remove(t(2)).unwrap();
        lineage.apply(plan);
        assert!(lineage.current().is_none());
        assert!(lineage.plan_remove(t(3)).unwrap_err().is_not_found());
        assert_eq!(
            lineage.resolve(&VersionCorrection::of_version_as_of(t(1))).unwrap().value(),
            "A"
        );
    }

    #[test]
    fn test_stamps_strictly_increase_when_clock_stands_still() {
        let lineage = added("A", t(0));
        assert!(lineage.stamp(t(0)) > t(0));
        assert_eq!(lineage.stamp(t(1)), t(1));
    }

    #[test]
    fn test_reads_pin_latest_to_the_read_instant() {
        let mut lineage = added("A", t(0));
        let mut plan = lineage.plan(t(1));
        plan.close_correction(0);
        plan.insert_correction(
            VersionId::FIRST,
            "A".to_string(),
            Arc::new("A".to_string()),
            Interval::new(t(0), Some(t(30))).unwrap(),
        );
        plan.insert_version("B".to_string(), Arc::new("B".to_string()), Interval::open(t(30)));
        lineage.apply(plan);

        // The open row is "B", but it is not valid yet at minute 10.
        assert_eq!(lineage.current().unwrap().value(), "B");
        assert_eq!(lineage.resolve_at(&VersionCorrection::LATEST, t(10)).unwrap().value(), "A");
        assert_eq!(lineage.resolve_at(&VersionCorrection::LATEST, t(40)).unwrap().value(), "B");

        let latest = ObjectId::of("Test", "1").at_latest();
        assert_eq!(lineage.lookup(&latest, t(10)).unwrap().value(), "A");
        assert_eq!(lineage.lookup(&latest, t(31)).unwrap().value(), "B");

        // A read never sees the lineage before its last write.
        assert_eq!(lineage.read_instant(t(0)), t(1));
    }

    #[test]
    fn test_key_after_plan() {
        let lineage = added("A", t(0));
        let plan = lineage.plan_update(t(1), None, Some("B".to_string()), Arc::new("x".to_string())).unwrap();
        assert_eq!(lineage.key_after(&plan), Some("B"));

        let plan = lineage.plan_remove(t(1)).unwrap();
        assert_eq!(lineage.key_after(&plan), None);

        let plan = lineage.plan(t(1));
        assert_eq!(lineage.key_after(&plan), Some("A"));
    }
}
