use super::ids::ExternalId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Payload stored by a master.
///
/// The master treats the value as opaque; the optional accessors only feed
/// search predicates and sorting.
pub trait Document: Clone + Send + Sync + 'static {
    /// Business key declared by the value itself, if any.
    fn name(&self) -> Option<&str> {
        None
    }

    fn external_ids(&self) -> &[ExternalId] {
        &[]
    }

    fn attributes(&self) -> Option<&BTreeMap<String, String>> {
        None
    }

    /// Declared type, used when sorting by kind.
    fn kind(&self) -> Option<&str> {
        None
    }
}

impl Document for String {
    fn name(&self) -> Option<&str> {
        Some(self)
    }
}

// ============================================================================
// BLOB
// ============================================================================

/// Structured JSON payload with optional searchable metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_ids: Vec<ExternalId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl Blob {
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn of_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_external_id(mut self, id: ExternalId) -> Self {
        self.external_ids.push(id);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl Document for Blob {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn external_ids(&self) -> &[ExternalId] {
        &self.external_ids
    }

    fn attributes(&self) -> Option<&BTreeMap<String, String>> {
        Some(&self.attributes)
    }

    fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }
}

// ============================================================================
// TIME SERIES
// ============================================================================

/// Dated observations keyed by external ids and qualifying attributes
/// (data source, provider, field).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    #[serde(default)]
    pub external_ids: Vec<ExternalId>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub points: BTreeMap<NaiveDate, f64>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_external_id(mut self, id: ExternalId) -> Self {
        self.external_ids.push(id);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_point(mut self, date: NaiveDate, value: f64) -> Self {
        self.points.insert(date, value);
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest_point(&self) -> Option<(NaiveDate, f64)> {
        self.points.iter().next_back().map(|(date, value)| (*date, *value))
    }
}

impl Document for TimeSeries {
    fn external_ids(&self) -> &[ExternalId] {
        &self.external_ids
    }

    fn attributes(&self) -> Option<&BTreeMap<String, String>> {
        Some(&self.attributes)
    }
}

/// Date range applied to a windowed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub include_start: bool,
    pub end: Option<NaiveDate>,
    pub include_end: bool,
    /// Positive keeps the first n points, negative the last n.
    pub max_points: Option<i32>,
}

impl DateWindow {
    pub fn all() -> Self {
        Self {
            start: None,
            include_start: true,
            end: None,
            include_end: true,
            max_points: None,
        }
    }

    /// Both ends inclusive.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::all()
        }
    }

    pub fn exclusive_start(mut self) -> Self {
        self.include_start = false;
        self
    }

    pub fn exclusive_end(mut self) -> Self {
        self.include_end = false;
        self
    }

    pub fn max_points(mut self, max_points: i32) -> Self {
        self.max_points = Some(max_points);
        self
    }

    fn admits(&self, date: &NaiveDate) -> bool {
        let after_start = match self.start {
            Some(start) if self.include_start => *date >= start,
            Some(start) => *date > start,
            None => true,
        };
        let before_end = match self.end {
            Some(end) if self.include_end => *date <= end,
            Some(end) => *date < end,
            None => true,
        };
        after_start && before_end
    }
}

/// Values that can be cut down to a date window without a new lookup.
pub trait Windowed {
    fn window(&self, window: &DateWindow) -> Self;
}

impl Windowed for TimeSeries {
    fn window(&self, window: &DateWindow) -> Self {
        let selected: Vec<(NaiveDate, f64)> = self
            .points
            .iter()
            .filter(|(date, _)| window.admits(date))
            .map(|(date, value)| (*date, *value))
            .collect();

        let kept = match window.max_points {
            None => &selected[..],
            Some(n) if n >= 0 => &selected[..selected.len().min(n as usize)],
            Some(n) => {
                let count = selected.len().min(n.unsigned_abs() as usize);
                &selected[selected.len() - count..]
            }
        };

        Self {
            external_ids: self.external_ids.clone(),
            attributes: self.attributes.clone(),
            points: kept.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn series() -> TimeSeries {
        (1..=10).fold(TimeSeries::new(), |ts, d| ts.with_point(day(d), d as f64))
    }

    #[test]
    fn test_window_bounds() {
        let ts = series();
        assert_eq!(ts.window(&DateWindow::between(day(3), day(5))).len(), 3);
        assert_eq!(ts.window(&DateWindow::between(day(3), day(5)).exclusive_start()).len(), 2);
        assert_eq!(
            ts.window(&DateWindow::between(day(3), day(5)).exclusive_start().exclusive_end()).len(),
            1
        );
        assert_eq!(ts.window(&DateWindow::all()), ts);
    }

    #[test]
    fn test_window_max_points_takes_head_or_tail() {
        let ts = series();
        let head = ts.window(&DateWindow::all().max_points(2));
        assert_eq!(head.points.keys().copied().collect::<Vec<_>>(), vec![day(1), day(2)]);

        let tail = ts.window(&DateWindow::all().max_points(-2));
        assert_eq!(tail.points.keys().copied().collect::<Vec<_>>(), vec![day(9), day(10)]);

        assert!(ts.window(&DateWindow::all().max_points(0)).is_empty());
        assert_eq!(ts.window(&DateWindow::all().max_points(-50)).len(), 10);
    }

    #[test]
    fn test_latest_point() {
        assert_eq!(series().latest_point(), Some((day(10), 10.0)));
        assert_eq!(TimeSeries::new().latest_point(), None);
    }

    #[test]
    fn test_string_is_its_own_name() {
        let value = "EUR-OIS".to_string();
        assert_eq!(value.name(), Some("EUR-OIS"));
        assert!(value.external_ids().is_empty());
    }
}
