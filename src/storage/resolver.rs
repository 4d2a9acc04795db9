// ============================================================================
// Bitemporal resolution
// ============================================================================
//
// Every lookup that selects rows by version time and correction time goes
// through this module. A coordinate matches a row when the row's version
// interval contains `versionAsOf` and its correction interval contains
// `correctedTo`. Reads pin LATEST to the instant they run at before they get
// here; a LATEST that reaches this module matches only open intervals, which
// is how writes find the row they supersede.
//
// Resolution is a pure function of the rows and the coordinate. Ties cannot
// occur while the lineage invariants hold; if they do, the choice is still
// deterministic and the anomaly is logged.
//
// ============================================================================

use super::row::Row;
use crate::core::{Instant, VersionCorrection, VersionId};
use tracing::{Level, event};

/// Index of the single row visible at `vc`.
pub fn resolve_index<V>(rows: &[Row<V>], vc: &VersionCorrection) -> Option<usize> {
    pick(rows, |row| {
        row.version.contains(vc.version_as_of()) && row.correction.contains(vc.corrected_to())
    })
}

pub fn resolve<'a, V>(rows: &'a [Row<V>], vc: &VersionCorrection) -> Option<&'a Row<V>> {
    resolve_index(rows, vc).map(|index| &rows[index])
}

/// Index of the row for a pinned version, resolved on the correction axis only.
pub fn resolve_version_index<V>(
    rows: &[Row<V>],
    version: VersionId,
    corrected_to: Option<Instant>,
) -> Option<usize> {
    pick(rows, |row| {
        row.version_id == version && row.correction.contains(corrected_to)
    })
}

/// Index of the row open on both axes.
pub fn current_index<V>(rows: &[Row<V>]) -> Option<usize> {
    resolve_index(rows, &VersionCorrection::LATEST)
}

fn pick<V>(rows: &[Row<V>], matches: impl Fn(&Row<V>) -> bool) -> Option<usize> {
    let mut found: Option<usize> = None;
    for (index, row) in rows.iter().enumerate() {
        if !matches(row) {
            continue;
        }
        found = match found {
            None => Some(index),
            Some(previous) => {
                event!(
                    Level::ERROR,
                    object_id = %row.object_id,
                    first = %rows[previous].unique_id(),
                    second = %row.unique_id(),
                    "ambiguous bitemporal resolution"
                );
                // Prefer the most recent knowledge, then the latest version.
                let prev = &rows[previous];
                if (row.correction.from, row.version.from) > (prev.correction.from, prev.version.from) {
                    Some(index)
                } else {
                    Some(previous)
                }
            }
        };
    }
    found
}
