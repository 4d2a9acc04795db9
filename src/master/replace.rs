//! Bulk rewrites of a lineage's version axis.
//!
//! Each operation retires the live corrections it touches and writes the
//! replacement rows in one plan, so readers at an earlier `correctedTo`
//! still see the axis as it was.

use super::{ChangeType, Master};
use crate::core::{Document, Instant, MasterError, ObjectId, Result, UniqueId};
use crate::storage::{Interval, Lineage, WritePlan};
use std::sync::Arc;

/// One document destined for a span of the version axis.
#[derive(Debug, Clone)]
pub struct Replacement<V> {
    pub value: V,
    pub business_key: Option<String>,
    pub version_from: Option<Instant>,
    pub version_to: Option<Instant>,
}

impl<V: Document> Replacement<V> {
    pub fn new(value: V) -> Self {
        Self {
            value,
            business_key: None,
            version_from: None,
            version_to: None,
        }
    }

    pub fn named(mut self, business_key: impl Into<String>) -> Self {
        self.business_key = Some(business_key.into());
        self
    }

    pub fn valid_from(mut self, instant: Instant) -> Self {
        self.version_from = Some(instant);
        self
    }

    pub fn valid_to(mut self, instant: Instant) -> Self {
        self.version_to = Some(instant);
        self
    }
}

/// A replacement with its final key and version interval.
struct Placed<V> {
    business_key: String,
    value: Arc<V>,
    version: Interval,
}

/// Sorts by `version_from` and chains each interval to the next one's
/// start. The last interval ends at its own `version_to`, else `span_end`.
fn place<V: Document>(
    replacements: Vec<Replacement<V>>,
    default_from: Option<Instant>,
    span_end: Option<Instant>,
    fallback_key: &str,
) -> Result<Vec<Placed<V>>> {
    let mut dated = replacements
        .into_iter()
        .map(|replacement| {
            let from = replacement
                .version_from
                .or(default_from)
                .ok_or_else(|| MasterError::invalid("Each replacement must state its version_from"))?;
            Ok((from, replacement))
        })
        .collect::<Result<Vec<_>>>()?;
    dated.sort_by_key(|(from, _)| *from);

    if dated.windows(2).any(|pair| pair[0].0 == pair[1].0) {
        return Err(MasterError::invalid("Replacements must have distinct version_from instants"));
    }

    let starts: Vec<Instant> = dated.iter().map(|(from, _)| *from).collect();
    dated
        .into_iter()
        .enumerate()
        .map(|(index, (from, replacement))| {
            let to = match starts.get(index + 1) {
                Some(next) => Some(*next),
                None => replacement.version_to.or(span_end),
            };
            let business_key = replacement
                .business_key
                .or_else(|| replacement.value.name().map(str::to_string))
                .unwrap_or_else(|| fallback_key.to_string());
            Ok(Placed {
                business_key,
                value: Arc::new(replacement.value),
                version: Interval::new(from, to)?,
            })
        })
        .collect()
}

fn insert_all<V>(plan: &mut WritePlan<V>, placed: Vec<Placed<V>>) {
    for row in placed {
        let unique_id = plan.insert_version(row.business_key, row.value, row.version);
        plan.returning(unique_id);
    }
}

fn fallback_key<V>(lineage: &Lineage<V>) -> String {
    lineage.last_business_key().unwrap_or_default().to_string()
}

impl<V: Document> Master<V> {
    /// Replaces one version with `replacements`, which must tile exactly the
    /// version range of the row being replaced. An empty list removes the
    /// version and stretches its predecessor over the gap.
    pub async fn replace_version(
        &self,
        unique_id: &UniqueId,
        replacements: Vec<Replacement<V>>,
    ) -> Result<Vec<UniqueId>> {
        let target = unique_id.clone();
        self.mutate(unique_id.object_id(), "replace_version", move |lineage, stamp| {
            let index = lineage
                .locate(&target)
                .ok_or_else(|| MasterError::not_found(&target))?;
            let stored = &lineage.rows()[index];
            let mut plan = lineage.plan(stamp);
            plan.close_correction(index);

            if replacements.is_empty() {
                let previous = lineage
                    .live()
                    .find(|&i| lineage.rows()[i].version.to == Some(stored.version.from));
                return match previous {
                    Some(previous) => {
                        let row = &lineage.rows()[previous];
                        plan.close_correction(previous);
                        plan.insert_correction(
                            row.version_id,
                            row.business_key.clone(),
                            row.value.clone(),
                            Interval::new(row.version.from, stored.version.to)?,
                        );
                        Ok((plan, ChangeType::Changed))
                    }
                    None => Ok((plan, ChangeType::Removed)),
                };
            }

            let placed = place(
                replacements,
                Some(stored.version.from),
                stored.version.to,
                &stored.business_key,
            )?;
            let first = placed.first().map(|row| row.version.from);
            let last = placed.last().and_then(|row| row.version.to);
            if first != Some(stored.version.from) || last != stored.version.to {
                return Err(MasterError::invalid(
                    "The versions must exactly match the version range of the version being replaced",
                ));
            }
            insert_all(&mut plan, placed);
            Ok((plan, ChangeType::Changed))
        })
        .await
    }

    /// Removes one version; its predecessor, if any, covers the gap.
    pub async fn remove_version(&self, unique_id: &UniqueId) -> Result<()> {
        self.replace_version(unique_id, Vec::new()).await.map(|_| ())
    }

    /// Overwrites the span from the earliest replacement's start to the
    /// latest one's end. Versions overlapping the span are trimmed to its
    /// edges rather than dropped.
    pub async fn replace_versions(
        &self,
        object_id: &ObjectId,
        replacements: Vec<Replacement<V>>,
    ) -> Result<Vec<UniqueId>> {
        if replacements.is_empty() {
            return Ok(Vec::new());
        }
        self.mutate(object_id, "replace_versions", move |lineage, stamp| {
            let placed = place(replacements, None, None, &fallback_key(lineage))?;
            let (Some(first), Some(last)) = (placed.first(), placed.last()) else {
                return Ok((lineage.plan(stamp), ChangeType::Changed));
            };
            let lowest = first.version.from;
            let highest = last.version.to;

            let overlapped: Vec<usize> = lineage
                .live()
                .filter(|&i| {
                    let version = &lineage.rows()[i].version;
                    highest.is_none_or(|highest| version.from < highest)
                        && version.to.is_none_or(|to| to > lowest)
                })
                .collect();

            let mut plan = lineage.plan(stamp);
            for &index in &overlapped {
                plan.close_correction(index);
            }

            let rows = lineage.rows();
            let earliest = overlapped.iter().map(|&i| &rows[i]).min_by_key(|row| row.version.from);
            let latest = overlapped.iter().map(|&i| &rows[i]).max_by_key(|row| row.version.from);

            if let Some(head) = earliest
                && head.version.from < lowest
            {
                plan.insert_correction(
                    head.version_id,
                    head.business_key.clone(),
                    head.value.clone(),
                    Interval::new(head.version.from, Some(lowest))?,
                );
            }

            insert_all(&mut plan, placed);

            if let (Some(tail), Some(highest)) = (latest, highest)
                && tail.version.to.is_none_or(|to| to > highest)
            {
                plan.insert_version(
                    tail.business_key.clone(),
                    tail.value.clone(),
                    Interval::new(highest, tail.version.to)?,
                );
            }
            Ok((plan, ChangeType::Changed))
        })
        .await
    }

    /// Discards every live version and writes `replacements` in their place.
    /// An empty list leaves the object with no visible versions.
    pub async fn replace_all_versions(
        &self,
        object_id: &ObjectId,
        replacements: Vec<Replacement<V>>,
    ) -> Result<Vec<UniqueId>> {
        self.mutate(object_id, "replace_all_versions", move |lineage, stamp| {
            let placed = place(replacements, None, None, &fallback_key(lineage))?;
            let mut plan = lineage.plan(stamp);
            let live: Vec<usize> = lineage.live().collect();
            for index in live {
                plan.close_correction(index);
            }
            if placed.is_empty() {
                return Ok((plan, ChangeType::Removed));
            }
            insert_all(&mut plan, placed);
            Ok((plan, ChangeType::Changed))
        })
        .await
    }

    /// Inserts one dated version, trimming whatever it overlaps.
    pub async fn add_version(&self, object_id: &ObjectId, replacement: Replacement<V>) -> Result<Option<UniqueId>> {
        let ids = self.replace_versions(object_id, vec![replacement]).await?;
        Ok(ids.into_iter().next())
    }
}
