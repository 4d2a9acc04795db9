// ============================================================================
// src/query/sort.rs - Result ordering for search
// ============================================================================
//
// Orders resolved rows by one field and direction, then by object id
// ascending so that every ordering is total. Rows with no declared kind
// follow the null rule: last when ascending, first when descending.
//
// ============================================================================

use crate::core::{Document, MasterError, Result};
use crate::storage::Row;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// NULL HANDLING STRATEGY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullOrdering {
    NullsFirst,
    NullsLast,
}

impl NullOrdering {
    pub fn default_for_direction(descending: bool) -> Self {
        if descending {
            Self::NullsFirst
        } else {
            Self::NullsLast
        }
    }
}

// ============================================================================
// SORT ORDER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    ObjectId,
    VersionFromInstant,
    Name,
    Kind,
}

impl SortField {
    fn name(self) -> &'static str {
        match self {
            Self::ObjectId => "OBJECT_ID",
            Self::VersionFromInstant => "VERSION_FROM_INSTANT",
            Self::Name => "NAME",
            Self::Kind => "KIND",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortOrder {
    pub field: SortField,
    pub descending: bool,
}

impl SortOrder {
    pub const OBJECT_ID_ASC: SortOrder = SortOrder::asc(SortField::ObjectId);
    pub const OBJECT_ID_DESC: SortOrder = SortOrder::desc(SortField::ObjectId);
    pub const VERSION_FROM_INSTANT_ASC: SortOrder = SortOrder::asc(SortField::VersionFromInstant);
    pub const VERSION_FROM_INSTANT_DESC: SortOrder = SortOrder::desc(SortField::VersionFromInstant);
    pub const NAME_ASC: SortOrder = SortOrder::asc(SortField::Name);
    pub const NAME_DESC: SortOrder = SortOrder::desc(SortField::Name);
    pub const KIND_ASC: SortOrder = SortOrder::asc(SortField::Kind);
    pub const KIND_DESC: SortOrder = SortOrder::desc(SortField::Kind);

    pub const fn asc(field: SortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub const fn desc(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    pub fn compare<V: Document>(&self, a: &Row<V>, b: &Row<V>) -> Ordering {
        let primary = match self.field {
            SortField::ObjectId => a.object_id.cmp(&b.object_id),
            SortField::VersionFromInstant => a.version.from.cmp(&b.version.from),
            SortField::Name => a.business_key.cmp(&b.business_key),
            SortField::Kind => {
                return compare_nullable(a.value.kind(), b.value.kind(), self.descending)
                    .then_with(|| a.object_id.cmp(&b.object_id));
            }
        };
        let primary = if self.descending { primary.reverse() } else { primary };
        primary.then_with(|| a.object_id.cmp(&b.object_id))
    }

    /// Stable sort, so equal rows keep their object id order.
    pub fn sort<V: Document>(&self, rows: &mut [Row<V>]) {
        rows.sort_by(|a, b| self.compare(a, b));
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::OBJECT_ID_ASC
    }
}

fn compare_nullable(a: Option<&str>, b: Option<&str>, descending: bool) -> Ordering {
    let nulls = NullOrdering::default_for_direction(descending);
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => match nulls {
            NullOrdering::NullsFirst => Ordering::Less,
            NullOrdering::NullsLast => Ordering::Greater,
        },
        (Some(_), None) => match nulls {
            NullOrdering::NullsFirst => Ordering::Greater,
            NullOrdering::NullsLast => Ordering::Less,
        },
        (Some(a), Some(b)) => {
            let ord = a.to_lowercase().cmp(&b.to_lowercase());
            if descending { ord.reverse() } else { ord }
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.descending { "DESC" } else { "ASC" };
        write!(f, "{}_{}", self.field.name(), direction)
    }
}

impl FromStr for SortOrder {
    type Err = MasterError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.to_ascii_uppercase();
        let (field, direction) = upper
            .rsplit_once('_')
            .ok_or_else(|| MasterError::UnknownKind(format!("sort order '{}'", s)))?;
        let field = match field {
            "OBJECT_ID" => SortField::ObjectId,
            "VERSION_FROM_INSTANT" => SortField::VersionFromInstant,
            "NAME" => SortField::Name,
            "KIND" => SortField::Kind,
            _ => return Err(MasterError::UnknownKind(format!("sort order '{}'", s))),
        };
        match direction {
            "ASC" => Ok(Self::asc(field)),
            "DESC" => Ok(Self::desc(field)),
            _ => Err(MasterError::UnknownKind(format!("sort order '{}'", s))),
        }
    }
}

impl Serialize for SortOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SortOrder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
