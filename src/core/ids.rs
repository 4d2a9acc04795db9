use super::error::{MasterError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

const SEPARATOR: char = '~';

// ============================================================================
// OBJECT ID
// ============================================================================

/// Identifies one lineage across all time. Never reused, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId {
    scheme: String,
    value: String,
}

impl ObjectId {
    pub fn of(scheme: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            value: value.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn at_latest(&self) -> UniqueId {
        UniqueId::latest(self.clone())
    }

    pub fn at_version(&self, version: VersionId) -> UniqueId {
        UniqueId::versioned(self.clone(), version)
    }
}

impl Ord for ObjectId {
    // Numeric values first, in numeric order so "10" sorts after "9";
    // everything else after them, by text.
    fn cmp(&self, other: &Self) -> Ordering {
        let numeric = |id: &Self| id.value.parse::<u64>().ok();
        self.scheme
            .cmp(&other.scheme)
            .then_with(|| match (numeric(self), numeric(other)) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.scheme, SEPARATOR, self.value)
    }
}

impl FromStr for ObjectId {
    type Err = MasterError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        match parts.as_slice() {
            [scheme, value] if !scheme.is_empty() && !value.is_empty() => {
                Ok(Self::of(*scheme, *value))
            }
            _ => Err(MasterError::invalid(format!("Malformed object id '{}'", s))),
        }
    }
}

// ============================================================================
// VERSION ID
// ============================================================================

/// One version within a lineage. Strictly increasing per object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(u64);

impl VersionId {
    pub const FIRST: VersionId = VersionId(1);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// UNIQUE ID
// ============================================================================

/// An object id pinned to a version, or to whatever version is latest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniqueId {
    object_id: ObjectId,
    version: Option<VersionId>,
}

impl UniqueId {
    pub fn latest(object_id: ObjectId) -> Self {
        Self {
            object_id,
            version: None,
        }
    }

    pub fn versioned(object_id: ObjectId, version: VersionId) -> Self {
        Self {
            object_id,
            version: Some(version),
        }
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    pub fn version(&self) -> Option<VersionId> {
        self.version
    }

    pub fn is_latest(&self) -> bool {
        self.version.is_none()
    }

    pub fn to_latest(&self) -> Self {
        Self::latest(self.object_id.clone())
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "{}{}{}", self.object_id, SEPARATOR, version),
            None => write!(f, "{}", self.object_id),
        }
    }
}

impl FromStr for UniqueId {
    type Err = MasterError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || MasterError::invalid(format!("Malformed unique id '{}'", s));
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        match parts.as_slice() {
            [scheme, value] if !scheme.is_empty() && !value.is_empty() => {
                Ok(Self::latest(ObjectId::of(*scheme, *value)))
            }
            [scheme, value, version] if !scheme.is_empty() && !value.is_empty() => {
                let version = version.parse::<u64>().map_err(|_| malformed())?;
                Ok(Self::versioned(
                    ObjectId::of(*scheme, *value),
                    VersionId::new(version),
                ))
            }
            _ => Err(malformed()),
        }
    }
}

// ============================================================================
// EXTERNAL ID
// ============================================================================

/// Identifier assigned by an outside system, e.g. a ticker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalId {
    scheme: String,
    value: String,
}

impl ExternalId {
    pub fn of(scheme: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            value: value.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.scheme, SEPARATOR, self.value)
    }
}

impl FromStr for ExternalId {
    type Err = MasterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(SEPARATOR) {
            Some((scheme, value)) if !scheme.is_empty() && !value.is_empty() => {
                Ok(Self::of(scheme, value))
            }
            _ => Err(MasterError::invalid(format!("Malformed external id '{}'", s))),
        }
    }
}

macro_rules! string_serde {
    ($($ty:ty),*) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }

            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                    let text = String::deserialize(deserializer)?;
                    text.parse().map_err(serde::de::Error::custom)
                }
            }
        )*
    };
}

string_serde!(ObjectId, UniqueId, ExternalId);

// ============================================================================
// ALLOCATION
// ============================================================================

/// How new object ids are minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdStrategy {
    #[default]
    Sequential,
    Uuid,
}

impl IdStrategy {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Uuid => "uuid",
        }
    }
}

impl FromStr for IdStrategy {
    type Err = MasterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "uuid" => Ok(Self::Uuid),
            other => Err(MasterError::UnknownKind(format!("id strategy '{}'", other))),
        }
    }
}

/// Issues object ids for one master.
#[derive(Debug)]
pub struct IdAllocator {
    scheme: String,
    strategy: IdStrategy,
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new(scheme: impl Into<String>, strategy: IdStrategy) -> Self {
        Self {
            scheme: scheme.into(),
            strategy,
            next: AtomicU64::new(1),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn next_object_id(&self) -> ObjectId {
        let value = match self.strategy {
            IdStrategy::Sequential => self.next.fetch_add(1, AtomicOrdering::SeqCst).to_string(),
            IdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
        };
        ObjectId::of(self.scheme.clone(), value)
    }
}
