use super::error::{MasterError, Result};
use super::time::{Instant, format_instant, parse_instant};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const LATEST_TEXT: &str = "LATEST";

/// Read coordinate on the version and correction axes.
///
/// `None` on an axis means LATEST. A read pins LATEST to the instant it
/// runs at, see [`VersionCorrection::with_latest_fixed`]. Never stored,
/// only used to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCorrection {
    #[serde(with = "latest_or_instant", default)]
    version_as_of: Option<Instant>,
    #[serde(with = "latest_or_instant", default)]
    corrected_to: Option<Instant>,
}

impl VersionCorrection {
    pub const LATEST: VersionCorrection = VersionCorrection {
        version_as_of: None,
        corrected_to: None,
    };

    pub fn of(version_as_of: Option<Instant>, corrected_to: Option<Instant>) -> Self {
        Self {
            version_as_of,
            corrected_to,
        }
    }

    pub fn of_version_as_of(instant: Instant) -> Self {
        Self::of(Some(instant), None)
    }

    pub fn of_corrected_to(instant: Instant) -> Self {
        Self::of(None, Some(instant))
    }

    pub fn version_as_of(&self) -> Option<Instant> {
        self.version_as_of
    }

    pub fn corrected_to(&self) -> Option<Instant> {
        self.corrected_to
    }

    pub fn is_latest(&self) -> bool {
        self.version_as_of.is_none() && self.corrected_to.is_none()
    }

    pub fn with_version_as_of(self, instant: Instant) -> Self {
        Self {
            version_as_of: Some(instant),
            ..self
        }
    }

    pub fn with_corrected_to(self, instant: Instant) -> Self {
        Self {
            corrected_to: Some(instant),
            ..self
        }
    }

    /// Replaces LATEST on either axis with `now`.
    pub fn with_latest_fixed(self, now: Instant) -> Self {
        Self {
            version_as_of: Some(self.version_as_of.unwrap_or(now)),
            corrected_to: Some(self.corrected_to.unwrap_or(now)),
        }
    }

    /// Builds a coordinate from two textual bounds, each an ISO-8601
    /// instant or `LATEST`. Absent bounds mean LATEST.
    pub fn parse_bounds(version_as_of: Option<&str>, corrected_to: Option<&str>) -> Result<Self> {
        Ok(Self::of(
            version_as_of.map(parse_bound).transpose()?.flatten(),
            corrected_to.map(parse_bound).transpose()?.flatten(),
        ))
    }
}

fn parse_bound(text: &str) -> Result<Option<Instant>> {
    if text.eq_ignore_ascii_case(LATEST_TEXT) {
        return Ok(None);
    }
    parse_instant(text)
        .map(Some)
        .ok_or_else(|| MasterError::invalid(format!("Malformed instant '{}'", text)))
}

fn format_bound(bound: &Option<Instant>) -> String {
    match bound {
        Some(instant) => format_instant(instant),
        None => LATEST_TEXT.to_string(),
    }
}

impl fmt::Display for VersionCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "V{}.C{}",
            format_bound(&self.version_as_of),
            format_bound(&self.corrected_to)
        )
    }
}

impl FromStr for VersionCorrection {
    type Err = MasterError;

    /// Parses the compact `V<bound>.C<bound>` form.
    fn from_str(s: &str) -> Result<Self> {
        let malformed = || MasterError::invalid(format!("Malformed version-correction '{}'", s));
        let rest = s.strip_prefix('V').ok_or_else(malformed)?;
        let (version, correction) = rest.split_once(".C").ok_or_else(malformed)?;
        Ok(Self::of(parse_bound(version)?, parse_bound(correction)?))
    }
}

mod latest_or_instant {
    use super::*;

    pub fn serialize<S: Serializer>(
        bound: &Option<Instant>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_bound(bound))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<Instant>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        match text {
            Some(text) => parse_bound(&text).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
