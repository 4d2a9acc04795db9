use crate::core::{Blob, Instant, MasterError, Result, UniqueId, VersionCorrection, VersionId};
use crate::master::Replacement;
use crate::query::PagingRequest;
use crate::storage::Row;
use serde::{Deserialize, Serialize};

/// Wire form of one stored row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub unique_id: UniqueId,
    pub version_id: VersionId,
    pub business_key: String,
    pub version_from: Instant,
    pub version_to: Option<Instant>,
    pub correction_from: Instant,
    pub correction_to: Option<Instant>,
    pub document: Blob,
}

impl From<Row<Blob>> for RowView {
    fn from(row: Row<Blob>) -> Self {
        Self {
            unique_id: row.unique_id(),
            version_id: row.version_id,
            version_from: row.version.from,
            version_to: row.version.to,
            correction_from: row.correction.from,
            correction_to: row.correction.to,
            document: Blob::clone(&row.value),
            business_key: row.business_key,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequest {
    pub document: Blob,
    #[serde(default)]
    pub business_key: Option<String>,
}

impl AddRequest {
    /// Explicit key, else the document's own name.
    pub fn into_parts(self) -> Result<(Blob, String)> {
        let key = self
            .business_key
            .or_else(|| self.document.name.clone())
            .ok_or_else(|| MasterError::invalid("A business key or document name is required"))?;
        Ok((self.document, key))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacementBody {
    pub document: Blob,
    #[serde(default)]
    pub business_key: Option<String>,
    #[serde(default)]
    pub version_from: Option<Instant>,
    #[serde(default)]
    pub version_to: Option<Instant>,
}

impl From<ReplacementBody> for Replacement<Blob> {
    fn from(body: ReplacementBody) -> Self {
        Replacement {
            value: body.document,
            business_key: body.business_key,
            version_from: body.version_from,
            version_to: body.version_to,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueIdBody {
    pub unique_id: UniqueId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueIdsBody {
    pub unique_ids: Vec<UniqueId>,
}

/// `versionAsOf` / `correctedTo` query parameters, each an instant or `LATEST`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCorrectionQuery {
    pub version_as_of: Option<String>,
    pub corrected_to: Option<String>,
}

impl VersionCorrectionQuery {
    /// `None` when neither bound was given.
    pub fn resolve(&self) -> Result<Option<VersionCorrection>> {
        if self.version_as_of.is_none() && self.corrected_to.is_none() {
            return Ok(None);
        }
        VersionCorrection::parse_bounds(self.version_as_of.as_deref(), self.corrected_to.as_deref()).map(Some)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub versions_from: Option<Instant>,
    pub versions_to: Option<Instant>,
    pub corrections_from: Option<Instant>,
    pub corrections_to: Option<Instant>,
    pub first_item: Option<usize>,
    pub paging_size: Option<usize>,
}

impl HistoryQuery {
    pub fn paging(&self) -> PagingRequest {
        match (self.first_item, self.paging_size) {
            (None, None) => PagingRequest::ALL,
            (first, size) => PagingRequest::of_index(first.unwrap_or(0), size.unwrap_or(usize::MAX)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_request_key_falls_back_to_name() {
        let request = AddRequest {
            document: Blob::new(serde_json::json!({})).named("EUR-OIS"),
            business_key: None,
        };
        assert_eq!(request.into_parts().unwrap().1, "EUR-OIS");

        let unnamed = AddRequest {
            document: Blob::default(),
            business_key: None,
        };
        assert!(unnamed.into_parts().is_err());
    }

    #[test]
    fn test_version_correction_query() {
        assert_eq!(VersionCorrectionQuery::default().resolve().unwrap(), None);

        let query = VersionCorrectionQuery {
            version_as_of: Some("2024-01-01T00:00:00Z".to_string()),
            corrected_to: Some("LATEST".to_string()),
        };
        let vc = query.resolve().unwrap().unwrap();
        assert!(vc.version_as_of().is_some());
        assert!(vc.corrected_to().is_none());

        let malformed = VersionCorrectionQuery {
            version_as_of: Some("yesterday".to_string()),
            corrected_to: None,
        };
        assert!(malformed.resolve().is_err());
    }
}
