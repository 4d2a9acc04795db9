use super::paging::PagingRequest;
use super::sort::SortOrder;
use crate::core::{Document, ExternalId, MasterError, ObjectId, Result, VersionCorrection};
use crate::expression::WildcardMatcher;
use crate::storage::Row;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// How a document's external ids must relate to the searched set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalIdSearchType {
    /// Same set.
    Exact,
    /// Every searched id present.
    All,
    /// At least one searched id present.
    #[default]
    Any,
    /// No searched id present.
    None,
}

impl FromStr for ExternalIdSearchType {
    type Err = MasterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "EXACT" => Ok(Self::Exact),
            "ALL" => Ok(Self::All),
            "ANY" => Ok(Self::Any),
            "NONE" => Ok(Self::None),
            _ => Err(MasterError::UnknownKind(format!("external id search type '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIdSearch {
    pub external_ids: BTreeSet<ExternalId>,
    #[serde(default)]
    pub search_type: ExternalIdSearchType,
}

impl ExternalIdSearch {
    pub fn of(search_type: ExternalIdSearchType, ids: impl IntoIterator<Item = ExternalId>) -> Self {
        Self {
            external_ids: ids.into_iter().collect(),
            search_type,
        }
    }

    /// An empty search set matches nothing, except under `None`.
    pub fn matches(&self, document_ids: &[ExternalId]) -> bool {
        if self.external_ids.is_empty() {
            return self.search_type == ExternalIdSearchType::None;
        }
        let document: BTreeSet<&ExternalId> = document_ids.iter().collect();
        match self.search_type {
            ExternalIdSearchType::Exact => {
                document.len() == self.external_ids.len()
                    && self.external_ids.iter().all(|id| document.contains(id))
            }
            ExternalIdSearchType::All => self.external_ids.iter().all(|id| document.contains(id)),
            ExternalIdSearchType::Any => self.external_ids.iter().any(|id| document.contains(id)),
            ExternalIdSearchType::None => !self.external_ids.iter().any(|id| document.contains(id)),
        }
    }
}

/// Conjunctive predicate over documents visible at one coordinate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    pub object_ids: Option<Vec<ObjectId>>,
    pub name: Option<String>,
    pub external_id_search: Option<ExternalIdSearch>,
    pub external_id_scheme: Option<String>,
    pub external_id_value: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub kind: Option<String>,
    pub version_correction: Option<VersionCorrection>,
    pub sort_order: SortOrder,
    pub paging: PagingRequest,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, pattern: impl Into<String>) -> Self {
        self.name = Some(pattern.into());
        self
    }

    pub fn object_ids(mut self, ids: impl IntoIterator<Item = ObjectId>) -> Self {
        self.object_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn external_ids(mut self, search: ExternalIdSearch) -> Self {
        self.external_id_search = Some(search);
        self
    }

    pub fn external_id_scheme(mut self, pattern: impl Into<String>) -> Self {
        self.external_id_scheme = Some(pattern.into());
        self
    }

    pub fn external_id_value(mut self, pattern: impl Into<String>) -> Self {
        self.external_id_value = Some(pattern.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), pattern.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn version_correction(mut self, vc: VersionCorrection) -> Self {
        self.version_correction = Some(vc);
        self
    }

    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = order;
        self
    }

    pub fn paging(mut self, paging: PagingRequest) -> Self {
        self.paging = paging;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let empty = |field: &str, value: &Option<String>| match value {
            Some(text) if text.is_empty() => Err(MasterError::invalid(format!("Empty {} pattern", field))),
            _ => Ok(()),
        };
        empty("name", &self.name)?;
        empty("external id scheme", &self.external_id_scheme)?;
        empty("external id value", &self.external_id_value)?;
        empty("kind", &self.kind)?;
        if self.attributes.keys().any(|key| key.is_empty()) {
            return Err(MasterError::invalid("Empty attribute key"));
        }
        Ok(())
    }

    /// Skips documents without any lookup when the id list rules them out.
    pub fn admits_object(&self, object_id: &ObjectId) -> bool {
        self.object_ids
            .as_ref()
            .is_none_or(|ids| ids.contains(object_id))
    }

    pub fn matches<V: Document>(&self, row: &Row<V>, matcher: &WildcardMatcher) -> Result<bool> {
        if !self.admits_object(&row.object_id) {
            return Ok(false);
        }
        if let Some(pattern) = &self.name
            && !matcher.matches(&row.business_key, pattern)?
        {
            return Ok(false);
        }

        let value = row.value();
        let ids = value.external_ids();
        if let Some(search) = &self.external_id_search
            && !search.matches(ids)
        {
            return Ok(false);
        }
        if let Some(pattern) = &self.external_id_scheme
            && !any_match(ids.iter().map(ExternalId::scheme), pattern, matcher)?
        {
            return Ok(false);
        }
        if let Some(pattern) = &self.external_id_value
            && !any_match(ids.iter().map(ExternalId::value), pattern, matcher)?
        {
            return Ok(false);
        }

        if !self.attributes.is_empty() {
            let Some(attributes) = value.attributes() else {
                return Ok(false);
            };
            for (key, pattern) in &self.attributes {
                match attributes.get(key) {
                    Some(actual) if matcher.matches(actual, pattern)? => {}
                    _ => return Ok(false),
                }
            }
        }

        if let Some(kind) = &self.kind
            && !value.kind().is_some_and(|actual| actual.eq_ignore_ascii_case(kind))
        {
            return Ok(false);
        }
        Ok(true)
    }
}

fn any_match<'a>(
    mut candidates: impl Iterator<Item = &'a str>,
    pattern: &str,
    matcher: &WildcardMatcher,
) -> Result<bool> {
    candidates.try_fold(false, |found, candidate| {
        Ok(found || matcher.matches(candidate, pattern)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Blob, VersionId};
    use crate::storage::Interval;
    use chrono::Utc;
    use std::sync::Arc;

    fn row(blob: Blob) -> Row<Blob> {
        let now = Utc::now();
        Row {
            object_id: ObjectId::of("Db", "1"),
            version_id: VersionId::FIRST,
            business_key: blob.name.clone().unwrap_or_default(),
            value: Arc::new(blob),
            version: Interval::open(now),
            correction: Interval::open(now),
        }
    }

    fn ticker(value: &str) -> ExternalId {
        ExternalId::of("TICKER", value)
    }

    #[test]
    fn test_external_id_search_types() {
        let doc = [ticker("A"), ticker("B")];
        let exact = ExternalIdSearch::of(ExternalIdSearchType::Exact, [ticker("A"), ticker("B")]);
        assert!(exact.matches(&doc));
        assert!(!ExternalIdSearch::of(ExternalIdSearchType::Exact, [ticker("A")]).matches(&doc));
        assert!(ExternalIdSearch::of(ExternalIdSearchType::All, [ticker("A")]).matches(&doc));
        assert!(!ExternalIdSearch::of(ExternalIdSearchType::All, [ticker("A"), ticker("C")]).matches(&doc));
        assert!(ExternalIdSearch::of(ExternalIdSearchType::Any, [ticker("C"), ticker("B")]).matches(&doc));
        assert!(ExternalIdSearch::of(ExternalIdSearchType::None, [ticker("C")]).matches(&doc));
        assert!(!ExternalIdSearch::of(ExternalIdSearchType::None, [ticker("A")]).matches(&doc));
    }

    #[test]
    fn test_empty_external_id_search() {
        let doc = [ticker("A")];
        assert!(!ExternalIdSearch::of(ExternalIdSearchType::Any, []).matches(&doc));
        assert!(!ExternalIdSearch::of(ExternalIdSearchType::Exact, []).matches(&doc));
        assert!(ExternalIdSearch::of(ExternalIdSearchType::None, []).matches(&doc));
    }

    #[test]
    fn test_predicates_are_conjunctive() {
        let matcher = WildcardMatcher::default();
        let doc = row(
            Blob::default()
                .named("TestConvention1")
                .of_kind("Swap")
                .with_external_id(ticker("ABC"))
                .with_attribute("currency", "USD"),
        );

        assert!(SearchRequest::new().matches(&doc, &matcher).unwrap());
        assert!(SearchRequest::new().name("testconv*").matches(&doc, &matcher).unwrap());
        assert!(
            SearchRequest::new()
                .name("TestConvention*")
                .external_id_value("a?c")
                .external_id_scheme("tick*")
                .attribute("currency", "us*")
                .kind("SWAP")
                .matches(&doc, &matcher)
                .unwrap()
        );
        assert!(
            !SearchRequest::new()
                .name("TestConvention*")
                .attribute("currency", "EUR")
                .matches(&doc, &matcher)
                .unwrap()
        );
        assert!(!SearchRequest::new().attribute("tenor", "*").matches(&doc, &matcher).unwrap());
        assert!(!SearchRequest::new().kind("Bond").matches(&doc, &matcher).unwrap());
    }

    #[test]
    fn test_empty_object_id_list_admits_nothing() {
        let matcher = WildcardMatcher::default();
        let doc = row(Blob::default().named("A"));
        assert!(!SearchRequest::new().object_ids([]).matches(&doc, &matcher).unwrap());
        assert!(
            SearchRequest::new()
                .object_ids([ObjectId::of("Db", "1")])
                .matches(&doc, &matcher)
                .unwrap()
        );
    }

    #[test]
    fn test_validate_rejects_empty_patterns() {
        assert!(SearchRequest::new().name("").validate().is_err());
        assert!(SearchRequest::new().attribute("", "x").validate().is_err());
        assert!(SearchRequest::new().name("A*").validate().is_ok());
    }

    #[test]
    fn test_json_shape() {
        let request: SearchRequest = serde_json::from_value(serde_json::json!({
            "name": "A*",
            "externalIdSearch": {"externalIds": ["TICKER~A"], "searchType": "ALL"},
            "sortOrder": "NAME_DESC",
            "paging": {"firstItem": 0, "pagingSize": 5}
        }))
        .unwrap();
        assert_eq!(request.name.as_deref(), Some("A*"));
        assert_eq!(request.sort_order, SortOrder::NAME_DESC);
        assert_eq!(request.paging, PagingRequest::of_index(0, 5));
        assert_eq!(
            request.external_id_search.unwrap().search_type,
            ExternalIdSearchType::All
        );
    }
}
