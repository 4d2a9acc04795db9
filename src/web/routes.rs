use super::{Result, WebError};
use super::dto::{
    AddRequest, HistoryQuery, ReplacementBody, RowView, UniqueIdBody, UniqueIdsBody, VersionCorrectionQuery,
};
use crate::core::{Blob, MasterError, ObjectId, UniqueId, VersionCorrection};
use crate::master::{Master, Replacement};
use crate::query::{HistoryRequest, Page, SearchRequest};
use crate::registry::MasterRegistry;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

type Registry = State<Arc<MasterRegistry>>;

/// Routes, all scoped by document type:
/// - `POST /:kind` add
/// - `POST /:kind/add-or-update`
/// - `POST /:kind/search`
/// - `POST /:kind/batch` batched get
/// - `GET|PUT /:kind/default-version-correction`
/// - `GET|DELETE /:kind/objects/:objectId` get at a coordinate, remove
/// - `GET /:kind/objects/:objectId/history`
/// - `POST|PUT /:kind/objects/:objectId/versions` add one, replace a span
/// - `PUT /:kind/objects/:objectId/all-versions`
/// - `GET|PUT|DELETE /:kind/documents/:uniqueId` get, update, remove version
/// - `POST /:kind/documents/:uniqueId/corrections`
/// - `PUT /:kind/documents/:uniqueId/replacement`
pub fn router(registry: Arc<MasterRegistry>) -> Router {
    Router::new()
        .route("/:kind", post(add))
        .route("/:kind/add-or-update", post(add_or_update))
        .route("/:kind/search", post(search))
        .route("/:kind/batch", post(get_many))
        .route(
            "/:kind/default-version-correction",
            get(default_version_correction).put(set_default_version_correction),
        )
        .route("/:kind/objects/:object_id", get(get_at).delete(remove))
        .route("/:kind/objects/:object_id/history", get(history))
        .route(
            "/:kind/objects/:object_id/versions",
            post(add_version).put(replace_versions),
        )
        .route("/:kind/objects/:object_id/all-versions", put(replace_all_versions))
        .route(
            "/:kind/documents/:unique_id",
            get(get_document).put(update).delete(remove_version),
        )
        .route("/:kind/documents/:unique_id/corrections", post(correct))
        .route("/:kind/documents/:unique_id/replacement", put(replace_version))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

fn master<'a>(registry: &'a MasterRegistry, kind: &str) -> Result<&'a Arc<Master<Blob>>> {
    Ok(registry.get(kind)?)
}

fn parse_object_id(text: &str) -> Result<ObjectId> {
    text.parse().map_err(|err: MasterError| WebError::Input(err.to_string()))
}

fn parse_unique_id(text: &str) -> Result<UniqueId> {
    text.parse().map_err(|err: MasterError| WebError::Input(err.to_string()))
}

fn replacements(bodies: Vec<ReplacementBody>) -> Vec<Replacement<Blob>> {
    bodies.into_iter().map(Replacement::from).collect()
}

async fn add(
    State(registry): Registry,
    Path(kind): Path<String>,
    Json(request): Json<AddRequest>,
) -> Result<(StatusCode, Json<UniqueIdBody>)> {
    let master = master(&registry, &kind)?;
    let (document, business_key) = request.into_parts()?;
    let unique_id = master.add(document, business_key).await?;
    Ok((StatusCode::CREATED, Json(UniqueIdBody { unique_id })))
}

async fn add_or_update(
    State(registry): Registry,
    Path(kind): Path<String>,
    Json(request): Json<AddRequest>,
) -> Result<Json<UniqueIdBody>> {
    let master = master(&registry, &kind)?;
    let (document, business_key) = request.into_parts()?;
    let unique_id = master.add_or_update(document, business_key).await?;
    Ok(Json(UniqueIdBody { unique_id }))
}

async fn search(
    State(registry): Registry,
    Path(kind): Path<String>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Page<RowView>>> {
    let page = master(&registry, &kind)?.search(&request).await?;
    Ok(Json(page.map(RowView::from)))
}

async fn get_many(
    State(registry): Registry,
    Path(kind): Path<String>,
    Json(request): Json<UniqueIdsBody>,
) -> Result<Json<BTreeMap<UniqueId, RowView>>> {
    let found = master(&registry, &kind)?.get_many(&request.unique_ids).await?;
    Ok(Json(
        found.into_iter().map(|(unique_id, row)| (unique_id, RowView::from(row))).collect(),
    ))
}

async fn default_version_correction(
    State(registry): Registry,
    Path(kind): Path<String>,
) -> Result<Json<VersionCorrection>> {
    Ok(Json(master(&registry, &kind)?.default_version_correction()))
}

async fn set_default_version_correction(
    State(registry): Registry,
    Path(kind): Path<String>,
    Json(vc): Json<VersionCorrection>,
) -> Result<StatusCode> {
    master(&registry, &kind)?.set_default_version_correction(vc);
    Ok(StatusCode::NO_CONTENT)
}

async fn get_at(
    State(registry): Registry,
    Path((kind, object_id)): Path<(String, String)>,
    Query(query): Query<VersionCorrectionQuery>,
) -> Result<Json<RowView>> {
    let master = master(&registry, &kind)?;
    let object_id = parse_object_id(&object_id)?;
    let row = match query.resolve()? {
        Some(vc) => master.get_at(&object_id, vc).await?,
        None => master.get_object(&object_id).await?,
    };
    Ok(Json(row.into()))
}

async fn remove(
    State(registry): Registry,
    Path((kind, object_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let object_id = parse_object_id(&object_id)?;
    master(&registry, &kind)?.remove(&object_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn history(
    State(registry): Registry,
    Path((kind, object_id)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Page<RowView>>> {
    let request = HistoryRequest::new(parse_object_id(&object_id)?)
        .versions(query.versions_from, query.versions_to)
        .corrections(query.corrections_from, query.corrections_to)
        .paging(query.paging());
    let page = master(&registry, &kind)?.history(&request).await?;
    Ok(Json(page.map(RowView::from)))
}

async fn add_version(
    State(registry): Registry,
    Path((kind, object_id)): Path<(String, String)>,
    Json(body): Json<ReplacementBody>,
) -> Result<Json<Option<UniqueIdBody>>> {
    let object_id = parse_object_id(&object_id)?;
    let added = master(&registry, &kind)?
        .add_version(&object_id, body.into())
        .await?;
    Ok(Json(added.map(|unique_id| UniqueIdBody { unique_id })))
}

async fn replace_versions(
    State(registry): Registry,
    Path((kind, object_id)): Path<(String, String)>,
    Json(bodies): Json<Vec<ReplacementBody>>,
) -> Result<Json<Vec<UniqueId>>> {
    let object_id = parse_object_id(&object_id)?;
    let ids = master(&registry, &kind)?
        .replace_versions(&object_id, replacements(bodies))
        .await?;
    Ok(Json(ids))
}

async fn replace_all_versions(
    State(registry): Registry,
    Path((kind, object_id)): Path<(String, String)>,
    Json(bodies): Json<Vec<ReplacementBody>>,
) -> Result<Json<Vec<UniqueId>>> {
    let object_id = parse_object_id(&object_id)?;
    let ids = master(&registry, &kind)?
        .replace_all_versions(&object_id, replacements(bodies))
        .await?;
    Ok(Json(ids))
}

async fn get_document(
    State(registry): Registry,
    Path((kind, unique_id)): Path<(String, String)>,
) -> Result<Json<RowView>> {
    let unique_id = parse_unique_id(&unique_id)?;
    let row = master(&registry, &kind)?.get(&unique_id).await?;
    Ok(Json(row.into()))
}

async fn update(
    State(registry): Registry,
    Path((kind, unique_id)): Path<(String, String)>,
    Json(document): Json<Blob>,
) -> Result<Json<UniqueIdBody>> {
    let unique_id = parse_unique_id(&unique_id)?;
    let unique_id = master(&registry, &kind)?.update(&unique_id, document).await?;
    Ok(Json(UniqueIdBody { unique_id }))
}

async fn correct(
    State(registry): Registry,
    Path((kind, unique_id)): Path<(String, String)>,
    Json(document): Json<Blob>,
) -> Result<Json<UniqueIdBody>> {
    let unique_id = parse_unique_id(&unique_id)?;
    let unique_id = master(&registry, &kind)?.correct(&unique_id, document).await?;
    Ok(Json(UniqueIdBody { unique_id }))
}

async fn replace_version(
    State(registry): Registry,
    Path((kind, unique_id)): Path<(String, String)>,
    Json(bodies): Json<Vec<ReplacementBody>>,
) -> Result<Json<Vec<UniqueId>>> {
    let unique_id = parse_unique_id(&unique_id)?;
    let ids = master(&registry, &kind)?
        .replace_version(&unique_id, replacements(bodies))
        .await?;
    Ok(Json(ids))
}

async fn remove_version(
    State(registry): Registry,
    Path((kind, unique_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let unique_id = parse_unique_id(&unique_id)?;
    master(&registry, &kind)?.remove_version(&unique_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
