//! Collection HTTP handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{ApiError, AppState};
use pangbank_core::{CollectionRepository, CollectionWithReleases};

/// Query parameters for listing collections.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCollectionsQuery {
    /// Only include the latest release of each collection
    #[serde(default)]
    pub only_latest_release: bool,
}

/// List collections with their releases, newest version first.
#[utoipa::path(
    get,
    path = "/api/v1/collections",
    tag = "Collections",
    params(ListCollectionsQuery),
    responses(
        (status = 200, description = "Collections", body = [CollectionWithReleases]),
    )
)]
pub async fn list_collections(
    State(state): State<AppState>,
    Query(query): Query<ListCollectionsQuery>,
) -> Result<Json<Vec<CollectionWithReleases>>, ApiError> {
    let collections = state.db.collections.list(query.only_latest_release).await?;
    Ok(Json(collections))
}

/// Get a collection by id.
#[utoipa::path(
    get,
    path = "/api/v1/collections/{id}",
    tag = "Collections",
    params(("id" = Uuid, Path, description = "Collection id")),
    responses(
        (status = 200, description = "Collection", body = CollectionWithReleases),
        (status = 404, description = "Collection not found"),
    )
)]
pub async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CollectionWithReleases>, ApiError> {
    state
        .db
        .collections
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("collection {}", id)))
}
