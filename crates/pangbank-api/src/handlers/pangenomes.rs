//! Pangenome HTTP handlers.

use std::path::PathBuf;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::{debug, warn};
use utoipa::IntoParams;
use uuid::Uuid;

use super::page;
use crate::{ApiError, AppState};
use pangbank_core::{
    Error, GenomeInPangenome, MemberQuery, PangenomeQuery, PangenomeRepository, PangenomeSummary,
    TaxonFilter,
};

/// Query parameters for listing pangenomes.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPangenomesQuery {
    /// Collection name
    pub collection_name: Option<String>,
    /// Collection id
    pub collection_id: Option<Uuid>,
    /// Only pangenomes of the latest release of each collection
    #[serde(default)]
    pub only_latest_release: bool,
    /// Only pangenomes containing this genome
    pub genome_name: Option<String>,
    /// Representative taxon name (at least 3 characters)
    pub taxon_name: Option<String>,
    /// Match `taxon_name` as a case-insensitive substring
    #[serde(default)]
    pub substring_match: bool,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl ListPangenomesQuery {
    fn filter(&self) -> PangenomeQuery {
        PangenomeQuery {
            collection_name: self.collection_name.clone(),
            collection_id: self.collection_id,
            only_latest_release: self.only_latest_release,
            genome_name: self.genome_name.clone(),
            taxon: TaxonFilter {
                taxon_name: self.taxon_name.clone(),
                substring_match: self.substring_match,
            },
        }
    }
}

/// Query parameters for counting pangenomes.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CountPangenomesQuery {
    /// Collection name
    pub collection_name: Option<String>,
    /// Collection id
    pub collection_id: Option<Uuid>,
    /// Only pangenomes of the latest release of each collection
    #[serde(default)]
    pub only_latest_release: bool,
    /// Only pangenomes containing this genome
    pub genome_name: Option<String>,
    /// Representative taxon name (at least 3 characters)
    pub taxon_name: Option<String>,
    /// Match `taxon_name` as a case-insensitive substring
    #[serde(default)]
    pub substring_match: bool,
}

impl From<CountPangenomesQuery> for PangenomeQuery {
    fn from(q: CountPangenomesQuery) -> Self {
        PangenomeQuery {
            collection_name: q.collection_name,
            collection_id: q.collection_id,
            only_latest_release: q.only_latest_release,
            genome_name: q.genome_name,
            taxon: TaxonFilter {
                taxon_name: q.taxon_name,
                substring_match: q.substring_match,
            },
        }
    }
}

/// Query parameters for listing the genomes of a pangenome.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListMembersQuery {
    /// Exact genome name
    pub genome_name: Option<String>,
    /// Only genomes with a metadata entry of this key
    pub metadata_key: Option<String>,
    /// Only genomes whose `metadata_key` entry has this value
    pub metadata_value: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// List pangenomes with their release and representative taxonomy.
#[utoipa::path(
    get,
    path = "/api/v1/pangenomes",
    tag = "Pangenomes",
    params(ListPangenomesQuery),
    responses(
        (status = 200, description = "Pangenomes", body = [PangenomeSummary]),
        (status = 400, description = "Invalid filter or pagination"),
    )
)]
pub async fn list_pangenomes(
    State(state): State<AppState>,
    Query(query): Query<ListPangenomesQuery>,
) -> Result<Json<Vec<PangenomeSummary>>, ApiError> {
    let pangenomes = state
        .db
        .pangenomes
        .list(&query.filter(), page(query.offset, query.limit))
        .await?;
    Ok(Json(pangenomes))
}

/// Count pangenomes matching the listing filters.
#[utoipa::path(
    get,
    path = "/api/v1/pangenomes/count",
    tag = "Pangenomes",
    params(CountPangenomesQuery),
    responses(
        (status = 200, description = "Number of matching pangenomes", body = i64),
        (status = 400, description = "Invalid filter"),
    )
)]
pub async fn count_pangenomes(
    State(state): State<AppState>,
    Query(query): Query<CountPangenomesQuery>,
) -> Result<Json<i64>, ApiError> {
    let filter = PangenomeQuery::from(query);
    filter.taxon.validate()?;
    Ok(Json(state.db.pangenomes.count(&filter).await?))
}

/// Get a pangenome by id.
#[utoipa::path(
    get,
    path = "/api/v1/pangenomes/{id}",
    tag = "Pangenomes",
    params(("id" = Uuid, Path, description = "Pangenome id")),
    responses(
        (status = 200, description = "Pangenome", body = PangenomeSummary),
        (status = 404, description = "Pangenome not found"),
    )
)]
pub async fn get_pangenome(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PangenomeSummary>, ApiError> {
    state
        .db
        .pangenomes
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("pangenome {}", id)))
}

/// List the member genomes of a pangenome with their metrics.
#[utoipa::path(
    get,
    path = "/api/v1/pangenomes/{id}/genomes",
    tag = "Pangenomes",
    params(("id" = Uuid, Path, description = "Pangenome id"), ListMembersQuery),
    responses(
        (status = 200, description = "Member genomes", body = [GenomeInPangenome]),
        (status = 400, description = "Invalid filter or pagination"),
        (status = 404, description = "Pangenome not found"),
    )
)]
pub async fn list_pangenome_genomes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListMembersQuery>,
) -> Result<Json<Vec<GenomeInPangenome>>, ApiError> {
    let page = page(query.offset, query.limit);
    page.validate()?;
    let filter = MemberQuery {
        genome_name: query.genome_name,
        metadata_key: query.metadata_key,
        metadata_value: query.metadata_value,
    };
    filter.validate()?;
    if state.db.pangenomes.get(id).await?.is_none() {
        return Err(ApiError::NotFound(format!("pangenome {}", id)));
    }
    let members = state.db.pangenomes.members(id, &filter, page).await?;
    Ok(Json(members))
}

/// Download the pangenome artifact.
///
/// Relative artifact paths resolve against the server's data directory.
#[utoipa::path(
    get,
    path = "/api/v1/pangenomes/{id}/file",
    tag = "Pangenomes",
    params(("id" = Uuid, Path, description = "Pangenome id")),
    responses(
        (status = 200, description = "Pangenome file", content_type = "application/octet-stream"),
        (status = 404, description = "Pangenome or file not found"),
    )
)]
pub async fn download_pangenome_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let relative = state
        .db
        .pangenomes
        .file_path(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("pangenome {}", id)))?;
    let path = resolve_artifact(&state, &relative);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                subsystem = "api",
                pangenome_id = %id,
                path = %path.display(),
                "Pangenome file is missing"
            );
            return Err(ApiError::NotFound(format!("file of pangenome {}", id)));
        }
        Err(e) => return Err(ApiError::Database(e.into())),
    };
    debug!(
        subsystem = "api",
        pangenome_id = %id,
        size = bytes.len(),
        "Serving pangenome file"
    );

    let file_name = relative.replace('/', "_");
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
        .map_err(|e| ApiError::Database(Error::Internal(e.to_string())))?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

fn resolve_artifact(state: &AppState, relative: &str) -> PathBuf {
    let path = PathBuf::from(relative);
    if path.is_absolute() {
        path
    } else {
        state.data_dir.join(path)
    }
}
