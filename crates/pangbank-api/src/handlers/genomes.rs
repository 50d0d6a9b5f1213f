//! Genome HTTP handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::page;
use crate::{ApiError, AppState};
use pangbank_core::{GenomeQuery, GenomeRepository, GenomeWithTaxonomies, TaxonFilter};

/// Query parameters for listing genomes.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListGenomesQuery {
    /// Exact genome name
    pub genome_name: Option<String>,
    /// Taxon name (at least 3 characters)
    pub taxon_name: Option<String>,
    /// Match `taxon_name` as a case-insensitive substring
    #[serde(default)]
    pub substring_match: bool,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// List genomes with their taxonomies grouped per source.
#[utoipa::path(
    get,
    path = "/api/v1/genomes",
    tag = "Genomes",
    params(ListGenomesQuery),
    responses(
        (status = 200, description = "Genomes", body = [GenomeWithTaxonomies]),
        (status = 400, description = "Invalid filter or pagination"),
    )
)]
pub async fn list_genomes(
    State(state): State<AppState>,
    Query(query): Query<ListGenomesQuery>,
) -> Result<Json<Vec<GenomeWithTaxonomies>>, ApiError> {
    let filter = GenomeQuery {
        genome_name: query.genome_name,
        taxon: TaxonFilter {
            taxon_name: query.taxon_name,
            substring_match: query.substring_match,
        },
    };
    let genomes = state
        .db
        .genomes
        .list(&filter, page(query.offset, query.limit))
        .await?;
    Ok(Json(genomes))
}

/// Get a genome by id.
#[utoipa::path(
    get,
    path = "/api/v1/genomes/{id}",
    tag = "Genomes",
    params(("id" = Uuid, Path, description = "Genome id")),
    responses(
        (status = 200, description = "Genome", body = GenomeWithTaxonomies),
        (status = 404, description = "Genome not found"),
    )
)]
pub async fn get_genome(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GenomeWithTaxonomies>, ApiError> {
    state
        .db
        .genomes
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("genome {}", id)))
}
