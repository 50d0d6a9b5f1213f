//! Read-side repository traits and their query types.
//!
//! The API depends on these traits; `pangbank-db` provides the PostgreSQL
//! implementations. Writes happen inside ingestion transactions and are not
//! part of these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::{PAGE_LIMIT, PAGE_LIMIT_MAX, PAGE_OFFSET, TAXON_FILTER_MIN_LEN};
use crate::error::{Error, Result};
use crate::models::*;

// =============================================================================
// QUERY TYPES
// =============================================================================

/// Offset/limit pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_offset")]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_offset() -> i64 {
    PAGE_OFFSET
}

fn default_limit() -> i64 {
    PAGE_LIMIT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: PAGE_OFFSET,
            limit: PAGE_LIMIT,
        }
    }
}

impl Pagination {
    pub fn validate(&self) -> Result<()> {
        if self.offset < 0 {
            return Err(Error::InvalidInput(format!(
                "offset must be >= 0, got {}",
                self.offset
            )));
        }
        if !(1..=PAGE_LIMIT_MAX).contains(&self.limit) {
            return Err(Error::InvalidInput(format!(
                "limit must be between 1 and {}, got {}",
                PAGE_LIMIT_MAX, self.limit
            )));
        }
        Ok(())
    }
}

/// Taxon name filter shared by genome and pangenome listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonFilter {
    pub taxon_name: Option<String>,
    /// Case-insensitive substring match instead of exact match.
    #[serde(default)]
    pub substring_match: bool,
}

impl TaxonFilter {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.taxon_name {
            if name.chars().count() < TAXON_FILTER_MIN_LEN {
                return Err(Error::InvalidInput(format!(
                    "taxon_name must be at least {} characters",
                    TAXON_FILTER_MIN_LEN
                )));
            }
        }
        Ok(())
    }
}

/// Filters for listing genomes.
#[derive(Debug, Clone, Default)]
pub struct GenomeQuery {
    pub genome_name: Option<String>,
    pub taxon: TaxonFilter,
}

/// Filters for listing pangenomes.
#[derive(Debug, Clone, Default)]
pub struct PangenomeQuery {
    pub collection_name: Option<String>,
    pub collection_id: Option<Uuid>,
    pub only_latest_release: bool,
    pub genome_name: Option<String>,
    pub taxon: TaxonFilter,
}

/// Filters for listing the genomes of one pangenome.
#[derive(Debug, Clone, Default)]
pub struct MemberQuery {
    pub genome_name: Option<String>,
    /// Only members with a metadata entry of this key.
    pub metadata_key: Option<String>,
    /// Only members whose `metadata_key` entry has this value.
    pub metadata_value: Option<String>,
}

impl MemberQuery {
    pub fn validate(&self) -> Result<()> {
        if self.metadata_value.is_some() && self.metadata_key.is_none() {
            return Err(Error::InvalidInput(
                "metadata_value requires metadata_key".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

/// Repository for collections and their releases.
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    /// List collections with their releases, newest release first.
    async fn list(&self, only_latest_release: bool) -> Result<Vec<CollectionWithReleases>>;

    /// Get one collection with its releases.
    async fn get(&self, id: Uuid) -> Result<Option<CollectionWithReleases>>;

    /// Find a collection by name.
    async fn get_by_name(&self, name: &str) -> Result<Option<Collection>>;
}

/// Repository for genomes.
#[async_trait]
pub trait GenomeRepository: Send + Sync {
    async fn list(
        &self,
        query: &GenomeQuery,
        page: Pagination,
    ) -> Result<Vec<GenomeWithTaxonomies>>;

    async fn get(&self, id: Uuid) -> Result<Option<GenomeWithTaxonomies>>;
}

/// Repository for pangenomes and their members.
#[async_trait]
pub trait PangenomeRepository: Send + Sync {
    async fn list(
        &self,
        query: &PangenomeQuery,
        page: Pagination,
    ) -> Result<Vec<PangenomeSummary>>;

    /// Number of pangenomes matching the listing filters.
    async fn count(&self, query: &PangenomeQuery) -> Result<i64>;

    async fn get(&self, id: Uuid) -> Result<Option<PangenomeSummary>>;

    /// Genomes of a pangenome with their per-genome metrics and metadata.
    async fn members(
        &self,
        pangenome_id: Uuid,
        query: &MemberQuery,
        page: Pagination,
    ) -> Result<Vec<GenomeInPangenome>>;

    /// Artifact path relative to the data directory:
    /// `<pangenomes_directory>/<file_name>`.
    async fn file_path(&self, pangenome_id: Uuid) -> Result<Option<String>>;
}
