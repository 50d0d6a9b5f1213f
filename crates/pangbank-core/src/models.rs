//! Core data models for PangBank.
//!
//! These types are shared across all PangBank crates and represent the
//! persisted domain entities plus the typed inputs they are built from.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::lineage::RankList;

// =============================================================================
// TAXONOMY TYPES
// =============================================================================

/// A named, versioned taxonomy with an ordered rank list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct TaxonomySource {
    pub id: Uuid,
    pub name: String,
    pub version: Option<String>,
    /// Rank list as declared, `;`-delimited.
    pub ranks: String,
    pub description: Option<String>,
    pub source: Option<String>,
    pub url: Option<String>,
}

impl TaxonomySource {
    /// Canonical rank list of this source.
    pub fn rank_list(&self) -> Result<RankList> {
        RankList::parse(&self.ranks)
    }

    /// Human-readable `name (version v)` label used in messages.
    pub fn label(&self) -> String {
        source_label(&self.name, self.version.as_deref())
    }
}

/// Label for a taxonomy source identity.
pub fn source_label(name: &str, version: Option<&str>) -> String {
    match version {
        Some(v) => format!("{} (version {})", name, v),
        None => name.to_string(),
    }
}

/// Taxonomy source declaration as found in a release descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxonomySourceInput {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub ranks: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// One taxon of a taxonomy source.
///
/// Identity within a source is `(rank, name, depth)`; there is no parent
/// pointer, the position in a lineage is carried by `depth`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, utoipa::ToSchema)]
pub struct Taxon {
    pub id: Uuid,
    pub taxonomy_source_id: Uuid,
    pub name: String,
    pub rank: String,
    pub depth: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxid: Option<i64>,
}

/// Taxa of one taxonomy source attached to a genome or pangenome, ordered by depth.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Taxonomy {
    pub taxonomy_source: TaxonomySource,
    pub taxa: Vec<Taxon>,
}

impl Taxonomy {
    /// Group taxa by taxonomy source.
    ///
    /// Sources keep the order in which they are first seen; taxa inside a
    /// source are sorted by depth.
    pub fn group(sources: &[TaxonomySource], taxa: Vec<Taxon>) -> Vec<Taxonomy> {
        let mut groups: Vec<Taxonomy> = Vec::new();
        for taxon in taxa {
            match groups
                .iter_mut()
                .find(|g| g.taxonomy_source.id == taxon.taxonomy_source_id)
            {
                Some(group) => group.taxa.push(taxon),
                None => {
                    if let Some(source) = sources.iter().find(|s| s.id == taxon.taxonomy_source_id)
                    {
                        groups.push(Taxonomy {
                            taxonomy_source: source.clone(),
                            taxa: vec![taxon],
                        });
                    }
                }
            }
        }
        for group in &mut groups {
            group.taxa.sort_by_key(|t| t.depth);
        }
        groups
    }
}

// =============================================================================
// GENOME TYPES
// =============================================================================

/// A provider of genomes (RefSeq, GenBank, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct GenomeSource {
    pub id: Uuid,
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub source: Option<String>,
    pub url: Option<String>,
}

/// Genome source declaration as found in a release descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenomeSourceInput {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A genome, identified globally by its name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
pub struct Genome {
    pub id: Uuid,
    pub name: String,
    pub genome_source_id: Option<Uuid>,
}

/// A genome with its taxonomies grouped per source and its metadata.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GenomeWithTaxonomies {
    #[serde(flatten)]
    pub genome: Genome,
    pub taxonomies: Vec<Taxonomy>,
    pub genome_metadata: Vec<MetadataEntry>,
}

// =============================================================================
// METADATA TYPES
// =============================================================================

/// A provider of free-form genome metadata, identified by name and version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct GenomeMetadataSource {
    pub id: Uuid,
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenomeMetadataSourceInput {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// One key/value annotation with the name of its source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
pub struct MetadataEntry {
    pub source: String,
    pub key: String,
    pub value: String,
}

/// Key/value annotations of one genome, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeMetadataRow {
    pub genome_name: String,
    pub entries: Vec<(String, String)>,
}

/// A metadata table read for one named source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeMetadataTable {
    pub source: String,
    pub rows: Vec<GenomeMetadataRow>,
}

impl GenomeMetadataTable {
    /// Total number of key/value pairs.
    pub fn entry_count(&self) -> usize {
        self.rows.iter().map(|r| r.entries.len()).sum()
    }
}

// =============================================================================
// COLLECTION & RELEASE TYPES
// =============================================================================

/// A named family of releases.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at_utc: DateTime<Utc>,
}

/// Collection declaration as found in a release descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One versioned snapshot of a collection.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CollectionRelease {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub taxonomy_source_id: Uuid,
    pub version: String,
    pub ppanggolin_version: String,
    pub pangbank_wf_version: String,
    pub mash_version: String,
    pub release_note: String,
    pub date: NaiveDateTime,
    pub mash_sketch: String,
    pub mash_sketch_md5sum: String,
    pub pangenomes_directory: String,
    pub latest: bool,
}

/// A release with the name of its collection and its pangenome count.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CollectionReleaseSummary {
    #[serde(flatten)]
    pub release: CollectionRelease,
    pub collection_name: String,
    pub pangenome_count: i64,
}

/// A collection with its releases, newest version first.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CollectionWithReleases {
    #[serde(flatten)]
    pub collection: Collection,
    pub releases: Vec<CollectionReleaseSummary>,
}

/// Everything needed to create a release, once checksums are computed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCollectionRelease {
    pub version: String,
    pub ppanggolin_version: String,
    pub pangbank_wf_version: String,
    pub mash_version: String,
    pub release_note: String,
    pub date: NaiveDateTime,
    pub mash_sketch: String,
    pub mash_sketch_md5sum: String,
    pub pangenomes_directory: String,
}

// =============================================================================
// PANGENOME TYPES
// =============================================================================

/// Summary metrics of one partition (persistent, shell or cloud).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PartitionMetrics {
    pub family_count: i32,
    pub min_genome_frequency: f64,
    pub max_genome_frequency: f64,
    pub std_genome_frequency: f64,
    pub mean_genome_frequency: f64,
}

/// Summary metrics of a pangenome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PangenomeMetrics {
    pub gene_count: i32,
    pub genome_count: i32,
    pub family_count: i32,
    pub edge_count: i32,
    pub persistent: PartitionMetrics,
    pub shell: PartitionMetrics,
    pub cloud: PartitionMetrics,
    pub partition_count: i32,
    pub rgp_count: i32,
    pub spot_count: i32,
    pub module_count: i32,
    pub family_in_module_count: i32,
}

/// A pangenome built for one release.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Pangenome {
    pub id: Uuid,
    pub collection_release_id: Uuid,
    pub name: String,
    /// Artifact path relative to the release's pangenome directory.
    pub file_name: String,
    pub file_md5sum: String,
    pub annotation_source: Option<String>,
    pub metrics: PangenomeMetrics,
}

/// A pangenome with its release and representative taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PangenomeSummary {
    #[serde(flatten)]
    pub pangenome: Pangenome,
    pub collection_release: CollectionReleaseSummary,
    pub taxonomy: Option<Taxonomy>,
}

/// Per-genome metrics inside one pangenome.
///
/// Field names match the lower-cased column headers of the genome statistics
/// table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GenomeMetrics {
    pub contigs: i32,
    pub genes: i32,
    pub fragmented_genes: i32,
    pub families: i32,
    pub families_with_fragments: i32,
    pub families_in_multicopy: i32,
    pub soft_core_families: i32,
    pub soft_core_genes: i32,
    pub exact_core_families: i32,
    pub exact_core_genes: i32,
    pub persistent_genes: i32,
    pub persistent_fragmented_genes: i32,
    pub persistent_families: i32,
    pub persistent_families_with_fragments: i32,
    pub persistent_families_in_multicopy: i32,
    pub shell_genes: i32,
    pub shell_fragmented_genes: i32,
    pub shell_families: i32,
    pub shell_families_with_fragments: i32,
    pub shell_families_in_multicopy: i32,
    pub cloud_genes: i32,
    pub cloud_fragmented_genes: i32,
    pub cloud_families: i32,
    pub cloud_families_with_fragments: i32,
    pub cloud_families_in_multicopy: i32,
    pub completeness: f64,
    pub contamination: f64,
    pub fragmentation: f64,
    pub rgps: i32,
    pub spots: i32,
    pub modules: i32,
}

/// Membership of a genome in a pangenome.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GenomeInPangenome {
    pub id: Uuid,
    pub genome_id: Uuid,
    pub genome_name: String,
    pub pangenome_id: Uuid,
    pub genome_file_name: String,
    pub genome_file_md5sum: String,
    pub metrics: GenomeMetrics,
    /// Annotations of the genome inside this pangenome.
    pub genome_metadata: Vec<MetadataEntry>,
}

/// A genome's entry in a pangenome, ready to be linked.
#[derive(Debug, Clone, PartialEq)]
pub struct PangenomeMember {
    pub genome_name: String,
    pub genome_file_name: String,
    pub genome_file_md5sum: String,
    pub metrics: GenomeMetrics,
}

/// Everything needed to create a pangenome and its genome links.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPangenome {
    pub name: String,
    pub file_name: String,
    pub file_md5sum: String,
    pub annotation_source: Option<String>,
    pub metrics: PangenomeMetrics,
    pub members: Vec<PangenomeMember>,
    /// Per-member metadata tables, restricted to members.
    pub metadata: Vec<GenomeMetadataTable>,
}
