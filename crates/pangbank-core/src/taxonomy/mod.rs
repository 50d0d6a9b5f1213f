//! Taxonomy reconciliation engine.
//!
//! Pure, I/O-free building blocks used by ingestion:
//! - [`identity`]: `(rank, name, depth)` identity map per taxonomy source
//! - [`materialize`]: lineages to a depth-indexed taxon lookup
//! - [`link`]: genome to taxon link planning against persisted links
//! - [`common`]: greatest common ancestor taxa of a set of genomes

pub mod common;
pub mod identity;
pub mod link;
pub mod materialize;

pub use common::{common_ancestor_taxa, common_taxa, ensure_contiguous, representative_taxa};
pub use identity::{TaxonIdentityIndex, TaxonKey};
pub use link::{plan_genome_links, GenomeTaxonLink, LinkPlan};
pub use materialize::{materialize, names_by_depth, Materialized, TaxonLookup};
