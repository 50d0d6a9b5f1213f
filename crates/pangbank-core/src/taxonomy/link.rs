//! Genome to taxon link planning.
//!
//! Every genome is linked to each taxon of its lineage chain. Planning works
//! against the set of links already persisted so that re-running a batch
//! adds nothing and never touches existing links.

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::lineage::GenomeLineages;
use crate::models::Genome;
use crate::taxonomy::materialize::TaxonLookup;

/// A `(genome, taxon)` association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenomeTaxonLink {
    pub genome_id: Uuid,
    pub taxon_id: Uuid,
}

/// Links to insert for a batch, plus per-genome counts for logging.
#[derive(Debug, Default)]
pub struct LinkPlan {
    pub new_links: Vec<GenomeTaxonLink>,
    /// Genomes that received at least one new link.
    pub newly_linked: usize,
    /// Genomes whose whole chain was already linked.
    pub already_linked: usize,
    /// Genomes with an empty lineage.
    pub unclassified: usize,
}

/// Plan the links for every genome of the batch.
///
/// A genome without a lineage entry fails the whole plan.
pub fn plan_genome_links<'a>(
    genomes: impl IntoIterator<Item = &'a Genome>,
    lineages: &GenomeLineages,
    lookup: &TaxonLookup,
    existing: &HashSet<GenomeTaxonLink>,
) -> Result<LinkPlan> {
    let mut plan = LinkPlan::default();
    let mut planned: HashSet<GenomeTaxonLink> = HashSet::new();

    for genome in genomes {
        let lineage = lineages
            .get(&genome.name)
            .ok_or_else(|| Error::UnknownGenomeLineage(genome.name.clone()))?;

        if lineage.is_empty() {
            plan.unclassified += 1;
            continue;
        }

        let mut added = false;
        for taxon in lookup.chain(lineage)? {
            let link = GenomeTaxonLink {
                genome_id: genome.id,
                taxon_id: taxon.id,
            };
            if !existing.contains(&link) && planned.insert(link) {
                plan.new_links.push(link);
                added = true;
            }
        }

        if added {
            plan.newly_linked += 1;
        } else {
            plan.already_linked += 1;
        }
    }

    Ok(plan)
}
