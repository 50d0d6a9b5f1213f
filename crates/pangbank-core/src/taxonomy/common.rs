//! Common-ancestor resolution for pangenomes.
//!
//! The representative taxonomy of a pangenome is the set of taxa shared by
//! every member genome for one taxonomy source. Because member chains are
//! rank prefixes, the intersection is itself a prefix: the greatest common
//! ancestor lineage.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashSet};

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::lineage::{GenomeLineages, Lineage};
use crate::models::Taxon;
use crate::taxonomy::materialize::TaxonLookup;

/// Taxa of `a` that also occur in `b`, in the order of `a`.
pub fn common_taxa<T: Borrow<Taxon> + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let in_b: HashSet<Uuid> = b.iter().map(|t| t.borrow().id).collect();
    a.iter()
        .filter(|t| {
            let taxon: &Taxon = (*t).borrow();
            in_b.contains(&taxon.id)
        })
        .cloned()
        .collect()
}

/// Intersection of any number of taxon chains.
///
/// Identical chains are intersected once. No chains gives an empty set. The
/// result is checked to be a contiguous rank prefix.
pub fn common_ancestor_taxa<T: Borrow<Taxon> + Clone>(chains: &[Vec<T>]) -> Result<Vec<T>> {
    let mut seen: HashSet<Vec<Uuid>> = HashSet::new();
    let mut distinct = chains
        .iter()
        .filter(|chain| seen.insert(chain.iter().map(|t| t.borrow().id).collect()));

    let mut common: Vec<T> = match distinct.next() {
        Some(first) => first.clone(),
        None => return Ok(Vec::new()),
    };
    for chain in distinct {
        if common.is_empty() {
            break;
        }
        common = common_taxa(&common, chain);
    }

    ensure_contiguous(&common)?;
    Ok(common)
}

/// Check that taxa sit at depths `0, 1, .., k-1` in order.
pub fn ensure_contiguous<T: Borrow<Taxon>>(taxa: &[T]) -> Result<()> {
    for (expected, taxon) in taxa.iter().enumerate() {
        let taxon = taxon.borrow();
        if taxon.depth != expected as i32 {
            let found = taxa
                .iter()
                .map(|t| format!("{}@{}", t.borrow().name, t.borrow().depth))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::NonContiguousLineage(format!(
                "expected depth {} but found '{}' at depth {} in [{}]",
                expected, taxon.name, taxon.depth, found
            )));
        }
    }
    Ok(())
}

/// Representative taxa of a pangenome from its member genomes' lineages.
///
/// Members are grouped by lineage first, so the intersection runs once per
/// distinct lineage rather than once per genome.
pub fn representative_taxa<'a, 'm>(
    members: impl IntoIterator<Item = &'m str>,
    lineages: &GenomeLineages,
    lookup: &'a TaxonLookup,
) -> Result<Vec<&'a Taxon>> {
    let mut by_lineage: BTreeMap<&Lineage, usize> = BTreeMap::new();
    for genome in members {
        let lineage = lineages
            .get(genome)
            .ok_or_else(|| Error::UnknownGenomeLineage(genome.to_string()))?;
        *by_lineage.entry(lineage).or_default() += 1;
    }

    let chains = by_lineage
        .keys()
        .map(|lineage| lookup.chain(lineage))
        .collect::<Result<Vec<_>>>()?;

    common_ancestor_taxa(&chains)
}
