//! Taxon materialization.
//!
//! Turns the distinct lineages of a batch into one taxon per distinct
//! `(depth, name)`, reusing taxa known to the identity index and creating the
//! rest. Work is proportional to the number of distinct values per depth, not
//! to the number of genomes.

use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::lineage::{Lineage, RankList};
use crate::models::Taxon;
use crate::taxonomy::identity::TaxonIdentityIndex;

/// Distinct names occurring at each depth, one set per rank.
pub fn names_by_depth<'a>(
    lineages: impl IntoIterator<Item = &'a Lineage>,
    rank_count: usize,
) -> Vec<BTreeSet<&'a str>> {
    let mut by_depth: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); rank_count];
    for lineage in lineages {
        for (depth, name) in lineage.iter() {
            if let Some(names) = by_depth.get_mut(depth) {
                names.insert(name);
            }
        }
    }
    by_depth
}

/// Depth-indexed taxon lookup: `depth -> {name -> taxon}`.
#[derive(Debug, Clone, Default)]
pub struct TaxonLookup {
    by_depth: Vec<HashMap<String, Taxon>>,
}

impl TaxonLookup {
    pub fn with_depths(depths: usize) -> Self {
        Self {
            by_depth: vec![HashMap::new(); depths],
        }
    }

    pub fn insert(&mut self, taxon: Taxon) {
        let depth = taxon.depth as usize;
        if self.by_depth.len() <= depth {
            self.by_depth.resize_with(depth + 1, HashMap::new);
        }
        self.by_depth[depth].insert(taxon.name.clone(), taxon);
    }

    pub fn get(&self, depth: usize, name: &str) -> Option<&Taxon> {
        self.by_depth.get(depth).and_then(|m| m.get(name))
    }

    /// Taxa of a lineage, broadest first.
    pub fn chain(&self, lineage: &Lineage) -> Result<Vec<&Taxon>> {
        lineage
            .iter()
            .map(|(depth, name)| {
                self.get(depth, name).ok_or_else(|| {
                    Error::Internal(format!(
                        "taxon '{}' at depth {} of lineage '{}' was not materialized",
                        name, depth, lineage
                    ))
                })
            })
            .collect()
    }

    /// Total number of taxa.
    pub fn len(&self) -> usize {
        self.by_depth.iter().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn taxa(&self) -> impl Iterator<Item = &Taxon> {
        self.by_depth.iter().flat_map(HashMap::values)
    }
}

/// Outcome of a materialization pass.
#[derive(Debug)]
pub struct Materialized {
    pub lookup: TaxonLookup,
    pub created: usize,
    pub reused: usize,
}

/// Resolve or create one taxon per distinct `(depth, name)` of the lineages.
///
/// New taxa stay pending in `index` until the caller flushes them.
pub fn materialize<'a>(
    lineages: impl IntoIterator<Item = &'a Lineage>,
    ranks: &RankList,
    index: &mut TaxonIdentityIndex,
) -> Result<Materialized> {
    let lineages: Vec<&Lineage> = lineages.into_iter().collect();

    if let Some(too_deep) = lineages.iter().find(|l| l.len() > ranks.len()) {
        return Err(Error::MalformedLineage {
            source_name: String::new(),
            line: 0,
            reason: format!(
                "lineage '{}' is deeper than the {} declared ranks",
                too_deep,
                ranks.len()
            ),
        });
    }

    let mut lookup = TaxonLookup::with_depths(ranks.len());
    let mut created = 0;
    let mut reused = 0;

    for (depth, names) in names_by_depth(lineages.iter().copied(), ranks.len())
        .into_iter()
        .enumerate()
    {
        let rank = ranks
            .get(depth)
            .ok_or_else(|| Error::Internal(format!("no rank declared at depth {}", depth)))?;
        for name in names {
            let (taxon, is_new) = index.resolve_or_create(name, rank, depth as i32);
            if is_new {
                created += 1;
            } else {
                reused += 1;
            }
            lookup.insert(taxon.clone());
        }
    }

    Ok(Materialized {
        lookup,
        created,
        reused,
    })
}
