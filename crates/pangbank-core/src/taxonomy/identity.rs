//! Taxon identity index.
//!
//! Maps `(rank, name, depth)` to a taxon within one taxonomy source so that
//! repeated imports of the same lineage resolve to the same taxon rows. The
//! index is owned by one ingestion run: it is seeded from persisted taxa,
//! accumulates new ones, and hands those back for flushing.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Taxon;
use crate::uuid_utils::new_v7;

/// Identity key of a taxon inside one taxonomy source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaxonKey {
    pub rank: String,
    pub name: String,
    pub depth: i32,
}

impl TaxonKey {
    pub fn new(rank: &str, name: &str, depth: i32) -> Self {
        Self {
            rank: rank.to_string(),
            name: name.to_string(),
            depth,
        }
    }

    fn of(taxon: &Taxon) -> Self {
        Self::new(&taxon.rank, &taxon.name, taxon.depth)
    }
}

/// In-memory identity map for the taxa of one taxonomy source.
#[derive(Debug)]
pub struct TaxonIdentityIndex {
    taxonomy_source_id: Uuid,
    taxa: HashMap<TaxonKey, Taxon>,
    pending: Vec<TaxonKey>,
    seeded: usize,
}

impl TaxonIdentityIndex {
    pub fn new(taxonomy_source_id: Uuid) -> Self {
        Self {
            taxonomy_source_id,
            taxa: HashMap::new(),
            pending: Vec::new(),
            seeded: 0,
        }
    }

    pub fn taxonomy_source_id(&self) -> Uuid {
        self.taxonomy_source_id
    }

    /// Register persisted taxa.
    pub fn seed(&mut self, taxa: impl IntoIterator<Item = Taxon>) -> Result<()> {
        for taxon in taxa {
            if taxon.taxonomy_source_id != self.taxonomy_source_id {
                return Err(Error::Internal(format!(
                    "taxon {} belongs to taxonomy source {}, index is for {}",
                    taxon.id, taxon.taxonomy_source_id, self.taxonomy_source_id
                )));
            }
            if self.taxa.insert(TaxonKey::of(&taxon), taxon).is_none() {
                self.seeded += 1;
            }
        }
        Ok(())
    }

    /// Return the taxon for the key, creating an unpersisted one if absent.
    ///
    /// The second element is true when the taxon was created by this call.
    pub fn resolve_or_create(&mut self, name: &str, rank: &str, depth: i32) -> (&Taxon, bool) {
        let key = TaxonKey::new(rank, name, depth);
        let created = !self.taxa.contains_key(&key);
        if created {
            let taxon = Taxon {
                id: new_v7(),
                taxonomy_source_id: self.taxonomy_source_id,
                name: name.to_string(),
                rank: rank.to_string(),
                depth,
                taxid: None,
            };
            self.pending.push(key.clone());
            self.taxa.insert(key.clone(), taxon);
        }
        (&self.taxa[&key], created)
    }

    pub fn get(&self, name: &str, rank: &str, depth: i32) -> Option<&Taxon> {
        self.taxa.get(&TaxonKey::new(rank, name, depth))
    }

    /// Taxa created since the last flush, in creation order.
    pub fn pending(&self) -> Vec<&Taxon> {
        self.pending.iter().filter_map(|k| self.taxa.get(k)).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Forget the pending list once its taxa are persisted.
    pub fn mark_flushed(&mut self) {
        self.pending.clear();
    }

    /// Number of taxa registered through `seed`.
    pub fn seeded_count(&self) -> usize {
        self.seeded
    }

    pub fn len(&self) -> usize {
        self.taxa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taxa.is_empty()
    }
}
