//! Taxonomy repository: taxonomy sources, taxa and genome-taxon links.
//!
//! Write methods take the ingestion transaction (`_tx`) so a whole release
//! lands atomically.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use pangbank_core::defaults::INSERT_CHUNK_SIZE;
use pangbank_core::{
    materialize, names_by_depth, new_v7, plan_genome_links, Error, Genome, GenomeLineages,
    GenomeTaxonLink, Lineage, LinkPlan, RankList, Result, Taxon, TaxonIdentityIndex, TaxonLookup,
    Taxonomy, TaxonomySource, TaxonomySourceInput,
};

pub(crate) const TAXON_COLUMNS: &str = "t.id, t.taxonomy_source_id, t.name, t.rank, t.depth, t.taxid";

const SOURCE_COLUMNS: &str = "id, name, version, ranks, description, source, url";

pub(crate) fn taxon_from_row(r: &PgRow) -> Taxon {
    Taxon {
        id: r.get("id"),
        taxonomy_source_id: r.get("taxonomy_source_id"),
        name: r.get("name"),
        rank: r.get("rank"),
        depth: r.get("depth"),
        taxid: r.get("taxid"),
    }
}

pub(crate) fn source_from_row(r: &PgRow) -> TaxonomySource {
    TaxonomySource {
        id: r.get("id"),
        name: r.get("name"),
        version: r.get("version"),
        ranks: r.get("ranks"),
        description: r.get("description"),
        source: r.get("source"),
        url: r.get("url"),
    }
}

/// PostgreSQL repository for taxonomy sources and taxa.
#[derive(Clone)]
pub struct PgTaxonomyRepository {
    pool: Pool<Postgres>,
    chunk_size: usize,
}

impl PgTaxonomyRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            chunk_size: INSERT_CHUNK_SIZE,
        }
    }

    /// Rows per bulk insert statement.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    // ==========================================================================
    // TAXONOMY SOURCES
    // ==========================================================================

    /// Find a taxonomy source by `(name, version)`; a missing version is its
    /// own identity.
    pub async fn find_source_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
        version: Option<&str>,
    ) -> Result<Option<TaxonomySource>> {
        let row = sqlx::query(&format!(
            "SELECT {SOURCE_COLUMNS} FROM taxonomy_source
             WHERE name = $1 AND version IS NOT DISTINCT FROM $2"
        ))
        .bind(name)
        .bind(version)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(source_from_row))
    }

    /// Get or create a taxonomy source.
    ///
    /// An existing source must declare the same canonical rank list,
    /// otherwise the call fails with `RankMismatch` naming both lists.
    pub async fn get_or_create_source_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        input: &TaxonomySourceInput,
    ) -> Result<TaxonomySource> {
        let given = RankList::parse(&input.ranks)?;

        if let Some(existing) = self
            .find_source_tx(tx, &input.name, input.version.as_deref())
            .await?
        {
            let existing_ranks = existing.rank_list()?;
            if existing_ranks != given {
                return Err(Error::RankMismatch {
                    source_name: existing.label(),
                    existing: existing_ranks.to_string(),
                    given: given.to_string(),
                });
            }
            debug!(
                subsystem = "database",
                component = "taxonomy",
                op = "get_or_create_source",
                taxonomy_source = %existing.label(),
                "Taxonomy source already exists"
            );
            return Ok(existing);
        }

        let source = TaxonomySource {
            id: new_v7(),
            name: input.name.clone(),
            version: input.version.clone(),
            ranks: input.ranks.clone(),
            description: input.description.clone(),
            source: input.source.clone(),
            url: input.url.clone(),
        };

        sqlx::query(
            "INSERT INTO taxonomy_source (id, name, version, ranks, description, source, url)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(source.id)
        .bind(&source.name)
        .bind(&source.version)
        .bind(&source.ranks)
        .bind(&source.description)
        .bind(&source.source)
        .bind(&source.url)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "taxonomy",
            op = "get_or_create_source",
            taxonomy_source = %source.label(),
            rank_count = given.len(),
            "Created taxonomy source"
        );
        Ok(source)
    }

    /// Taxonomy sources by id.
    pub async fn sources_by_ids(&self, ids: &[Uuid]) -> Result<Vec<TaxonomySource>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {SOURCE_COLUMNS} FROM taxonomy_source WHERE id = ANY($1) ORDER BY name"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(source_from_row).collect())
    }

    // ==========================================================================
    // TAXA
    // ==========================================================================

    /// Seed the identity index with persisted taxa whose names occur in the
    /// lineages, one query per depth.
    pub async fn seed_index_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        index: &mut TaxonIdentityIndex,
        lineages: &[&Lineage],
        rank_count: usize,
    ) -> Result<()> {
        for (depth, names) in names_by_depth(lineages.iter().copied(), rank_count)
            .into_iter()
            .enumerate()
        {
            if names.is_empty() {
                continue;
            }
            let names: Vec<&str> = names.into_iter().collect();
            let rows = sqlx::query(&format!(
                "SELECT {TAXON_COLUMNS} FROM taxon t
                 WHERE t.taxonomy_source_id = $1 AND t.depth = $2 AND t.name = ANY($3)"
            ))
            .bind(index.taxonomy_source_id())
            .bind(depth as i32)
            .bind(&names)
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::Database)?;

            debug!(
                subsystem = "database",
                component = "taxonomy",
                op = "seed_index",
                depth,
                requested = names.len(),
                found = rows.len(),
                "Seeded taxa at depth"
            );
            index.seed(rows.iter().map(taxon_from_row))?;
        }
        Ok(())
    }

    /// Insert the index's pending taxa in chunks and mark them flushed.
    pub async fn flush_pending_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        index: &mut TaxonIdentityIndex,
    ) -> Result<usize> {
        let pending: Vec<Taxon> = index.pending().into_iter().cloned().collect();

        for chunk in pending.chunks(self.chunk_size) {
            let ids: Vec<Uuid> = chunk.iter().map(|t| t.id).collect();
            let sources: Vec<Uuid> = chunk.iter().map(|t| t.taxonomy_source_id).collect();
            let names: Vec<&str> = chunk.iter().map(|t| t.name.as_str()).collect();
            let ranks: Vec<&str> = chunk.iter().map(|t| t.rank.as_str()).collect();
            let depths: Vec<i32> = chunk.iter().map(|t| t.depth).collect();

            sqlx::query(
                "INSERT INTO taxon (id, taxonomy_source_id, name, rank, depth)
                 SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::text[], $4::text[], $5::int4[])",
            )
            .bind(&ids)
            .bind(&sources)
            .bind(&names)
            .bind(&ranks)
            .bind(&depths)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

            debug!(
                subsystem = "database",
                component = "taxonomy",
                op = "flush_taxa",
                db_table = "taxon",
                chunk_size = chunk.len(),
                "Inserted taxa chunk"
            );
        }

        index.mark_flushed();
        Ok(pending.len())
    }

    /// Materialize the taxa of every distinct lineage of the batch.
    ///
    /// Persisted taxa are reused, missing ones created; the returned lookup
    /// covers every `(depth, name)` of the batch.
    pub async fn materialize_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        source: &TaxonomySource,
        lineages: &GenomeLineages,
    ) -> Result<TaxonLookup> {
        let start = Instant::now();
        let ranks = source.rank_list()?;
        let distinct = lineages.distinct_lineages();

        let mut index = TaxonIdentityIndex::new(source.id);
        self.seed_index_tx(tx, &mut index, &distinct, ranks.len())
            .await?;

        let materialized = materialize(distinct.iter().copied(), &ranks, &mut index)?;
        let flushed = self.flush_pending_tx(tx, &mut index).await?;

        info!(
            subsystem = "database",
            component = "materializer",
            op = "materialize",
            taxonomy_source = %source.label(),
            lineage_count = distinct.len(),
            created_count = flushed,
            reused_count = materialized.reused,
            total = materialized.lookup.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Materialized taxa"
        );
        Ok(materialized.lookup)
    }

    // ==========================================================================
    // GENOME LINKS
    // ==========================================================================

    /// Persisted `(genome, taxon)` links of the given genomes.
    pub async fn existing_genome_links_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        genome_ids: &[Uuid],
    ) -> Result<HashSet<GenomeTaxonLink>> {
        let mut links = HashSet::new();
        for chunk in genome_ids.chunks(self.chunk_size) {
            let rows = sqlx::query(
                "SELECT genome_id, taxon_id FROM genome_taxon WHERE genome_id = ANY($1)",
            )
            .bind(chunk)
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::Database)?;

            links.extend(rows.iter().map(|r| GenomeTaxonLink {
                genome_id: r.get("genome_id"),
                taxon_id: r.get("taxon_id"),
            }));
        }
        Ok(links)
    }

    /// Link every genome of the batch to each taxon of its lineage.
    ///
    /// Only links missing from the store are inserted; a genome without a
    /// lineage entry fails the batch.
    pub async fn link_genomes_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        genomes: &[Genome],
        lineages: &GenomeLineages,
        lookup: &TaxonLookup,
    ) -> Result<LinkPlan> {
        let genome_ids: Vec<Uuid> = genomes.iter().map(|g| g.id).collect();
        let existing = self.existing_genome_links_tx(tx, &genome_ids).await?;
        let plan = plan_genome_links(genomes, lineages, lookup, &existing)?;

        for chunk in plan.new_links.chunks(self.chunk_size) {
            let genome_ids: Vec<Uuid> = chunk.iter().map(|l| l.genome_id).collect();
            let taxon_ids: Vec<Uuid> = chunk.iter().map(|l| l.taxon_id).collect();
            sqlx::query(
                "INSERT INTO genome_taxon (genome_id, taxon_id)
                 SELECT * FROM UNNEST($1::uuid[], $2::uuid[])",
            )
            .bind(&genome_ids)
            .bind(&taxon_ids)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }

        info!(
            subsystem = "database",
            component = "linker",
            op = "link_genomes",
            genome_count = genomes.len(),
            created_count = plan.new_links.len(),
            newly_linked = plan.newly_linked,
            already_linked = plan.already_linked,
            unclassified = plan.unclassified,
            "Linked genomes to taxa"
        );
        if plan.unclassified > 0 {
            warn!(
                subsystem = "database",
                component = "linker",
                unclassified = plan.unclassified,
                "Genomes with an empty lineage are linked to no taxa"
            );
        }
        Ok(plan)
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    /// Taxa linked to each genome, keyed by genome id.
    pub async fn taxa_of_genomes(&self, genome_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Taxon>>> {
        self.linked_taxa("genome_taxon", "genome_id", genome_ids)
            .await
    }

    /// Representative taxa of each pangenome, keyed by pangenome id.
    pub async fn taxa_of_pangenomes(
        &self,
        pangenome_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Taxon>>> {
        self.linked_taxa("pangenome_taxon", "pangenome_id", pangenome_ids)
            .await
    }

    /// Taxa of each owner grouped per taxonomy source.
    pub async fn group_by_source(
        &self,
        by_owner: HashMap<Uuid, Vec<Taxon>>,
    ) -> Result<HashMap<Uuid, Vec<Taxonomy>>> {
        let mut source_ids: Vec<Uuid> = by_owner
            .values()
            .flatten()
            .map(|t| t.taxonomy_source_id)
            .collect();
        source_ids.sort();
        source_ids.dedup();
        let sources = self.sources_by_ids(&source_ids).await?;

        Ok(by_owner
            .into_iter()
            .map(|(owner, taxa)| (owner, Taxonomy::group(&sources, taxa)))
            .collect())
    }

    async fn linked_taxa(
        &self,
        link_table: &str,
        owner_column: &str,
        owner_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Taxon>>> {
        let mut by_owner: HashMap<Uuid, Vec<Taxon>> = HashMap::new();
        if owner_ids.is_empty() {
            return Ok(by_owner);
        }

        let rows = sqlx::query(&format!(
            "SELECT l.{owner_column} AS owner_id, {TAXON_COLUMNS}
             FROM {link_table} l
             JOIN taxon t ON t.id = l.taxon_id
             WHERE l.{owner_column} = ANY($1)
             ORDER BY t.taxonomy_source_id, t.depth"
        ))
        .bind(owner_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        for r in &rows {
            by_owner
                .entry(r.get("owner_id"))
                .or_default()
                .push(taxon_from_row(r));
        }
        Ok(by_owner)
    }

    /// Number of taxa of a source.
    pub async fn count_taxa(&self, taxonomy_source_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM taxon WHERE taxonomy_source_id = $1")
                .bind(taxonomy_source_id)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(count)
    }
}
