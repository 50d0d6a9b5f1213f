//! Pangenome repository: pangenomes, their member genomes and their
//! representative taxa.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, QueryBuilder, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use pangbank_core::defaults::INSERT_CHUNK_SIZE;
use pangbank_core::{
    common_ancestor_taxa, new_v7, Error, Genome, GenomeInPangenome, GenomeMetrics, MemberQuery,
    NewPangenome, Pagination, Pangenome, PangenomeMetrics, PangenomeQuery, PangenomeRepository,
    PangenomeSummary, PartitionMetrics, Result, Taxon, Taxonomy,
};

use crate::collections::{release_summary_from_row, RELEASE_SUMMARY_COLUMNS};
use crate::filters::{bind_params, FilterBuilder, QueryParam};
use crate::metadata::PgMetadataRepository;
use crate::taxonomy::{taxon_from_row, PgTaxonomyRepository, TAXON_COLUMNS};

/// PostgreSQL accepts at most this many bind parameters per statement.
const MAX_BIND_PARAMS: usize = 65_535;

/// Bound values per `genome_pangenome` row.
const MEMBER_COLUMN_COUNT: usize = 36;

const PANGENOME_COLUMNS: &str = "p.id, p.collection_release_id, p.name, p.file_name, \
     p.file_md5sum, p.annotation_source, p.gene_count, p.genome_count, p.family_count, \
     p.edge_count, \
     p.persistent_family_count, p.persistent_family_min_genome_frequency, \
     p.persistent_family_max_genome_frequency, p.persistent_family_std_genome_frequency, \
     p.persistent_family_mean_genome_frequency, \
     p.shell_family_count, p.shell_family_min_genome_frequency, \
     p.shell_family_max_genome_frequency, p.shell_family_std_genome_frequency, \
     p.shell_family_mean_genome_frequency, \
     p.cloud_family_count, p.cloud_family_min_genome_frequency, \
     p.cloud_family_max_genome_frequency, p.cloud_family_std_genome_frequency, \
     p.cloud_family_mean_genome_frequency, \
     p.partition_count, p.rgp_count, p.spot_count, p.module_count, p.family_in_module_count";

const MEMBER_METRIC_COLUMNS: [&str; 31] = [
    "contigs",
    "genes",
    "fragmented_genes",
    "families",
    "families_with_fragments",
    "families_in_multicopy",
    "soft_core_families",
    "soft_core_genes",
    "exact_core_families",
    "exact_core_genes",
    "persistent_genes",
    "persistent_fragmented_genes",
    "persistent_families",
    "persistent_families_with_fragments",
    "persistent_families_in_multicopy",
    "shell_genes",
    "shell_fragmented_genes",
    "shell_families",
    "shell_families_with_fragments",
    "shell_families_in_multicopy",
    "cloud_genes",
    "cloud_fragmented_genes",
    "cloud_families",
    "cloud_families_with_fragments",
    "cloud_families_in_multicopy",
    "completeness",
    "contamination",
    "fragmentation",
    "rgps",
    "spots",
    "modules",
];

fn partition_from_row(r: &PgRow, partition: &str) -> PartitionMetrics {
    PartitionMetrics {
        family_count: r.get(format!("{partition}_family_count").as_str()),
        min_genome_frequency: r.get(format!("{partition}_family_min_genome_frequency").as_str()),
        max_genome_frequency: r.get(format!("{partition}_family_max_genome_frequency").as_str()),
        std_genome_frequency: r.get(format!("{partition}_family_std_genome_frequency").as_str()),
        mean_genome_frequency: r.get(format!("{partition}_family_mean_genome_frequency").as_str()),
    }
}

fn pangenome_from_row(r: &PgRow) -> Pangenome {
    Pangenome {
        id: r.get("id"),
        collection_release_id: r.get("collection_release_id"),
        name: r.get("name"),
        file_name: r.get("file_name"),
        file_md5sum: r.get("file_md5sum"),
        annotation_source: r.get("annotation_source"),
        metrics: PangenomeMetrics {
            gene_count: r.get("gene_count"),
            genome_count: r.get("genome_count"),
            family_count: r.get("family_count"),
            edge_count: r.get("edge_count"),
            persistent: partition_from_row(r, "persistent"),
            shell: partition_from_row(r, "shell"),
            cloud: partition_from_row(r, "cloud"),
            partition_count: r.get("partition_count"),
            rgp_count: r.get("rgp_count"),
            spot_count: r.get("spot_count"),
            module_count: r.get("module_count"),
            family_in_module_count: r.get("family_in_module_count"),
        },
    }
}

fn member_from_row(r: &PgRow) -> GenomeInPangenome {
    GenomeInPangenome {
        id: r.get("id"),
        genome_id: r.get("genome_id"),
        genome_name: r.get("genome_name"),
        pangenome_id: r.get("pangenome_id"),
        genome_file_name: r.get("genome_file_name"),
        genome_file_md5sum: r.get("genome_file_md5sum"),
        metrics: GenomeMetrics {
            contigs: r.get("contigs"),
            genes: r.get("genes"),
            fragmented_genes: r.get("fragmented_genes"),
            families: r.get("families"),
            families_with_fragments: r.get("families_with_fragments"),
            families_in_multicopy: r.get("families_in_multicopy"),
            soft_core_families: r.get("soft_core_families"),
            soft_core_genes: r.get("soft_core_genes"),
            exact_core_families: r.get("exact_core_families"),
            exact_core_genes: r.get("exact_core_genes"),
            persistent_genes: r.get("persistent_genes"),
            persistent_fragmented_genes: r.get("persistent_fragmented_genes"),
            persistent_families: r.get("persistent_families"),
            persistent_families_with_fragments: r.get("persistent_families_with_fragments"),
            persistent_families_in_multicopy: r.get("persistent_families_in_multicopy"),
            shell_genes: r.get("shell_genes"),
            shell_fragmented_genes: r.get("shell_fragmented_genes"),
            shell_families: r.get("shell_families"),
            shell_families_with_fragments: r.get("shell_families_with_fragments"),
            shell_families_in_multicopy: r.get("shell_families_in_multicopy"),
            cloud_genes: r.get("cloud_genes"),
            cloud_fragmented_genes: r.get("cloud_fragmented_genes"),
            cloud_families: r.get("cloud_families"),
            cloud_families_with_fragments: r.get("cloud_families_with_fragments"),
            cloud_families_in_multicopy: r.get("cloud_families_in_multicopy"),
            completeness: r.get("completeness"),
            contamination: r.get("contamination"),
            fragmentation: r.get("fragmentation"),
            rgps: r.get("rgps"),
            spots: r.get("spots"),
            modules: r.get("modules"),
        },
        genome_metadata: Vec::new(),
    }
}

/// Rows per `genome_pangenome` insert, capped by the bind parameter limit.
fn member_chunk_size(configured: usize) -> usize {
    configured.clamp(1, MAX_BIND_PARAMS / MEMBER_COLUMN_COUNT)
}

/// Stored vs recomputed representative taxa of one pangenome.
#[derive(Debug, Clone)]
pub struct RepresentativeTaxaReport {
    pub pangenome_id: Uuid,
    pub taxonomy_source_id: Uuid,
    pub stored: Vec<Taxon>,
    pub recomputed: Vec<Taxon>,
    pub applied: bool,
}

impl RepresentativeTaxaReport {
    pub fn changed(&self) -> bool {
        let ids = |taxa: &[Taxon]| taxa.iter().map(|t| t.id).collect::<HashSet<_>>();
        ids(&self.stored) != ids(&self.recomputed)
    }
}

/// Listing filters shared by `list` and `count`.
fn pangenome_filters(query: &PangenomeQuery) -> Result<FilterBuilder> {
    query.taxon.validate()?;

    let mut filters = FilterBuilder::new();
    if let Some(name) = &query.collection_name {
        filters.push(
            |idx| format!("c.name = ${idx}"),
            QueryParam::String(name.clone()),
        );
    }
    if let Some(id) = query.collection_id {
        filters.push(|idx| format!("c.id = ${idx}"), QueryParam::Uuid(id));
    }
    if query.only_latest_release {
        filters.push_raw("cr.latest");
    }
    if let Some(genome) = &query.genome_name {
        filters.push(
            |idx| {
                format!(
                    "EXISTS (SELECT 1 FROM genome_pangenome gpf JOIN genome gf ON gf.id = gpf.genome_id \
                     WHERE gpf.pangenome_id = p.id AND gf.name = ${idx})"
                )
            },
            QueryParam::String(genome.clone()),
        );
    }
    filters.taxon(&query.taxon, "pangenome_taxon", "pangenome_id", "p.id");
    Ok(filters)
}

/// Member filters; `$1` is taken by the pangenome id.
fn member_filters(pangenome_id: Uuid, query: &MemberQuery) -> Result<FilterBuilder> {
    query.validate()?;

    let mut filters = FilterBuilder::new();
    filters.push(
        |idx| format!("gp.pangenome_id = ${idx}"),
        QueryParam::Uuid(pangenome_id),
    );
    if let Some(name) = &query.genome_name {
        filters.push(
            |idx| format!("g.name = ${idx}"),
            QueryParam::String(name.clone()),
        );
    }
    match (&query.metadata_key, &query.metadata_value) {
        (Some(key), Some(value)) => {
            filters.push_pair(
                |k, v| {
                    format!(
                        "EXISTS (SELECT 1 FROM genome_pangenome_metadata mf \
                         WHERE mf.genome_pangenome_id = gp.id AND mf.key = ${k} AND mf.value = ${v})"
                    )
                },
                QueryParam::String(key.clone()),
                QueryParam::String(value.clone()),
            );
        }
        (Some(key), None) => {
            filters.push(
                |k| {
                    format!(
                        "EXISTS (SELECT 1 FROM genome_pangenome_metadata mf \
                         WHERE mf.genome_pangenome_id = gp.id AND mf.key = ${k})"
                    )
                },
                QueryParam::String(key.clone()),
            );
        }
        _ => {}
    }
    Ok(filters)
}

/// PostgreSQL implementation of PangenomeRepository.
#[derive(Clone)]
pub struct PgPangenomeRepository {
    pool: Pool<Postgres>,
    taxonomy: PgTaxonomyRepository,
    metadata: PgMetadataRepository,
    chunk_size: usize,
}

impl PgPangenomeRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            taxonomy: PgTaxonomyRepository::new(pool.clone()),
            metadata: PgMetadataRepository::new(pool.clone()),
            pool,
            chunk_size: INSERT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self.metadata = self.metadata.with_chunk_size(self.chunk_size);
        self
    }

    // ==========================================================================
    // WRITES
    // ==========================================================================

    /// File names of the pangenomes already recorded for a release.
    pub async fn existing_file_names_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        collection_release_id: Uuid,
    ) -> Result<HashSet<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT file_name FROM pangenome WHERE collection_release_id = $1")
                .bind(collection_release_id)
                .fetch_all(&mut **tx)
                .await
                .map_err(Error::Database)?;
        Ok(names.into_iter().collect())
    }

    /// Create a pangenome, link its member genomes, attach its
    /// representative taxa and store its member metadata.
    ///
    /// Every member must be present in `genomes`.
    pub async fn create_pangenome_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        collection_release_id: Uuid,
        input: &NewPangenome,
        genomes: &HashMap<String, Genome>,
        representative: &[&Taxon],
    ) -> Result<Pangenome> {
        let pangenome = Pangenome {
            id: new_v7(),
            collection_release_id,
            name: input.name.clone(),
            file_name: input.file_name.clone(),
            file_md5sum: input.file_md5sum.clone(),
            annotation_source: input.annotation_source.clone(),
            metrics: input.metrics,
        };
        self.insert_pangenome_row_tx(tx, &pangenome).await?;

        let mut members = Vec::with_capacity(input.members.len());
        for member in &input.members {
            let genome = genomes.get(&member.genome_name).ok_or_else(|| {
                Error::Internal(format!(
                    "genome '{}' of pangenome '{}' was not resolved",
                    member.genome_name, input.name
                ))
            })?;
            members.push((new_v7(), genome.id, member));
        }

        let columns = format!(
            "INSERT INTO genome_pangenome (id, genome_id, pangenome_id, genome_file_name, \
             genome_file_md5sum, {}) ",
            MEMBER_METRIC_COLUMNS.join(", ")
        );
        for chunk in members.chunks(member_chunk_size(self.chunk_size)) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(&columns);
            qb.push_values(chunk, |mut b, (link_id, genome_id, member)| {
                let m = &member.metrics;
                b.push_bind(*link_id)
                    .push_bind(*genome_id)
                    .push_bind(pangenome.id)
                    .push_bind(member.genome_file_name.clone())
                    .push_bind(member.genome_file_md5sum.clone())
                    .push_bind(m.contigs)
                    .push_bind(m.genes)
                    .push_bind(m.fragmented_genes)
                    .push_bind(m.families)
                    .push_bind(m.families_with_fragments)
                    .push_bind(m.families_in_multicopy)
                    .push_bind(m.soft_core_families)
                    .push_bind(m.soft_core_genes)
                    .push_bind(m.exact_core_families)
                    .push_bind(m.exact_core_genes)
                    .push_bind(m.persistent_genes)
                    .push_bind(m.persistent_fragmented_genes)
                    .push_bind(m.persistent_families)
                    .push_bind(m.persistent_families_with_fragments)
                    .push_bind(m.persistent_families_in_multicopy)
                    .push_bind(m.shell_genes)
                    .push_bind(m.shell_fragmented_genes)
                    .push_bind(m.shell_families)
                    .push_bind(m.shell_families_with_fragments)
                    .push_bind(m.shell_families_in_multicopy)
                    .push_bind(m.cloud_genes)
                    .push_bind(m.cloud_fragmented_genes)
                    .push_bind(m.cloud_families)
                    .push_bind(m.cloud_families_with_fragments)
                    .push_bind(m.cloud_families_in_multicopy)
                    .push_bind(m.completeness)
                    .push_bind(m.contamination)
                    .push_bind(m.fragmentation)
                    .push_bind(m.rgps)
                    .push_bind(m.spots)
                    .push_bind(m.modules);
            });
            qb.build()
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?;

            debug!(
                subsystem = "database",
                component = "pangenomes",
                op = "insert_members",
                db_table = "genome_pangenome",
                chunk_size = chunk.len(),
                "Inserted pangenome member chunk"
            );
        }

        let taxon_ids: Vec<Uuid> = representative.iter().map(|t| t.id).collect();
        self.insert_pangenome_taxa_tx(tx, pangenome.id, &taxon_ids)
            .await?;

        let links: HashMap<&str, Uuid> = members
            .iter()
            .map(|(link_id, _, member)| (member.genome_name.as_str(), *link_id))
            .collect();
        for table in &input.metadata {
            let source_id = self
                .metadata
                .get_or_create_member_source_tx(tx, &table.source)
                .await?;
            let entries: Vec<(Uuid, &str, &str)> = table
                .rows
                .iter()
                .filter_map(|row| links.get(row.genome_name.as_str()).map(|l| (*l, row)))
                .flat_map(|(link_id, row)| {
                    row.entries
                        .iter()
                        .map(move |(k, v)| (link_id, k.as_str(), v.as_str()))
                })
                .collect();
            self.metadata
                .insert_member_metadata_tx(tx, source_id, &entries)
                .await?;
        }

        info!(
            subsystem = "database",
            component = "pangenomes",
            op = "create_pangenome",
            pangenome = %pangenome.name,
            genome_count = members.len(),
            representative_depth = representative.len(),
            metadata_sources = input.metadata.len(),
            "Created pangenome"
        );
        Ok(pangenome)
    }

    async fn insert_pangenome_row_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        p: &Pangenome,
    ) -> Result<()> {
        let m = &p.metrics;
        sqlx::query(
            "INSERT INTO pangenome (
                id, collection_release_id, name, file_name, file_md5sum, annotation_source,
                gene_count, genome_count, family_count, edge_count,
                persistent_family_count, persistent_family_min_genome_frequency,
                persistent_family_max_genome_frequency, persistent_family_std_genome_frequency,
                persistent_family_mean_genome_frequency,
                shell_family_count, shell_family_min_genome_frequency,
                shell_family_max_genome_frequency, shell_family_std_genome_frequency,
                shell_family_mean_genome_frequency,
                cloud_family_count, cloud_family_min_genome_frequency,
                cloud_family_max_genome_frequency, cloud_family_std_genome_frequency,
                cloud_family_mean_genome_frequency,
                partition_count, rgp_count, spot_count, module_count, family_in_module_count
             ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20,
                $21, $22, $23, $24, $25, $26, $27, $28, $29, $30
             )",
        )
        .bind(p.id)
        .bind(p.collection_release_id)
        .bind(&p.name)
        .bind(&p.file_name)
        .bind(&p.file_md5sum)
        .bind(&p.annotation_source)
        .bind(m.gene_count)
        .bind(m.genome_count)
        .bind(m.family_count)
        .bind(m.edge_count)
        .bind(m.persistent.family_count)
        .bind(m.persistent.min_genome_frequency)
        .bind(m.persistent.max_genome_frequency)
        .bind(m.persistent.std_genome_frequency)
        .bind(m.persistent.mean_genome_frequency)
        .bind(m.shell.family_count)
        .bind(m.shell.min_genome_frequency)
        .bind(m.shell.max_genome_frequency)
        .bind(m.shell.std_genome_frequency)
        .bind(m.shell.mean_genome_frequency)
        .bind(m.cloud.family_count)
        .bind(m.cloud.min_genome_frequency)
        .bind(m.cloud.max_genome_frequency)
        .bind(m.cloud.std_genome_frequency)
        .bind(m.cloud.mean_genome_frequency)
        .bind(m.partition_count)
        .bind(m.rgp_count)
        .bind(m.spot_count)
        .bind(m.module_count)
        .bind(m.family_in_module_count)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn insert_pangenome_taxa_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        pangenome_id: Uuid,
        taxon_ids: &[Uuid],
    ) -> Result<()> {
        if taxon_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO pangenome_taxon (pangenome_id, taxon_id)
             SELECT $1, t FROM UNNEST($2::uuid[]) AS t
             ON CONFLICT DO NOTHING",
        )
        .bind(pangenome_id)
        .bind(taxon_ids)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Recompute a pangenome's representative taxa from its members'
    /// persisted taxon chains.
    ///
    /// `taxonomy_source_id` defaults to the source of the pangenome's release.
    /// The stored links are only rewritten when `apply` is set.
    pub async fn recompute_representative_taxa(
        &self,
        pangenome_id: Uuid,
        taxonomy_source_id: Option<Uuid>,
        apply: bool,
    ) -> Result<RepresentativeTaxaReport> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let release_source: Option<Uuid> = sqlx::query_scalar(
            "SELECT cr.taxonomy_source_id FROM pangenome p
             JOIN collection_release cr ON cr.id = p.collection_release_id
             WHERE p.id = $1",
        )
        .bind(pangenome_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;
        let release_source =
            release_source.ok_or_else(|| Error::NotFound(format!("pangenome {}", pangenome_id)))?;
        let source_id = taxonomy_source_id.unwrap_or(release_source);

        let member_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT genome_id FROM genome_pangenome WHERE pangenome_id = $1")
                .bind(pangenome_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(Error::Database)?;

        let rows = sqlx::query(&format!(
            "SELECT gt.genome_id AS owner_id, {TAXON_COLUMNS}
             FROM genome_taxon gt
             JOIN taxon t ON t.id = gt.taxon_id
             WHERE gt.genome_id = ANY($1) AND t.taxonomy_source_id = $2
             ORDER BY t.depth"
        ))
        .bind(&member_ids)
        .bind(source_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let mut chains: BTreeMap<Uuid, Vec<Taxon>> =
            member_ids.iter().map(|id| (*id, Vec::new())).collect();
        for r in &rows {
            if let Some(chain) = chains.get_mut(&r.get::<Uuid, _>("owner_id")) {
                chain.push(taxon_from_row(r));
            }
        }
        let chains: Vec<Vec<Taxon>> = chains.into_values().collect();
        let recomputed = common_ancestor_taxa(&chains)?;

        let stored_rows = sqlx::query(&format!(
            "SELECT {TAXON_COLUMNS}
             FROM pangenome_taxon pt
             JOIN taxon t ON t.id = pt.taxon_id
             WHERE pt.pangenome_id = $1 AND t.taxonomy_source_id = $2
             ORDER BY t.depth"
        ))
        .bind(pangenome_id)
        .bind(source_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;
        let stored: Vec<Taxon> = stored_rows.iter().map(taxon_from_row).collect();

        let mut report = RepresentativeTaxaReport {
            pangenome_id,
            taxonomy_source_id: source_id,
            stored,
            recomputed,
            applied: false,
        };

        if apply && report.changed() {
            sqlx::query(
                "DELETE FROM pangenome_taxon pt USING taxon t
                 WHERE pt.taxon_id = t.id AND pt.pangenome_id = $1 AND t.taxonomy_source_id = $2",
            )
            .bind(pangenome_id)
            .bind(source_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

            let ids: Vec<Uuid> = report.recomputed.iter().map(|t| t.id).collect();
            self.insert_pangenome_taxa_tx(&mut tx, pangenome_id, &ids)
                .await?;
            tx.commit().await.map_err(Error::Database)?;
            report.applied = true;
        }

        info!(
            subsystem = "database",
            component = "pangenomes",
            op = "recompute_representative_taxa",
            pangenome_id = %pangenome_id,
            member_count = member_ids.len(),
            stored = report.stored.len(),
            recomputed = report.recomputed.len(),
            applied = report.applied,
            "Recomputed representative taxa"
        );
        Ok(report)
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    async fn summaries(&self, rows: &[PgRow]) -> Result<Vec<PangenomeSummary>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.get("id")).collect();
        let taxa = self.taxonomy.taxa_of_pangenomes(&ids).await?;
        let mut taxonomies = self.taxonomy.group_by_source(taxa).await?;

        Ok(rows
            .iter()
            .map(|r| {
                let pangenome = pangenome_from_row(r);
                let collection_release = release_summary_from_row(r);
                let source_id = collection_release.release.taxonomy_source_id;
                let taxonomy = taxonomies
                    .remove(&pangenome.id)
                    .unwrap_or_default()
                    .into_iter()
                    .find(|t: &Taxonomy| t.taxonomy_source.id == source_id);
                PangenomeSummary {
                    pangenome,
                    collection_release,
                    taxonomy,
                }
            })
            .collect())
    }
}

#[async_trait]
impl PangenomeRepository for PgPangenomeRepository {
    async fn list(
        &self,
        query: &PangenomeQuery,
        page: Pagination,
    ) -> Result<Vec<PangenomeSummary>> {
        page.validate()?;
        let filters = pangenome_filters(query)?;

        let limit_idx = filters.next_index();
        let sql = format!(
            "SELECT {PANGENOME_COLUMNS}, {RELEASE_SUMMARY_COLUMNS}
             FROM pangenome p
             JOIN collection_release cr ON cr.id = p.collection_release_id
             JOIN collection c ON c.id = cr.collection_id
             {}
             ORDER BY c.name, cr.version, p.name
             LIMIT ${} OFFSET ${}",
            filters.where_clause(),
            limit_idx,
            limit_idx + 1
        );

        let rows = bind_params(sqlx::query(&sql), filters.params())
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "pangenomes",
            op = "list",
            result_count = rows.len(),
            "Listed pangenomes"
        );
        self.summaries(&rows).await
    }

    async fn count(&self, query: &PangenomeQuery) -> Result<i64> {
        let filters = pangenome_filters(query)?;
        let sql = format!(
            "SELECT COUNT(*) FROM pangenome p
             JOIN collection_release cr ON cr.id = p.collection_release_id
             JOIN collection c ON c.id = cr.collection_id
             {}",
            filters.where_clause()
        );
        let row = bind_params(sqlx::query(&sql), filters.params())
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get(0))
    }

    async fn get(&self, id: Uuid) -> Result<Option<PangenomeSummary>> {
        let row = sqlx::query(&format!(
            "SELECT {PANGENOME_COLUMNS}, {RELEASE_SUMMARY_COLUMNS}
             FROM pangenome p
             JOIN collection_release cr ON cr.id = p.collection_release_id
             JOIN collection c ON c.id = cr.collection_id
             WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(r) => Ok(self.summaries(std::slice::from_ref(&r)).await?.pop()),
            None => Ok(None),
        }
    }

    async fn members(
        &self,
        pangenome_id: Uuid,
        query: &MemberQuery,
        page: Pagination,
    ) -> Result<Vec<GenomeInPangenome>> {
        page.validate()?;
        let filters = member_filters(pangenome_id, query)?;

        let limit_idx = filters.next_index();
        let sql = format!(
            "SELECT gp.id, gp.genome_id, g.name AS genome_name, gp.pangenome_id,
                    gp.genome_file_name, gp.genome_file_md5sum, {}
             FROM genome_pangenome gp
             JOIN genome g ON g.id = gp.genome_id
             {}
             ORDER BY g.name
             LIMIT ${} OFFSET ${}",
            MEMBER_METRIC_COLUMNS
                .iter()
                .map(|c| format!("gp.{c}"))
                .collect::<Vec<_>>()
                .join(", "),
            filters.where_clause(),
            limit_idx,
            limit_idx + 1
        );

        let rows = bind_params(sqlx::query(&sql), filters.params())
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut members: Vec<GenomeInPangenome> = rows.iter().map(member_from_row).collect();
        let link_ids: Vec<Uuid> = members.iter().map(|m| m.id).collect();
        let mut metadata = self.metadata.metadata_of_members(&link_ids).await?;
        for member in &mut members {
            member.genome_metadata = metadata.remove(&member.id).unwrap_or_default();
        }
        Ok(members)
    }

    async fn file_path(&self, pangenome_id: Uuid) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT cr.pangenomes_directory, p.file_name
             FROM pangenome p
             JOIN collection_release cr ON cr.id = p.collection_release_id
             WHERE p.id = $1",
        )
        .bind(pangenome_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| {
            let directory: String = r.get("pangenomes_directory");
            let file_name: String = r.get("file_name");
            format!("{}/{}", directory.trim_end_matches('/'), file_name)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_chunk_size_respects_bind_limit() {
        assert_eq!(member_chunk_size(5000), MAX_BIND_PARAMS / MEMBER_COLUMN_COUNT);
        assert_eq!(member_chunk_size(100), 100);
        assert_eq!(member_chunk_size(0), 1);
        assert!(member_chunk_size(usize::MAX) * MEMBER_COLUMN_COUNT <= MAX_BIND_PARAMS);
    }

    #[test]
    fn test_member_columns_match_bound_values() {
        assert_eq!(MEMBER_METRIC_COLUMNS.len() + 5, MEMBER_COLUMN_COUNT);
    }

    #[test]
    fn test_member_filters_with_metadata_pair() {
        let query = MemberQuery {
            genome_name: Some("GCF_1".to_string()),
            metadata_key: Some("host".to_string()),
            metadata_value: Some("human".to_string()),
        };
        let filters = member_filters(Uuid::nil(), &query).unwrap();
        let sql = filters.where_clause();
        assert!(sql.starts_with("WHERE gp.pangenome_id = $1 AND g.name = $2"));
        assert!(sql.contains("mf.key = $3 AND mf.value = $4"));
        assert_eq!(filters.next_index(), 5);
    }

    #[test]
    fn test_member_filters_key_only_and_value_only() {
        let key_only = MemberQuery {
            metadata_key: Some("host".to_string()),
            ..MemberQuery::default()
        };
        let sql = member_filters(Uuid::nil(), &key_only).unwrap().where_clause();
        assert!(sql.contains("mf.key = $2)"));
        assert!(!sql.contains("mf.value"));

        let value_only = MemberQuery {
            metadata_value: Some("human".to_string()),
            ..MemberQuery::default()
        };
        assert!(matches!(
            member_filters(Uuid::nil(), &value_only),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_pangenome_filters_shared_by_list_and_count() {
        let query = PangenomeQuery {
            collection_name: Some("GTDB_refseq".to_string()),
            only_latest_release: true,
            ..PangenomeQuery::default()
        };
        let filters = pangenome_filters(&query).unwrap();
        assert_eq!(filters.where_clause(), "WHERE c.name = $1 AND cr.latest");

        let short_taxon = PangenomeQuery {
            taxon: pangbank_core::TaxonFilter {
                taxon_name: Some("ab".to_string()),
                substring_match: true,
            },
            ..PangenomeQuery::default()
        };
        assert!(pangenome_filters(&short_taxon).is_err());
    }

    fn taxon(name: &str, depth: i32) -> Taxon {
        Taxon {
            id: new_v7(),
            taxonomy_source_id: Uuid::nil(),
            name: name.to_string(),
            rank: "Rank".to_string(),
            depth,
            taxid: None,
        }
    }

    #[test]
    fn test_report_changed_ignores_order() {
        let a = taxon("Bacteria", 0);
        let b = taxon("Pseudomonadota", 1);
        let report = RepresentativeTaxaReport {
            pangenome_id: Uuid::nil(),
            taxonomy_source_id: Uuid::nil(),
            stored: vec![a.clone(), b.clone()],
            recomputed: vec![b.clone(), a.clone()],
            applied: false,
        };
        assert!(!report.changed());

        let shrunk = RepresentativeTaxaReport {
            recomputed: vec![a],
            ..report
        };
        assert!(shrunk.changed());
    }
}
