//! Genome repository implementation.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use pangbank_core::defaults::INSERT_CHUNK_SIZE;
use pangbank_core::{
    new_v7, Error, Genome, GenomeQuery, GenomeRepository, GenomeSource, GenomeSourceInput,
    GenomeWithTaxonomies, Pagination, Result,
};

use crate::filters::{bind_params, FilterBuilder, QueryParam};
use crate::metadata::PgMetadataRepository;
use crate::taxonomy::PgTaxonomyRepository;

fn genome_from_row(r: &PgRow) -> Genome {
    Genome {
        id: r.get("id"),
        name: r.get("name"),
        genome_source_id: r.get("genome_source_id"),
    }
}

/// PostgreSQL implementation of GenomeRepository.
#[derive(Clone)]
pub struct PgGenomeRepository {
    pool: Pool<Postgres>,
    taxonomy: PgTaxonomyRepository,
    metadata: PgMetadataRepository,
    chunk_size: usize,
}

impl PgGenomeRepository {
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
        self
    }

    /// Get or create a genome source by name.
    pub async fn get_or_create_source_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        input: &GenomeSourceInput,
    ) -> Result<GenomeSource> {
        let existing = sqlx::query(
            "SELECT id, name, version, description, source, url
             FROM genome_source WHERE name = $1",
        )
        .bind(&input.name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if let Some(r) = existing {
            return Ok(GenomeSource {
                id: r.get("id"),
                name: r.get("name"),
                version: r.get("version"),
                description: r.get("description"),
                source: r.get("source"),
                url: r.get("url"),
            });
        }

        let source = GenomeSource {
            id: new_v7(),
            name: input.name.clone(),
            version: input.version.clone(),
            description: input.description.clone(),
            source: input.source.clone(),
            url: input.url.clone(),
        };
        sqlx::query(
            "INSERT INTO genome_source (id, name, version, description, source, url)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(source.id)
        .bind(&source.name)
        .bind(&source.version)
        .bind(&source.description)
        .bind(&source.source)
        .bind(&source.url)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "genomes",
            op = "create_genome_source",
            genome_source = %source.name,
            "Created genome source"
        );
        Ok(source)
    }

    /// Resolve genomes by name, creating the missing ones.
    ///
    /// New genomes take the given source; existing genomes keep theirs.
    pub async fn ensure_genomes_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        genomes: &[(String, Option<Uuid>)],
    ) -> Result<HashMap<String, Genome>> {
        let mut by_name: HashMap<String, Genome> = HashMap::with_capacity(genomes.len());

        let names: Vec<&str> = genomes.iter().map(|(name, _)| name.as_str()).collect();
        for chunk in names.chunks(self.chunk_size) {
            let rows = sqlx::query(
                "SELECT id, name, genome_source_id FROM genome WHERE name = ANY($1)",
            )
            .bind(chunk)
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::Database)?;
            for r in &rows {
                let genome = genome_from_row(r);
                by_name.insert(genome.name.clone(), genome);
            }
        }
        let reused = by_name.len();

        let mut missing: Vec<Genome> = Vec::new();
        let mut queued: HashSet<&str> = HashSet::new();
        for (name, source_id) in genomes {
            if by_name.contains_key(name) || !queued.insert(name.as_str()) {
                continue;
            }
            missing.push(Genome {
                id: new_v7(),
                name: name.clone(),
                genome_source_id: *source_id,
            });
        }

        for chunk in missing.chunks(self.chunk_size) {
            let ids: Vec<Uuid> = chunk.iter().map(|g| g.id).collect();
            let names: Vec<&str> = chunk.iter().map(|g| g.name.as_str()).collect();
            let sources: Vec<Option<Uuid>> = chunk.iter().map(|g| g.genome_source_id).collect();
            sqlx::query(
                "INSERT INTO genome (id, name, genome_source_id)
                 SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::uuid[])",
            )
            .bind(&ids)
            .bind(&names)
            .bind(&sources)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

            debug!(
                subsystem = "database",
                component = "genomes",
                op = "insert_genomes",
                db_table = "genome",
                chunk_size = chunk.len(),
                "Inserted genome chunk"
            );
        }

        info!(
            subsystem = "database",
            component = "genomes",
            op = "ensure_genomes",
            created_count = missing.len(),
            reused_count = reused,
            "Resolved genomes"
        );
        by_name.extend(missing.into_iter().map(|g| (g.name.clone(), g)));
        Ok(by_name)
    }

    async fn with_taxonomies(&self, genomes: Vec<Genome>) -> Result<Vec<GenomeWithTaxonomies>> {
        let ids: Vec<Uuid> = genomes.iter().map(|g| g.id).collect();
        let taxa = self.taxonomy.taxa_of_genomes(&ids).await?;
        let mut taxonomies = self.taxonomy.group_by_source(taxa).await?;
        let mut metadata = self.metadata.metadata_of_genomes(&ids).await?;

        Ok(genomes
            .into_iter()
            .map(|genome| GenomeWithTaxonomies {
                taxonomies: taxonomies.remove(&genome.id).unwrap_or_default(),
                genome_metadata: metadata.remove(&genome.id).unwrap_or_default(),
                genome,
            })
            .collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM genome")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }
}

#[async_trait]
impl GenomeRepository for PgGenomeRepository {
    async fn list(
        &self,
        query: &GenomeQuery,
        page: Pagination,
    ) -> Result<Vec<GenomeWithTaxonomies>> {
        page.validate()?;
        query.taxon.validate()?;

        let mut filters = FilterBuilder::new();
        if let Some(name) = &query.genome_name {
            filters.push(
                |idx| format!("g.name = ${idx}"),
                QueryParam::String(name.clone()),
            );
        }
        filters.taxon(&query.taxon, "genome_taxon", "genome_id", "g.id");

        let limit_idx = filters.next_index();
        let sql = format!(
            "SELECT g.id, g.name, g.genome_source_id FROM genome g
             {}
             ORDER BY g.name
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
            component = "genomes",
            op = "list",
            result_count = rows.len(),
            "Listed genomes"
        );
        self.with_taxonomies(rows.iter().map(genome_from_row).collect())
            .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<GenomeWithTaxonomies>> {
        let row = sqlx::query("SELECT id, name, genome_source_id FROM genome WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        match row {
            Some(r) => Ok(self
                .with_taxonomies(vec![genome_from_row(&r)])
                .await?
                .pop()),
            None => Ok(None),
        }
    }
}
