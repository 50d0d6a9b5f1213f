//! Genome metadata repository.
//!
//! Two kinds of free-form key/value metadata are stored:
//! - genome metadata, added by an operator per named and versioned source
//! - genome-in-pangenome metadata, shipped with a pangenome directory and
//!   written while the pangenome is created

use std::collections::HashMap;

use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use pangbank_core::defaults::INSERT_CHUNK_SIZE;
use pangbank_core::{
    new_v7, Error, GenomeMetadataRow, GenomeMetadataSource, GenomeMetadataSourceInput,
    MetadataEntry, Result,
};

fn source_from_row(r: &PgRow) -> GenomeMetadataSource {
    GenomeMetadataSource {
        id: r.get("id"),
        name: r.get("name"),
        version: r.get("version"),
        description: r.get("description"),
        url: r.get("url"),
    }
}

fn entry_from_row(r: &PgRow) -> (Uuid, MetadataEntry) {
    (
        r.get("owner_id"),
        MetadataEntry {
            source: r.get("source"),
            key: r.get("key"),
            value: r.get("value"),
        },
    )
}

fn group_entries(rows: &[PgRow]) -> HashMap<Uuid, Vec<MetadataEntry>> {
    let mut grouped: HashMap<Uuid, Vec<MetadataEntry>> = HashMap::new();
    for r in rows {
        let (owner, entry) = entry_from_row(r);
        grouped.entry(owner).or_default().push(entry);
    }
    grouped
}

/// Outcome of loading a genome metadata table.
#[derive(Debug, Clone)]
pub struct GenomeMetadataReport {
    pub source: GenomeMetadataSource,
    pub annotated_genomes: usize,
    pub entry_count: usize,
    /// Rows naming genomes that are not in the database.
    pub unknown_genomes: usize,
}

#[derive(Clone)]
pub struct PgMetadataRepository {
    pool: Pool<Postgres>,
    chunk_size: usize,
}

impl PgMetadataRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            chunk_size: INSERT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    // ==========================================================================
    // GENOME METADATA
    // ==========================================================================

    /// Get or create a genome metadata source by `(name, version)`.
    pub async fn get_or_create_source_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        input: &GenomeMetadataSourceInput,
    ) -> Result<GenomeMetadataSource> {
        let existing = sqlx::query(
            "SELECT id, name, version, description, url FROM genome_metadata_source
             WHERE name = $1 AND version IS NOT DISTINCT FROM $2",
        )
        .bind(&input.name)
        .bind(&input.version)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;
        if let Some(r) = existing {
            return Ok(source_from_row(&r));
        }

        let source = GenomeMetadataSource {
            id: new_v7(),
            name: input.name.clone(),
            version: input.version.clone(),
            description: input.description.clone(),
            url: input.url.clone(),
        };
        sqlx::query(
            "INSERT INTO genome_metadata_source (id, name, version, description, url)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(source.id)
        .bind(&source.name)
        .bind(&source.version)
        .bind(&source.description)
        .bind(&source.url)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "metadata",
            op = "create_metadata_source",
            metadata_source = %source.name,
            "Created genome metadata source"
        );
        Ok(source)
    }

    /// Attach metadata rows to existing genomes under one source.
    ///
    /// Rows naming unknown genomes are skipped and counted. A key already
    /// stored for a genome and source takes the new value.
    pub async fn add_genome_metadata(
        &self,
        input: &GenomeMetadataSourceInput,
        rows: &[GenomeMetadataRow],
    ) -> Result<GenomeMetadataReport> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let source = self.get_or_create_source_tx(&mut tx, input).await?;

        let names: Vec<&str> = rows.iter().map(|r| r.genome_name.as_str()).collect();
        let mut genome_ids: HashMap<String, Uuid> = HashMap::with_capacity(names.len());
        for chunk in names.chunks(self.chunk_size) {
            let found = sqlx::query("SELECT id, name FROM genome WHERE name = ANY($1)")
                .bind(chunk)
                .fetch_all(&mut *tx)
                .await
                .map_err(Error::Database)?;
            for r in &found {
                genome_ids.insert(r.get("name"), r.get("id"));
            }
        }

        let mut entries: Vec<(Uuid, &str, &str)> = Vec::new();
        let mut annotated_genomes = 0;
        for row in rows {
            let Some(genome_id) = genome_ids.get(&row.genome_name) else {
                continue;
            };
            annotated_genomes += 1;
            entries.extend(
                row.entries
                    .iter()
                    .map(|(k, v)| (*genome_id, k.as_str(), v.as_str())),
            );
        }
        let unknown_genomes = rows.len() - annotated_genomes;
        if unknown_genomes > 0 {
            warn!(
                subsystem = "database",
                component = "metadata",
                metadata_source = %source.name,
                unknown_genomes,
                "Metadata rows for unknown genomes are ignored"
            );
        }

        for chunk in entries.chunks(self.chunk_size) {
            let ids: Vec<Uuid> = chunk.iter().map(|_| new_v7()).collect();
            let genomes: Vec<Uuid> = chunk.iter().map(|(g, _, _)| *g).collect();
            let keys: Vec<&str> = chunk.iter().map(|(_, k, _)| *k).collect();
            let values: Vec<&str> = chunk.iter().map(|(_, _, v)| *v).collect();
            sqlx::query(
                "INSERT INTO genome_metadata (id, genome_id, source_id, key, value)
                 SELECT i, g, $3, k, v
                 FROM UNNEST($1::uuid[], $2::uuid[], $4::text[], $5::text[]) AS u(i, g, k, v)
                 ON CONFLICT (genome_id, source_id, key) DO UPDATE SET value = EXCLUDED.value",
            )
            .bind(&ids)
            .bind(&genomes)
            .bind(source.id)
            .bind(&keys)
            .bind(&values)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        info!(
            subsystem = "database",
            component = "metadata",
            op = "add_genome_metadata",
            metadata_source = %source.name,
            annotated_genomes,
            entry_count = entries.len(),
            "Added genome metadata"
        );
        Ok(GenomeMetadataReport {
            source,
            annotated_genomes,
            entry_count: entries.len(),
            unknown_genomes,
        })
    }

    pub async fn list_sources(&self) -> Result<Vec<GenomeMetadataSource>> {
        let rows = sqlx::query(
            "SELECT id, name, version, description, url FROM genome_metadata_source
             ORDER BY name, version NULLS FIRST",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(source_from_row).collect())
    }

    /// Delete a genome metadata source and every entry it provided.
    pub async fn delete_source(&self, name: &str, version: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM genome_metadata_source
             WHERE name = $1 AND version IS NOT DISTINCT FROM $2",
        )
        .bind(name)
        .bind(version)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "genome metadata source {}",
                pangbank_core::source_label(name, version)
            )));
        }
        info!(
            subsystem = "database",
            component = "metadata",
            op = "delete_metadata_source",
            metadata_source = %name,
            "Deleted genome metadata source"
        );
        Ok(())
    }

    /// Metadata of genomes, keyed by genome id.
    pub async fn metadata_of_genomes(
        &self,
        genome_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<MetadataEntry>>> {
        if genome_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            "SELECT gm.genome_id AS owner_id, s.name AS source, gm.key, gm.value
             FROM genome_metadata gm
             JOIN genome_metadata_source s ON s.id = gm.source_id
             WHERE gm.genome_id = ANY($1)
             ORDER BY s.name, gm.key",
        )
        .bind(genome_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(group_entries(&rows))
    }

    // ==========================================================================
    // GENOME-IN-PANGENOME METADATA
    // ==========================================================================

    /// Get or create a genome-in-pangenome metadata source by name.
    pub async fn get_or_create_member_source_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<Uuid> {
        let existing: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM genome_pangenome_metadata_source WHERE name = $1")
                .bind(name)
                .fetch_optional(&mut **tx)
                .await
                .map_err(Error::Database)?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let id = new_v7();
        sqlx::query("INSERT INTO genome_pangenome_metadata_source (id, name) VALUES ($1, $2)")
            .bind(id)
            .bind(name)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        info!(
            subsystem = "database",
            component = "metadata",
            op = "create_member_metadata_source",
            metadata_source = %name,
            "Created genome-in-pangenome metadata source"
        );
        Ok(id)
    }

    /// Insert `(genome_pangenome id, key, value)` entries of one source.
    pub async fn insert_member_metadata_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        source_id: Uuid,
        entries: &[(Uuid, &str, &str)],
    ) -> Result<()> {
        for chunk in entries.chunks(self.chunk_size) {
            let ids: Vec<Uuid> = chunk.iter().map(|_| new_v7()).collect();
            let links: Vec<Uuid> = chunk.iter().map(|(l, _, _)| *l).collect();
            let keys: Vec<&str> = chunk.iter().map(|(_, k, _)| *k).collect();
            let values: Vec<&str> = chunk.iter().map(|(_, _, v)| *v).collect();
            sqlx::query(
                "INSERT INTO genome_pangenome_metadata (id, genome_pangenome_id, source_id, key, value)
                 SELECT i, l, $3, k, v
                 FROM UNNEST($1::uuid[], $2::uuid[], $4::text[], $5::text[]) AS u(i, l, k, v)",
            )
            .bind(&ids)
            .bind(&links)
            .bind(source_id)
            .bind(&keys)
            .bind(&values)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

            debug!(
                subsystem = "database",
                component = "metadata",
                op = "insert_member_metadata",
                db_table = "genome_pangenome_metadata",
                chunk_size = chunk.len(),
                "Inserted member metadata chunk"
            );
        }
        Ok(())
    }

    /// Metadata of pangenome members, keyed by `genome_pangenome` id.
    pub async fn metadata_of_members(
        &self,
        link_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<MetadataEntry>>> {
        if link_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            "SELECT m.genome_pangenome_id AS owner_id, s.name AS source, m.key, m.value
             FROM genome_pangenome_metadata m
             JOIN genome_pangenome_metadata_source s ON s.id = m.source_id
             WHERE m.genome_pangenome_id = ANY($1)
             ORDER BY s.name, m.key",
        )
        .bind(link_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(group_entries(&rows))
    }
}
