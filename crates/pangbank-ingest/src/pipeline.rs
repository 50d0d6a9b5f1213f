//! Transactional ingestion of a validated release bundle.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use pangbank_core::{representative_taxa, Genome, GenomeSource, Result};
use pangbank_db::Database;

use crate::bundle::ReleaseBundle;

/// Counts of one ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub collection: String,
    pub release_version: String,
    pub release_id: Uuid,
    pub release_created: bool,
    pub genome_count: usize,
    pub taxon_count: usize,
    pub new_genome_links: usize,
    pub pangenomes_created: usize,
    pub pangenomes_skipped: usize,
    pub latest_release_id: Option<Uuid>,
}

/// Write a bundle in one transaction.
///
/// Pangenomes already recorded for the release are skipped, so a run can be
/// repeated after adding pangenome directories. Any error drops the
/// transaction and nothing is persisted.
pub async fn ingest_release(db: &Database, bundle: &ReleaseBundle) -> Result<IngestReport> {
    let start = Instant::now();
    let mut tx = db.begin().await?;

    let taxonomy_source = db
        .taxonomy
        .get_or_create_source_tx(&mut tx, &bundle.taxonomy)
        .await?;

    let mut genome_sources: Vec<GenomeSource> = Vec::with_capacity(bundle.genome_sources.len());
    for batch in &bundle.genome_sources {
        genome_sources.push(
            db.genomes
                .get_or_create_source_tx(&mut tx, &batch.source)
                .await?,
        );
    }
    let wanted: Vec<(String, Option<Uuid>)> = bundle
        .batch_genomes()
        .into_iter()
        .map(|(name, source)| (name.to_string(), source.map(|idx| genome_sources[idx].id)))
        .collect();
    let genomes: HashMap<String, Genome> = db.genomes.ensure_genomes_tx(&mut tx, &wanted).await?;

    let lookup = db
        .taxonomy
        .materialize_tx(&mut tx, &taxonomy_source, &bundle.lineages)
        .await?;
    let batch: Vec<Genome> = genomes.values().cloned().collect();
    let plan = db
        .taxonomy
        .link_genomes_tx(&mut tx, &batch, &bundle.lineages, &lookup)
        .await?;

    let collection = db
        .collections
        .get_or_create_collection_tx(&mut tx, &bundle.collection)
        .await?;
    let (release, release_created) = db
        .collections
        .get_or_create_release_tx(&mut tx, &collection, &bundle.release, &taxonomy_source)
        .await?;

    let existing = db
        .pangenomes
        .existing_file_names_tx(&mut tx, release.id)
        .await?;
    let mut created = 0;
    let mut skipped = 0;
    for pangenome in &bundle.pangenomes {
        if existing.contains(&pangenome.file_name) {
            debug!(
                subsystem = "ingest",
                component = "pipeline",
                pangenome = %pangenome.name,
                "Pangenome already recorded for this release"
            );
            skipped += 1;
            continue;
        }
        let representative = representative_taxa(
            pangenome.members.iter().map(|m| m.genome_name.as_str()),
            &bundle.lineages,
            &lookup,
        )?;
        db.pangenomes
            .create_pangenome_tx(&mut tx, release.id, pangenome, &genomes, &representative)
            .await?;
        created += 1;
    }
    if skipped > 0 {
        warn!(
            subsystem = "ingest",
            component = "pipeline",
            collection = %collection.name,
            release_version = %release.version,
            skipped,
            "Skipped pangenomes already recorded for this release"
        );
    }

    let latest = db
        .collections
        .mark_latest_tx(&mut tx, collection.id)
        .await?;
    tx.commit().await?;

    let report = IngestReport {
        collection: collection.name,
        release_version: release.version,
        release_id: release.id,
        release_created,
        genome_count: genomes.len(),
        taxon_count: lookup.len(),
        new_genome_links: plan.new_links.len(),
        pangenomes_created: created,
        pangenomes_skipped: skipped,
        latest_release_id: latest,
    };
    info!(
        subsystem = "ingest",
        component = "pipeline",
        op = "ingest_release",
        collection = %report.collection,
        release_version = %report.release_version,
        release_created = report.release_created,
        genome_count = report.genome_count,
        taxon_count = report.taxon_count,
        created_count = report.pangenomes_created,
        reused_count = report.pangenomes_skipped,
        duration_ms = start.elapsed().as_millis() as u64,
        "Ingested collection release"
    );
    Ok(report)
}
