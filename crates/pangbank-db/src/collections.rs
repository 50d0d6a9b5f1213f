//! Collection and release repository.
//!
//! A collection is identified by its name, a release by `(collection,
//! version)`. Exactly one release per collection carries the `latest` flag:
//! the one with the highest version.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use pangbank_core::{
    check_release_consistency, new_v7, parse_release_version, select_latest, sort_newest_first,
    Collection, CollectionInput, CollectionRelease, CollectionReleaseSummary,
    CollectionRepository, CollectionWithReleases, Error, NewCollectionRelease, Result,
    TaxonomySource,
};

/// Release columns plus collection name and pangenome count; expects
/// `collection_release cr JOIN collection c`.
pub(crate) const RELEASE_SUMMARY_COLUMNS: &str = "cr.id AS release_id, cr.collection_id, \
     cr.taxonomy_source_id, cr.version, cr.ppanggolin_version, cr.pangbank_wf_version, \
     cr.mash_version, cr.release_note, cr.date, cr.mash_sketch, cr.mash_sketch_md5sum, \
     cr.pangenomes_directory, cr.latest, c.name AS collection_name, \
     (SELECT COUNT(*) FROM pangenome pc WHERE pc.collection_release_id = cr.id) AS pangenome_count";

const RELEASE_COLUMNS: &str = "id AS release_id, collection_id, taxonomy_source_id, version, \
     ppanggolin_version, pangbank_wf_version, mash_version, release_note, date, mash_sketch, \
     mash_sketch_md5sum, pangenomes_directory, latest";

fn release_from_row(r: &PgRow) -> CollectionRelease {
    CollectionRelease {
        id: r.get("release_id"),
        collection_id: r.get("collection_id"),
        taxonomy_source_id: r.get("taxonomy_source_id"),
        version: r.get("version"),
        ppanggolin_version: r.get("ppanggolin_version"),
        pangbank_wf_version: r.get("pangbank_wf_version"),
        mash_version: r.get("mash_version"),
        release_note: r.get("release_note"),
        date: r.get("date"),
        mash_sketch: r.get("mash_sketch"),
        mash_sketch_md5sum: r.get("mash_sketch_md5sum"),
        pangenomes_directory: r.get("pangenomes_directory"),
        latest: r.get("latest"),
    }
}

pub(crate) fn release_summary_from_row(r: &PgRow) -> CollectionReleaseSummary {
    CollectionReleaseSummary {
        release: release_from_row(r),
        collection_name: r.get("collection_name"),
        pangenome_count: r.get("pangenome_count"),
    }
}

fn collection_from_row(r: &PgRow) -> Collection {
    Collection {
        id: r.get("id"),
        name: r.get("name"),
        description: r.get("description"),
        created_at_utc: r.get("created_at_utc"),
    }
}

/// PostgreSQL implementation of CollectionRepository.
#[derive(Clone)]
pub struct PgCollectionRepository {
    pool: Pool<Postgres>,
}

impl PgCollectionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get or create a collection by name.
    pub async fn get_or_create_collection_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        input: &CollectionInput,
    ) -> Result<Collection> {
        let existing = sqlx::query(
            "SELECT id, name, description, created_at_utc FROM collection WHERE name = $1",
        )
        .bind(&input.name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if let Some(r) = existing {
            return Ok(collection_from_row(&r));
        }

        let row = sqlx::query(
            "INSERT INTO collection (id, name, description)
             VALUES ($1, $2, $3)
             RETURNING id, name, description, created_at_utc",
        )
        .bind(new_v7())
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "collections",
            op = "create_collection",
            collection = %input.name,
            "Created collection"
        );
        Ok(collection_from_row(&row))
    }

    pub async fn find_release_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        collection_id: Uuid,
        version: &str,
    ) -> Result<Option<CollectionRelease>> {
        let row = sqlx::query(&format!(
            "SELECT {RELEASE_COLUMNS} FROM collection_release
             WHERE collection_id = $1 AND version = $2"
        ))
        .bind(collection_id)
        .bind(version)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(release_from_row))
    }

    /// Get or create a release of `collection`.
    ///
    /// Re-declaring an existing release with different immutable fields fails
    /// with `ReleaseConsistency`. Returns the release and whether it was created.
    pub async fn get_or_create_release_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        collection: &Collection,
        incoming: &NewCollectionRelease,
        taxonomy_source: &TaxonomySource,
    ) -> Result<(CollectionRelease, bool)> {
        parse_release_version(&incoming.version)?;

        if let Some(existing) = self
            .find_release_tx(tx, collection.id, &incoming.version)
            .await?
        {
            check_release_consistency(&collection.name, &existing, incoming, taxonomy_source.id)?;
            debug!(
                subsystem = "database",
                component = "collections",
                op = "get_or_create_release",
                collection = %collection.name,
                release_version = %incoming.version,
                "Release already exists"
            );
            return Ok((existing, false));
        }

        let release = CollectionRelease {
            id: new_v7(),
            collection_id: collection.id,
            taxonomy_source_id: taxonomy_source.id,
            version: incoming.version.clone(),
            ppanggolin_version: incoming.ppanggolin_version.clone(),
            pangbank_wf_version: incoming.pangbank_wf_version.clone(),
            mash_version: incoming.mash_version.clone(),
            release_note: incoming.release_note.clone(),
            date: incoming.date,
            mash_sketch: incoming.mash_sketch.clone(),
            mash_sketch_md5sum: incoming.mash_sketch_md5sum.clone(),
            pangenomes_directory: incoming.pangenomes_directory.clone(),
            latest: false,
        };

        sqlx::query(
            "INSERT INTO collection_release (
                id, collection_id, taxonomy_source_id, version, ppanggolin_version,
                pangbank_wf_version, mash_version, release_note, date, mash_sketch,
                mash_sketch_md5sum, pangenomes_directory, latest
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, FALSE)",
        )
        .bind(release.id)
        .bind(release.collection_id)
        .bind(release.taxonomy_source_id)
        .bind(&release.version)
        .bind(&release.ppanggolin_version)
        .bind(&release.pangbank_wf_version)
        .bind(&release.mash_version)
        .bind(&release.release_note)
        .bind(release.date)
        .bind(&release.mash_sketch)
        .bind(&release.mash_sketch_md5sum)
        .bind(&release.pangenomes_directory)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "collections",
            op = "create_release",
            collection = %collection.name,
            release_version = %release.version,
            taxonomy_source = %taxonomy_source.label(),
            "Created collection release"
        );
        Ok((release, true))
    }

    /// Flag the highest-version release of a collection as latest and clear
    /// the flag on the others. Returns the latest release id, if any.
    pub async fn mark_latest_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        collection_id: Uuid,
    ) -> Result<Option<Uuid>> {
        let rows = sqlx::query("SELECT id, version FROM collection_release WHERE collection_id = $1")
            .bind(collection_id)
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::Database)?;

        let releases: Vec<(Uuid, String)> = rows
            .iter()
            .map(|r| (r.get("id"), r.get("version")))
            .collect();
        let latest = select_latest(releases.iter().map(|(id, v)| (*id, v.as_str())))?;

        sqlx::query(
            "UPDATE collection_release SET latest = (id IS NOT DISTINCT FROM $2)
             WHERE collection_id = $1",
        )
        .bind(collection_id)
        .bind(latest)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "collections",
            op = "mark_latest",
            release_count = releases.len(),
            "Updated latest release flag"
        );
        Ok(latest)
    }

    /// Delete a collection and everything it owns.
    ///
    /// Genomes, taxa and taxonomy sources are shared and stay.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM collection WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("collection '{}'", name)));
        }
        info!(
            subsystem = "database",
            component = "collections",
            op = "delete_collection",
            collection = %name,
            "Deleted collection"
        );
        Ok(())
    }

    /// Delete one release and move the latest flag to the next highest version.
    pub async fn delete_release(&self, name: &str, version: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let collection_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM collection WHERE name = $1")
                .bind(name)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?;
        let collection_id =
            collection_id.ok_or_else(|| Error::NotFound(format!("collection '{}'", name)))?;

        let result =
            sqlx::query("DELETE FROM collection_release WHERE collection_id = $1 AND version = $2")
                .bind(collection_id)
                .bind(version)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "release {} of collection '{}'",
                version, name
            )));
        }

        let latest = self.mark_latest_tx(&mut tx, collection_id).await?;
        tx.commit().await.map_err(Error::Database)?;

        if latest.is_none() {
            warn!(
                subsystem = "database",
                component = "collections",
                collection = %name,
                "Collection has no release left"
            );
        }
        info!(
            subsystem = "database",
            component = "collections",
            op = "delete_release",
            collection = %name,
            release_version = %version,
            "Deleted collection release"
        );
        Ok(())
    }

    /// Release summaries of the given collections, keyed by collection id and
    /// sorted newest first.
    async fn releases_of(
        &self,
        collection_ids: &[Uuid],
        only_latest: bool,
    ) -> Result<HashMap<Uuid, Vec<CollectionReleaseSummary>>> {
        let rows = sqlx::query(&format!(
            "SELECT {RELEASE_SUMMARY_COLUMNS}
             FROM collection_release cr
             JOIN collection c ON c.id = cr.collection_id
             WHERE cr.collection_id = ANY($1) AND ($2 = FALSE OR cr.latest)"
        ))
        .bind(collection_ids)
        .bind(only_latest)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut by_collection: HashMap<Uuid, Vec<CollectionReleaseSummary>> = HashMap::new();
        for r in &rows {
            let summary = release_summary_from_row(r);
            by_collection
                .entry(summary.release.collection_id)
                .or_default()
                .push(summary);
        }
        for releases in by_collection.values_mut() {
            sort_newest_first(releases, |s| s.release.version.as_str());
        }
        Ok(by_collection)
    }

    async fn with_releases(
        &self,
        collections: Vec<Collection>,
        only_latest: bool,
    ) -> Result<Vec<CollectionWithReleases>> {
        let ids: Vec<Uuid> = collections.iter().map(|c| c.id).collect();
        let mut releases = self.releases_of(&ids, only_latest).await?;
        Ok(collections
            .into_iter()
            .map(|collection| CollectionWithReleases {
                releases: releases.remove(&collection.id).unwrap_or_default(),
                collection,
            })
            .collect())
    }
}

#[async_trait]
impl CollectionRepository for PgCollectionRepository {
    async fn list(&self, only_latest_release: bool) -> Result<Vec<CollectionWithReleases>> {
        let rows = sqlx::query(
            "SELECT id, name, description, created_at_utc FROM collection ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let collections: Vec<Collection> = rows.iter().map(collection_from_row).collect();
        debug!(
            subsystem = "database",
            component = "collections",
            op = "list",
            result_count = collections.len(),
            "Listed collections"
        );
        self.with_releases(collections, only_latest_release).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<CollectionWithReleases>> {
        let row = sqlx::query(
            "SELECT id, name, description, created_at_utc FROM collection WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(r) => Ok(self
                .with_releases(vec![collection_from_row(&r)], false)
                .await?
                .pop()),
            None => Ok(None),
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Collection>> {
        let row = sqlx::query(
            "SELECT id, name, description, created_at_utc FROM collection WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(collection_from_row))
    }
}
