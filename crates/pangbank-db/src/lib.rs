//! # pangbank-db
//!
//! PostgreSQL database layer for PangBank.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for taxonomies, genomes, genome metadata,
//!   collections and pangenomes
//! - Transactional write paths (`*_tx`) used by release ingestion
//!
//! ## Example
//!
//! ```rust,ignore
//! use pangbank_db::{Database, CollectionRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/pangbank").await?;
//!
//!     for collection in db.collections.list(true).await? {
//!         println!("{}: {} release(s)", collection.collection.name, collection.releases.len());
//!     }
//!     Ok(())
//! }
//! ```
pub mod collections;
pub mod filters;
pub mod genomes;
pub mod metadata;
pub mod pangenomes;
pub mod pool;
pub mod taxonomy;

// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use pangbank_core::*;

use sqlx::{Postgres, Transaction};

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use collections::PgCollectionRepository;
pub use filters::{bind_params, FilterBuilder, QueryParam};
pub use genomes::PgGenomeRepository;
pub use metadata::{GenomeMetadataReport, PgMetadataRepository};
pub use pangenomes::{PgPangenomeRepository, RepresentativeTaxaReport};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use taxonomy::PgTaxonomyRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Taxonomy sources, taxa and genome-taxon links.
    pub taxonomy: PgTaxonomyRepository,
    pub genomes: PgGenomeRepository,
    /// Genome and genome-in-pangenome metadata.
    pub metadata: PgMetadataRepository,
    pub collections: PgCollectionRepository,
    /// Pangenomes, members and representative taxa.
    pub pangenomes: PgPangenomeRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            taxonomy: PgTaxonomyRepository::new(pool.clone()),
            genomes: PgGenomeRepository::new(pool.clone()),
            metadata: PgMetadataRepository::new(pool.clone()),
            collections: PgCollectionRepository::new(pool.clone()),
            pangenomes: PgPangenomeRepository::new(pool.clone()),
            pool,
        }
    }

    /// Set the number of rows per bulk insert statement.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.taxonomy = self.taxonomy.with_chunk_size(chunk_size);
        self.genomes = self.genomes.with_chunk_size(chunk_size);
        self.metadata = self.metadata.with_chunk_size(chunk_size);
        self.pangenomes = self.pangenomes.with_chunk_size(chunk_size);
        self
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Begin a transaction; dropping it without commit rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(Error::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("Escherichia"), "Escherichia");
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
