//! Centralized default constants for PangBank.
//!
//! Crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// INGESTION
// =============================================================================

/// Rows per bulk insert statement (taxa, genomes, links).
pub const INSERT_CHUNK_SIZE: usize = 5000;

/// Delimiter between lineage fields and between declared ranks.
pub const LINEAGE_DELIMITER: char = ';';

/// Artifact file expected in every pangenome directory.
pub const PANGENOME_FILE: &str = "pangenome.h5";

/// Pangenome summary metrics file.
pub const PANGENOME_INFO_FILE: &str = "info.yaml";

/// Per-genome checksum table (plain or gzip).
pub const GENOMES_MD5SUM_FILE: &str = "genomes_md5sum.tsv";

/// Per-genome statistics table (plain or gzip).
pub const GENOMES_STATISTICS_FILE: &str = "genomes_statistics.tsv";

/// Directory of member metadata tables inside a pangenome directory.
pub const METADATA_DIR: &str = "metadata";

/// Metadata table names are `<prefix><source>.tsv[.gz]`.
pub const METADATA_FILE_PREFIX: &str = "genomes_metadata_from_";

/// Column naming the genome in a metadata table.
pub const METADATA_GENOME_COLUMN: &str = "Genome";

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for list endpoints.
pub const PAGE_LIMIT: i64 = 20;

/// Largest page size a client may request.
pub const PAGE_LIMIT_MAX: i64 = 100;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;

/// Shortest taxon name accepted as a filter.
pub const TAXON_FILTER_MIN_LEN: usize = 3;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default HTTP bind address.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default database URL when `DATABASE_URL` is unset.
pub const DATABASE_URL: &str = "postgres://localhost/pangbank";
