//! Structured logging schema and field name constants for PangBank.
//!
//! All crates use these names for structured `tracing` fields so that
//! ingestion runs and API requests can be queried by the same keys.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Failed ingestion run, failed request |
//! | WARN  | Recoverable issue (unused lineage entries, skipped pangenome) |
//! | INFO  | Lifecycle events, per-step ingestion counts |
//! | DEBUG | Decision points, chunk flushes, seeded index sizes |
//! | TRACE | Per-item iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "database", "ingest", "taxonomy"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "materializer", "linker", "release"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "materialize", "link_genomes", "mark_latest"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Collection name being operated on.
pub const COLLECTION: &str = "collection";

/// Release version being operated on.
pub const RELEASE_VERSION: &str = "release_version";

/// Taxonomy source name.
pub const TAXONOMY_SOURCE: &str = "taxonomy_source";

/// Pangenome name (directory name).
pub const PANGENOME: &str = "pangenome";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows inserted by an operation.
pub const CREATED_COUNT: &str = "created_count";

/// Number of existing rows reused by an operation.
pub const REUSED_COUNT: &str = "reused_count";

/// Number of rows written per bulk statement.
pub const CHUNK_SIZE: &str = "chunk_size";

/// Number of results returned by a query.
pub const RESULT_COUNT: &str = "result_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
