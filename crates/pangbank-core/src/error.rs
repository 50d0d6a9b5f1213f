//! Error types for PangBank.

use std::fmt;

use thiserror::Error;

/// Result type alias using PangBank's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// One immutable release field whose stored value differs from the incoming one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMismatch {
    pub field: &'static str,
    pub existing: String,
    pub incoming: String,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (existing '{}', incoming '{}')",
            self.field, self.existing, self.incoming
        )
    }
}

fn join_mismatches(mismatches: &[FieldMismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Core error type for PangBank operations.
///
/// Every variant is fatal for an ingestion batch: the surrounding transaction
/// is rolled back and nothing from the batch is persisted.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A lineage table line could not be turned into a lineage
    #[error("Malformed lineage in {source_name} line {line}: {reason}")]
    MalformedLineage {
        source_name: String,
        line: usize,
        reason: String,
    },

    /// A genome of the batch has no entry in the lineage table
    #[error("Genome '{0}' has no lineage in the taxonomy table")]
    UnknownGenomeLineage(String),

    /// A genome listed in a pangenome's statistics has no checksum entry
    #[error("Genome '{genome}' of pangenome '{pangenome}' has no checksum entry")]
    MissingChecksum { pangenome: String, genome: String },

    /// A genome with a checksum entry is missing from a pangenome's statistics
    #[error("Genome '{genome}' of pangenome '{pangenome}' has a checksum entry but no statistics")]
    MissingStatistics { pangenome: String, genome: String },

    /// A taxonomy source was re-declared with a different rank list
    #[error(
        "Taxonomy source {source_name} already exists with ranks [{existing}], \
         which differ from the given ranks [{given}]"
    )]
    RankMismatch {
        source_name: String,
        existing: String,
        given: String,
    },

    /// A release was re-ingested with different immutable fields
    #[error(
        "Release {version} of collection '{collection}' already exists with different values: {}",
        join_mismatches(.mismatches)
    )]
    ReleaseConsistency {
        collection: String,
        version: String,
        mismatches: Vec<FieldMismatch>,
    },

    /// A release version could not be parsed
    #[error("Invalid release version: {0}")]
    InvalidVersion(String),

    /// A representative taxon set does not form a rank prefix
    #[error("Representative taxa are not a contiguous rank prefix: {0}")]
    NonContiguousLineage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("collection 'bacteria'".to_string());
        assert_eq!(err.to_string(), "Not found: collection 'bacteria'");
    }

    #[test]
    fn test_error_display_malformed_lineage() {
        let err = Error::MalformedLineage {
            source_name: "taxonomy.tsv".to_string(),
            line: 7,
            reason: "expected 2 tab-separated fields, found 3".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed lineage in taxonomy.tsv line 7: expected 2 tab-separated fields, found 3"
        );
    }

    #[test]
    fn test_error_display_rank_mismatch_names_both_lists() {
        let err = Error::RankMismatch {
            source_name: "GTDB (version 220)".to_string(),
            existing: "Domain;Phylum".to_string(),
            given: "Domain;Class".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("[Domain;Phylum]"));
        assert!(msg.contains("[Domain;Class]"));
    }

    #[test]
    fn test_error_display_release_consistency_names_every_field() {
        let err = Error::ReleaseConsistency {
            collection: "GTDB_refseq".to_string(),
            version: "1.0.0".to_string(),
            mismatches: vec![
                FieldMismatch {
                    field: "ppanggolin_version",
                    existing: "2.1.0".to_string(),
                    incoming: "2.2.0".to_string(),
                },
                FieldMismatch {
                    field: "mash_version",
                    existing: "2.3".to_string(),
                    incoming: "2.4".to_string(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("ppanggolin_version (existing '2.1.0', incoming '2.2.0')"));
        assert!(msg.contains("mash_version (existing '2.3', incoming '2.4')"));
    }

    #[test]
    fn test_error_display_missing_statistics() {
        let err = Error::MissingStatistics {
            pangenome: "p_gamma".to_string(),
            genome: "GCF_2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Genome 'GCF_2' of pangenome 'p_gamma' has a checksum entry but no statistics"
        );
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
