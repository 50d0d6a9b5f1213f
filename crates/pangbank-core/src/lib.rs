//! # pangbank-core
//!
//! Core types, traits, and the taxonomy reconciliation engine for PangBank.
//!
//! This crate performs no I/O. It provides:
//! - domain models shared by the database, ingestion and API crates
//! - the lineage parser and the taxon identity index
//! - taxon materialization, genome link planning and common-ancestor
//!   resolution
//! - release consistency and version ordering rules
//!
//! The `telemetry` feature adds the tracing subscriber setup used by the
//! binaries.

pub mod defaults;
pub mod error;
pub mod lineage;
pub mod logging;
pub mod models;
pub mod release;
pub mod taxonomy;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, FieldMismatch, Result};
pub use lineage::{parse_lineage, parse_lineage_table, GenomeLineages, Lineage, RankList};
pub use models::*;
pub use release::{
    check_release_consistency, parse_release_version, release_mismatches, select_latest,
    sort_newest_first,
};
pub use taxonomy::*;
pub use traits::*;
pub use uuid_utils::new_v7;
