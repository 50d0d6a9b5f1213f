//! # pangbank-ingest
//!
//! Release ingestion for PangBank.
//!
//! A run has two phases:
//! - [`ReleaseBundle::load`] reads the release descriptor and every file it
//!   references, and validates them without touching the database
//! - [`ingest_release`] writes the bundle in one transaction
//!
//! The `pangbank` binary wraps both, plus collection maintenance commands.

pub mod bundle;
pub mod descriptor;
pub mod pipeline;
pub mod readers;

pub use bundle::{GenomeSourceBatch, ReleaseBundle};
pub use descriptor::{ReleaseDescriptor, ResolvedPaths};
pub use pipeline::{ingest_release, IngestReport};
