//! Collection release rules: immutable-field consistency and version ordering.

use std::cmp::Ordering;

use semver::Version;
use uuid::Uuid;

use crate::error::{Error, FieldMismatch, Result};
use crate::models::{CollectionRelease, NewCollectionRelease};

/// Parse a release version.
///
/// Accepts `major[.minor[.patch]]` with optional pre-release and build
/// suffixes; missing numeric components read as 0.
pub fn parse_release_version(raw: &str) -> Result<Version> {
    let raw = raw.trim();
    let split = raw.find(['-', '+']).unwrap_or(raw.len());
    let (core, suffix) = raw.split_at(split);

    let mut padded = core.to_string();
    for _ in core.split('.').count()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);

    Version::parse(&padded).map_err(|e| Error::InvalidVersion(format!("'{}': {}", raw, e)))
}

/// Compare two release versions, newest last.
pub fn compare_release_versions(a: &str, b: &str) -> Result<Ordering> {
    Ok(parse_release_version(a)?.cmp(&parse_release_version(b)?))
}

/// Immutable fields of `existing` that differ from the incoming release.
pub fn release_mismatches(
    existing: &CollectionRelease,
    incoming: &NewCollectionRelease,
    incoming_taxonomy_source_id: Uuid,
) -> Vec<FieldMismatch> {
    let mut mismatches = Vec::new();
    let mut check = |field: &'static str, old: &str, new: &str| {
        if old != new {
            mismatches.push(FieldMismatch {
                field,
                existing: old.to_string(),
                incoming: new.to_string(),
            });
        }
    };

    check(
        "ppanggolin_version",
        &existing.ppanggolin_version,
        &incoming.ppanggolin_version,
    );
    check(
        "pangbank_wf_version",
        &existing.pangbank_wf_version,
        &incoming.pangbank_wf_version,
    );
    check(
        "mash_version",
        &existing.mash_version,
        &incoming.mash_version,
    );
    check(
        "taxonomy_source",
        &existing.taxonomy_source_id.to_string(),
        &incoming_taxonomy_source_id.to_string(),
    );

    mismatches
}

/// Fail with `ReleaseConsistency` when any immutable field differs.
pub fn check_release_consistency(
    collection: &str,
    existing: &CollectionRelease,
    incoming: &NewCollectionRelease,
    incoming_taxonomy_source_id: Uuid,
) -> Result<()> {
    let mismatches = release_mismatches(existing, incoming, incoming_taxonomy_source_id);
    if mismatches.is_empty() {
        return Ok(());
    }
    Err(Error::ReleaseConsistency {
        collection: collection.to_string(),
        version: existing.version.clone(),
        mismatches,
    })
}

/// Id of the release with the highest version, or `None` when there is none.
///
/// Every version must parse; a malformed one fails the selection.
pub fn select_latest<'a>(releases: impl IntoIterator<Item = (Uuid, &'a str)>) -> Result<Option<Uuid>> {
    let mut best: Option<(Version, Uuid)> = None;
    for (id, raw) in releases {
        let version = parse_release_version(raw)?;
        if best.as_ref().map_or(true, |(v, _)| version > *v) {
            best = Some((version, id));
        }
    }
    Ok(best.map(|(_, id)| id))
}

/// Sort versions newest first; unparseable versions sink to the end.
pub fn sort_newest_first<T>(items: &mut [T], version: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| {
        match (
            parse_release_version(version(a)).ok(),
            parse_release_version(version(b)).ok(),
        ) {
            (Some(va), Some(vb)) => vb.cmp(&va),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => version(a).cmp(version(b)),
        }
    });
}
