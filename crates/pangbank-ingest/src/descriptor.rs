//! Release descriptor: the JSON document naming a release and its data files.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};

use pangbank_core::{CollectionInput, Error, GenomeSourceInput, Result, TaxonomySourceInput};

/// Release fields as declared; the sketch checksum is computed at ingestion.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseInput {
    pub version: String,
    pub ppanggolin_version: String,
    pub pangbank_wf_version: String,
    pub mash_version: String,
    #[serde(default)]
    pub release_note: String,
    #[serde(deserialize_with = "date_or_datetime")]
    pub date: NaiveDateTime,
    pub mash_sketch: PathBuf,
    #[serde(default)]
    pub mash_sketch_md5sum: Option<String>,
    pub pangenomes_directory: PathBuf,
}

/// Taxonomy source plus its lineage table.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomyDeclaration {
    #[serde(flatten)]
    pub source: TaxonomySourceInput,
    pub file: PathBuf,
}

/// Genome source plus its genome list.
#[derive(Debug, Clone, Deserialize)]
pub struct GenomeSourceDeclaration {
    #[serde(flatten)]
    pub source: GenomeSourceInput,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseDescriptor {
    pub collection: CollectionInput,
    pub release: ReleaseInput,
    pub taxonomy: TaxonomyDeclaration,
    #[serde(default)]
    pub genome_sources: Vec<GenomeSourceDeclaration>,
}

/// Descriptor paths resolved to absolute locations.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPaths {
    pub data_dir: PathBuf,
    pub taxonomy_file: PathBuf,
    pub genome_source_files: Vec<PathBuf>,
    pub mash_sketch: PathBuf,
    pub pangenomes_directory: PathBuf,
}

fn date_or_datetime<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| serde::de::Error::custom(format!("invalid release date '{}'", raw)))
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl ReleaseDescriptor {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("invalid release descriptor: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
            .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))
    }

    /// Resolve every path and check that it exists.
    ///
    /// Data tables resolve against `descriptor_dir`; the mash sketch and the
    /// pangenome directory against `data_dir`, which defaults to
    /// `descriptor_dir`. All missing paths are reported in one error.
    pub fn resolve_paths(
        &self,
        descriptor_dir: &Path,
        data_dir: Option<&Path>,
    ) -> Result<ResolvedPaths> {
        let data_dir = data_dir.unwrap_or(descriptor_dir).to_path_buf();
        let resolved = ResolvedPaths {
            taxonomy_file: resolve(descriptor_dir, &self.taxonomy.file),
            genome_source_files: self
                .genome_sources
                .iter()
                .map(|g| resolve(descriptor_dir, &g.file))
                .collect(),
            mash_sketch: resolve(&data_dir, &self.release.mash_sketch),
            pangenomes_directory: resolve(&data_dir, &self.release.pangenomes_directory),
            data_dir,
        };

        let mut missing: Vec<String> = Vec::new();
        let files = std::iter::once(&resolved.taxonomy_file)
            .chain(&resolved.genome_source_files)
            .chain(std::iter::once(&resolved.mash_sketch));
        for file in files {
            if !file.is_file() {
                missing.push(file.display().to_string());
            }
        }
        if !resolved.pangenomes_directory.is_dir() {
            missing.push(resolved.pangenomes_directory.display().to_string());
        }

        if !missing.is_empty() {
            return Err(Error::InvalidInput(format!(
                "missing files: {}",
                missing.join(", ")
            )));
        }
        Ok(resolved)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) const DESCRIPTOR: &str = r#"{
        "collection": {"name": "GTDB_refseq", "description": "RefSeq genomes"},
        "release": {
            "version": "1.0.0",
            "ppanggolin_version": "2.2.0",
            "pangbank_wf_version": "0.1.0",
            "mash_version": "2.3",
            "release_note": "first release",
            "date": "2024-01-01T00:00:00",
            "mash_sketch": "sketch.msh",
            "pangenomes_directory": "pangenomes"
        },
        "taxonomy": {
            "name": "GTDB",
            "version": "220",
            "ranks": "Domain;Phylum;Class",
            "file": "taxonomy.tsv"
        },
        "genome_sources": [
            {"name": "RefSeq", "url": "https://www.ncbi.nlm.nih.gov/refseq/", "file": "refseq.txt"}
        ]
    }"#;

    #[test]
    fn test_parse_descriptor() {
        let d = ReleaseDescriptor::from_json(DESCRIPTOR).unwrap();
        assert_eq!(d.collection.name, "GTDB_refseq");
        assert_eq!(d.release.version, "1.0.0");
        assert_eq!(d.release.date.to_string(), "2024-01-01 00:00:00");
        assert!(d.release.mash_sketch_md5sum.is_none());
        assert_eq!(d.taxonomy.source.name, "GTDB");
        assert_eq!(d.taxonomy.source.version.as_deref(), Some("220"));
        assert_eq!(d.taxonomy.file, PathBuf::from("taxonomy.tsv"));
        assert_eq!(d.genome_sources.len(), 1);
        assert_eq!(d.genome_sources[0].source.name, "RefSeq");
        assert!(d.genome_sources[0].source.url.is_some());
    }

    #[test]
    fn test_date_only_release_date() {
        let json = DESCRIPTOR.replace("2024-01-01T00:00:00", "2024-03-05");
        let d = ReleaseDescriptor::from_json(&json).unwrap();
        assert_eq!(d.release.date.to_string(), "2024-03-05 00:00:00");

        let bad = DESCRIPTOR.replace("2024-01-01T00:00:00", "yesterday");
        assert!(matches!(
            ReleaseDescriptor::from_json(&bad),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_missing_files_reported_together() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("taxonomy.tsv"), "").unwrap();
        let d = ReleaseDescriptor::from_json(DESCRIPTOR).unwrap();

        let msg = match d.resolve_paths(dir.path(), None).unwrap_err() {
            Error::InvalidInput(msg) => msg,
            other => panic!("unexpected error {other:?}"),
        };
        assert!(msg.contains("refseq.txt"));
        assert!(msg.contains("sketch.msh"));
        assert!(msg.contains("pangenomes"));
        assert!(!msg.contains("taxonomy.tsv"));
    }

    #[test]
    fn test_data_dir_overrides_release_paths_only() {
        let descriptor_dir = TempDir::new().unwrap();
        let data_dir = TempDir::new().unwrap();
        std::fs::write(descriptor_dir.path().join("taxonomy.tsv"), "").unwrap();
        std::fs::write(descriptor_dir.path().join("refseq.txt"), "").unwrap();
        std::fs::write(data_dir.path().join("sketch.msh"), "").unwrap();
        std::fs::create_dir(data_dir.path().join("pangenomes")).unwrap();

        let d = ReleaseDescriptor::from_json(DESCRIPTOR).unwrap();
        let paths = d
            .resolve_paths(descriptor_dir.path(), Some(data_dir.path()))
            .unwrap();
        assert_eq!(paths.taxonomy_file, descriptor_dir.path().join("taxonomy.tsv"));
        assert_eq!(paths.mash_sketch, data_dir.path().join("sketch.msh"));
        assert_eq!(paths.pangenomes_directory, data_dir.path().join("pangenomes"));
    }
}
