//! Up-front loading and validation of a release bundle.
//!
//! A bundle is everything one ingestion run writes, read from disk and
//! checked before the first database statement. Any malformed input fails
//! here.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use pangbank_core::defaults::{
    GENOMES_MD5SUM_FILE, GENOMES_STATISTICS_FILE, PANGENOME_FILE, PANGENOME_INFO_FILE,
};
use pangbank_core::{
    parse_release_version, CollectionInput, Error, GenomeLineages, GenomeSourceInput,
    GenomeMetadataTable, NewCollectionRelease, NewPangenome, PangenomeMember, RankList, Result,
    TaxonomySourceInput,
};

use crate::descriptor::{ReleaseDescriptor, ResolvedPaths};
use crate::readers::{
    find_metadata_tables, find_variant, md5_file, metadata_source_from_file_name,
    read_genome_checksums, read_genome_list, read_genome_metadata, read_genome_statistics,
    read_lineage_table, read_pangenome_info,
};

/// A genome source and the genomes its list attributes to it.
#[derive(Debug, Clone)]
pub struct GenomeSourceBatch {
    pub source: GenomeSourceInput,
    pub genomes: Vec<String>,
}

/// Files of one pangenome directory, located but not yet read.
#[derive(Debug, Clone)]
struct PangenomeFiles {
    name: String,
    artifact: PathBuf,
    info: PathBuf,
    checksums: PathBuf,
    statistics: PathBuf,
    metadata: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ReleaseBundle {
    pub collection: CollectionInput,
    pub release: NewCollectionRelease,
    pub taxonomy: TaxonomySourceInput,
    /// Lineages of the batch genomes only.
    pub lineages: GenomeLineages,
    pub genome_sources: Vec<GenomeSourceBatch>,
    /// Pangenomes sorted by directory name.
    pub pangenomes: Vec<NewPangenome>,
    pub paths: ResolvedPaths,
}

impl ReleaseBundle {
    /// Load the descriptor at `descriptor_path` and everything it references.
    pub fn load(descriptor_path: &Path, data_dir: Option<&Path>) -> Result<Self> {
        let descriptor = ReleaseDescriptor::load(descriptor_path)?;
        let descriptor_dir = descriptor_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::from_descriptor(descriptor, descriptor_dir, data_dir)
    }

    pub fn from_descriptor(
        descriptor: ReleaseDescriptor,
        descriptor_dir: &Path,
        data_dir: Option<&Path>,
    ) -> Result<Self> {
        let start = Instant::now();
        parse_release_version(&descriptor.release.version)?;
        let ranks = RankList::parse(&descriptor.taxonomy.source.ranks)?;
        let paths = descriptor.resolve_paths(descriptor_dir, data_dir)?;

        let table = read_lineage_table(&paths.taxonomy_file, &ranks)?;
        let genome_sources = descriptor
            .genome_sources
            .iter()
            .zip(&paths.genome_source_files)
            .map(|(declared, file)| {
                Ok(GenomeSourceBatch {
                    source: declared.source.clone(),
                    genomes: read_genome_list(file)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let pangenome_files = locate_pangenomes(&paths.pangenomes_directory)?;
        let pangenomes = pangenome_files
            .iter()
            .map(read_pangenome)
            .collect::<Result<Vec<_>>>()?;

        let mash_sketch_md5sum = md5_file(&paths.mash_sketch)?;
        if let Some(declared) = &descriptor.release.mash_sketch_md5sum {
            if !declared.eq_ignore_ascii_case(&mash_sketch_md5sum) {
                warn!(
                    subsystem = "ingest",
                    component = "bundle",
                    declared = %declared,
                    computed = %mash_sketch_md5sum,
                    "Declared mash sketch checksum differs from the file, using the computed one"
                );
            }
        }

        let release = NewCollectionRelease {
            version: descriptor.release.version.clone(),
            ppanggolin_version: descriptor.release.ppanggolin_version.clone(),
            pangbank_wf_version: descriptor.release.pangbank_wf_version.clone(),
            mash_version: descriptor.release.mash_version.clone(),
            release_note: descriptor.release.release_note.clone(),
            date: descriptor.release.date,
            mash_sketch: descriptor.release.mash_sketch.display().to_string(),
            mash_sketch_md5sum,
            pangenomes_directory: descriptor.release.pangenomes_directory.display().to_string(),
        };

        let mut bundle = Self {
            collection: descriptor.collection,
            release,
            taxonomy: descriptor.taxonomy.source,
            lineages: GenomeLineages::default(),
            genome_sources,
            pangenomes,
            paths,
        };

        let batch: Vec<&str> = bundle.batch_genomes().into_iter().map(|(name, _)| name).collect();
        if let Some(missing) = batch.iter().find(|name| !table.contains(name)) {
            return Err(Error::UnknownGenomeLineage(missing.to_string()));
        }
        let genome_count = batch.len();
        let (lineages, dropped) = table.restrict_to(batch);
        if dropped > 0 {
            warn!(
                subsystem = "ingest",
                component = "bundle",
                dropped,
                "Lineage entries for genomes outside the release are ignored"
            );
        }
        bundle.lineages = lineages;

        info!(
            subsystem = "ingest",
            component = "bundle",
            collection = %bundle.collection.name,
            release_version = %bundle.release.version,
            genome_count,
            pangenome_count = bundle.pangenomes.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Loaded release bundle"
        );
        Ok(bundle)
    }

    /// Every genome of the batch with the index of the genome source that
    /// lists it.
    ///
    /// Genome lists come first, in declaration order, and the first listing
    /// source wins. Pangenome members no list names follow, without source.
    pub fn batch_genomes(&self) -> Vec<(&str, Option<usize>)> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut batch = Vec::new();
        for (idx, source) in self.genome_sources.iter().enumerate() {
            for genome in &source.genomes {
                if seen.insert(genome) {
                    batch.push((genome.as_str(), Some(idx)));
                }
            }
        }
        for pangenome in &self.pangenomes {
            for member in &pangenome.members {
                if seen.insert(&member.genome_name) {
                    batch.push((member.genome_name.as_str(), None));
                }
            }
        }
        batch
    }
}

/// Pangenome subdirectories with their required files, sorted by name.
///
/// Missing files of every directory are reported in one error.
fn locate_pangenomes(root: &Path) -> Result<Vec<PangenomeFiles>> {
    let mut dirs: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(root)
        .map_err(|e| Error::InvalidInput(format!("{}: {}", root.display(), e)))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push((entry.file_name().to_string_lossy().into_owned(), path));
        }
    }
    dirs.sort();

    let mut missing: Vec<String> = Vec::new();
    let mut located = Vec::with_capacity(dirs.len());
    for (name, dir) in dirs {
        let artifact = dir.join(PANGENOME_FILE);
        let info = dir.join(PANGENOME_INFO_FILE);
        let checksums = find_variant(&dir, GENOMES_MD5SUM_FILE);
        let statistics = find_variant(&dir, GENOMES_STATISTICS_FILE);

        for file in [&artifact, &info] {
            if !file.is_file() {
                missing.push(file.display().to_string());
            }
        }
        if checksums.is_none() {
            missing.push(dir.join(GENOMES_MD5SUM_FILE).display().to_string());
        }
        if statistics.is_none() {
            missing.push(dir.join(GENOMES_STATISTICS_FILE).display().to_string());
        }

        if let (Some(checksums), Some(statistics)) = (checksums, statistics) {
            located.push(PangenomeFiles {
                metadata: find_metadata_tables(&dir)?,
                name,
                artifact,
                info,
                checksums,
                statistics,
            });
        }
    }

    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "missing pangenome files: {}",
            missing.join(", ")
        )));
    }
    debug!(
        subsystem = "ingest",
        component = "bundle",
        pangenome_count = located.len(),
        "Located pangenome directories"
    );
    Ok(located)
}

fn read_pangenome(files: &PangenomeFiles) -> Result<NewPangenome> {
    let metrics = read_pangenome_info(&files.info)?;
    let checksums: HashMap<_, _> = read_genome_checksums(&files.checksums)?;
    let members = read_genome_statistics(&files.statistics)?
        .into_iter()
        .map(|stats| {
            let checksum =
                checksums
                    .get(&stats.genome_name)
                    .ok_or_else(|| Error::MissingChecksum {
                        pangenome: files.name.clone(),
                        genome: stats.genome_name.clone(),
                    })?;
            Ok(PangenomeMember {
                genome_file_name: checksum.file_name.clone(),
                genome_file_md5sum: checksum.md5_sum.clone(),
                genome_name: stats.genome_name,
                metrics: stats.metrics,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if checksums.len() > members.len() {
        let listed: HashSet<&str> = members.iter().map(|m| m.genome_name.as_str()).collect();
        let mut orphans: Vec<&String> = checksums
            .keys()
            .filter(|name| !listed.contains(name.as_str()))
            .collect();
        orphans.sort();
        if let Some(genome) = orphans.first() {
            return Err(Error::MissingStatistics {
                pangenome: files.name.clone(),
                genome: genome.to_string(),
            });
        }
    }

    if metrics.genome_count as usize != members.len() {
        warn!(
            subsystem = "ingest",
            component = "bundle",
            pangenome = %files.name,
            declared = metrics.genome_count,
            listed = members.len(),
            "Genome count of info.yaml differs from the statistics table"
        );
    }

    let metadata = read_member_metadata(files, &members)?;

    Ok(NewPangenome {
        name: files.name.clone(),
        file_name: format!("{}/{}", files.name, PANGENOME_FILE),
        file_md5sum: md5_file(&files.artifact)?,
        annotation_source: None,
        metrics,
        members,
        metadata,
    })
}

/// Metadata tables of one pangenome, restricted to its members.
fn read_member_metadata(
    files: &PangenomeFiles,
    members: &[PangenomeMember],
) -> Result<Vec<GenomeMetadataTable>> {
    let listed: HashSet<&str> = members.iter().map(|m| m.genome_name.as_str()).collect();
    let mut tables = Vec::with_capacity(files.metadata.len());
    for path in &files.metadata {
        let source = metadata_source_from_file_name(path)?;
        let (rows, strangers): (Vec<_>, Vec<_>) = read_genome_metadata(path)?
            .into_iter()
            .partition(|row| listed.contains(row.genome_name.as_str()));
        if !strangers.is_empty() {
            warn!(
                subsystem = "ingest",
                component = "bundle",
                pangenome = %files.name,
                metadata_source = %source,
                skipped = strangers.len(),
                first = %strangers[0].genome_name,
                "Metadata rows name genomes outside the pangenome"
            );
        }
        debug!(
            pangenome = %files.name,
            metadata_source = %source,
            rows = rows.len(),
            "Read metadata table"
        );
        tables.push(GenomeMetadataTable { source, rows });
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::tests::DESCRIPTOR;
    use crate::readers::tests::{stats_row, stats_table, INFO_YAML};
    use tempfile::TempDir;

    const TAXONOMY: &str = "\
GCF_1\tBacteria;Pseudomonadota;Gammaproteobacteria
GCF_2\tBacteria;Pseudomonadota;Alphaproteobacteria
GCF_3\tBacteria;Bacillota
GCF_UNUSED\tArchaea
";

    fn write(path: PathBuf, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn add_pangenome(root: &Path, name: &str, genomes: &[&str]) {
        let dir = root.join("pangenomes").join(name);
        write(dir.join(PANGENOME_FILE), "a");
        write(dir.join(PANGENOME_INFO_FILE), INFO_YAML);
        let mut checksums = String::from("name\tfile_name\tmd5_sum\n");
        for g in genomes {
            checksums.push_str(&format!("{g}\t{g}.gbff.gz\tmd5_{g}\n"));
        }
        write(dir.join(GENOMES_MD5SUM_FILE), &checksums);
        let rows: Vec<String> = genomes.iter().map(|g| stats_row(g, 10)).collect();
        write(dir.join(GENOMES_STATISTICS_FILE), &stats_table(&rows));
    }

    fn release_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path().join("taxonomy.tsv"), TAXONOMY);
        write(dir.path().join("refseq.txt"), "GCF_1\nGCF_2\n");
        write(dir.path().join("sketch.msh"), "");
        write(dir.path().join("descriptor.json"), DESCRIPTOR);
        add_pangenome(dir.path(), "p_gamma", &["GCF_1"]);
        add_pangenome(dir.path(), "p_all", &["GCF_1", "GCF_2", "GCF_3"]);
        dir
    }

    #[test]
    fn test_load_bundle() {
        let dir = release_dir();
        let bundle = ReleaseBundle::load(&dir.path().join("descriptor.json"), None).unwrap();

        assert_eq!(bundle.collection.name, "GTDB_refseq");
        assert_eq!(bundle.release.mash_sketch_md5sum, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(bundle.release.pangenomes_directory, "pangenomes");

        let names: Vec<&str> = bundle.pangenomes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["p_all", "p_gamma"]);
        let all = &bundle.pangenomes[0];
        assert_eq!(all.file_name, "p_all/pangenome.h5");
        assert_eq!(all.file_md5sum, "0cc175b9c0f1b6a831c399e269772661");
        assert_eq!(all.metrics.rgp_count, 42);
        assert_eq!(all.members.len(), 3);
        assert_eq!(all.members[2].genome_file_name, "GCF_3.gbff.gz");
        assert_eq!(all.members[2].genome_file_md5sum, "md5_GCF_3");
        assert_eq!(all.members[2].metrics.contigs, 10);

        assert_eq!(bundle.lineages.len(), 3);
        assert!(!bundle.lineages.contains("GCF_UNUSED"));
    }

    #[test]
    fn test_batch_genomes_attribute_first_listing_source() {
        let dir = release_dir();
        let bundle = ReleaseBundle::load(&dir.path().join("descriptor.json"), None).unwrap();
        assert_eq!(
            bundle.batch_genomes(),
            [("GCF_1", Some(0)), ("GCF_2", Some(0)), ("GCF_3", None)]
        );
    }

    #[test]
    fn test_member_without_lineage_fails() {
        let dir = release_dir();
        add_pangenome(dir.path(), "p_new", &["GCF_NEW"]);
        let err = ReleaseBundle::load(&dir.path().join("descriptor.json"), None).unwrap_err();
        assert!(matches!(err, Error::UnknownGenomeLineage(name) if name == "GCF_NEW"));
    }

    #[test]
    fn test_member_without_checksum_fails() {
        let dir = release_dir();
        let stats = dir
            .path()
            .join("pangenomes/p_gamma")
            .join(GENOMES_STATISTICS_FILE);
        write(stats, &stats_table(&[stats_row("GCF_1", 1), stats_row("GCF_2", 1)]));

        let err = ReleaseBundle::load(&dir.path().join("descriptor.json"), None).unwrap_err();
        match err {
            Error::MissingChecksum { pangenome, genome } => {
                assert_eq!(pangenome, "p_gamma");
                assert_eq!(genome, "GCF_2");
            }
            other => panic!("expected MissingChecksum, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_member_row_fails_before_any_write() {
        let dir = release_dir();
        let stats = dir
            .path()
            .join("pangenomes/p_gamma")
            .join(GENOMES_STATISTICS_FILE);
        write(stats, &stats_table(&[stats_row("GCF_1", 1), stats_row("GCF_1", 2)]));

        let err = ReleaseBundle::load(&dir.path().join("descriptor.json"), None).unwrap_err();
        match err {
            Error::InvalidInput(msg) => {
                assert!(msg.contains("p_gamma"));
                assert!(msg.contains("genome 'GCF_1' already listed on row 1"));
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_checksum_without_statistics_fails() {
        let dir = release_dir();
        let checksums = dir
            .path()
            .join("pangenomes/p_gamma")
            .join(GENOMES_MD5SUM_FILE);
        write(
            checksums,
            "name\tfile_name\tmd5_sum\nGCF_1\tGCF_1.gbff.gz\ta\nGCF_3\tGCF_3.gbff.gz\tc\n",
        );

        let err = ReleaseBundle::load(&dir.path().join("descriptor.json"), None).unwrap_err();
        match err {
            Error::MissingStatistics { pangenome, genome } => {
                assert_eq!(pangenome, "p_gamma");
                assert_eq!(genome, "GCF_3");
            }
            other => panic!("expected MissingStatistics, got {other:?}"),
        }
    }

    #[test]
    fn test_member_metadata_tables_are_read() {
        let dir = release_dir();
        let metadata = dir.path().join("pangenomes/p_all/metadata");
        write(
            metadata.join("genomes_metadata_from_biosample.tsv"),
            "Genome\thost\nGCF_2\thuman\nGCF_OTHER\tsoil\n",
        );
        write(
            metadata.join("genomes_metadata_from_gtdb.tsv"),
            "Genome\tquality\nGCF_1\thigh\n",
        );
        write(metadata.join("README"), "not a table");

        let bundle = ReleaseBundle::load(&dir.path().join("descriptor.json"), None).unwrap();
        let all = &bundle.pangenomes[0];
        let sources: Vec<&str> = all.metadata.iter().map(|t| t.source.as_str()).collect();
        assert_eq!(sources, ["biosample", "gtdb"]);
        assert_eq!(all.metadata[0].rows.len(), 1);
        assert_eq!(all.metadata[0].rows[0].genome_name, "GCF_2");
        assert_eq!(all.metadata[1].entry_count(), 1);
        assert!(bundle.pangenomes[1].metadata.is_empty());
    }

    #[test]
    fn test_malformed_metadata_table_fails() {
        let dir = release_dir();
        write(
            dir.path()
                .join("pangenomes/p_gamma/metadata/genomes_metadata_from_x.tsv"),
            "name\thost\nGCF_1\thuman\n",
        );
        let err = ReleaseBundle::load(&dir.path().join("descriptor.json"), None).unwrap_err();
        assert!(err.to_string().contains("missing 'Genome' column"));
    }

    #[test]
    fn test_missing_pangenome_files_reported_together() {
        let dir = release_dir();
        std::fs::remove_file(dir.path().join("pangenomes/p_all").join(PANGENOME_FILE)).unwrap();
        std::fs::remove_file(dir.path().join("pangenomes/p_gamma").join(PANGENOME_INFO_FILE))
            .unwrap();

        let err = ReleaseBundle::load(&dir.path().join("descriptor.json"), None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("p_all/pangenome.h5"));
        assert!(msg.contains("p_gamma/info.yaml"));
    }

    #[test]
    fn test_invalid_release_version_fails_before_reading_files() {
        let dir = TempDir::new().unwrap();
        let json = DESCRIPTOR.replace("\"1.0.0\"", "\"one\"");
        let descriptor = ReleaseDescriptor::from_json(&json).unwrap();
        let err = ReleaseBundle::from_descriptor(descriptor, dir.path(), None).unwrap_err();
        assert!(matches!(err, Error::InvalidVersion(_)));
    }
}
