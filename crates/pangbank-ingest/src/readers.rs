//! Readers for the data files of a release bundle.
//!
//! Every reader accepts plain or gzip-compressed input, chosen by a `.gz`
//! suffix. Failures name the offending file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use serde::Deserialize;

use pangbank_core::defaults::{METADATA_DIR, METADATA_FILE_PREFIX, METADATA_GENOME_COLUMN};
use pangbank_core::{
    parse_lineage_table, Error, GenomeLineages, GenomeMetadataRow, GenomeMetadataTable,
    GenomeMetrics, PangenomeMetrics, PartitionMetrics, RankList, Result,
};

fn invalid(path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::InvalidInput(format!("{}: {}", path.display(), reason))
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Open a file, transparently decompressing `.gz` files.
pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| invalid(path, e))?;
    if is_gzip(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// `<dir>/<name>.gz` when present, else `<dir>/<name>` when present.
pub fn find_variant(dir: &Path, name: &str) -> Option<PathBuf> {
    let gz = dir.join(format!("{}.gz", name));
    if gz.is_file() {
        return Some(gz);
    }
    let plain = dir.join(name);
    plain.is_file().then_some(plain)
}

/// Read a `genome<TAB>lineage` table.
pub fn read_lineage_table(path: &Path, ranks: &RankList) -> Result<GenomeLineages> {
    parse_lineage_table(open_maybe_gz(path)?, &path.display().to_string(), ranks)
}

/// Read a genome list: one name per line, blank lines skipped, duplicates
/// dropped, order kept.
pub fn read_genome_list(path: &Path) -> Result<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    let mut genomes = Vec::new();
    for line in open_maybe_gz(path)?.lines() {
        let line = line.map_err(|e| invalid(path, e))?;
        let name = line.trim();
        if !name.is_empty() && seen.insert(name.to_string()) {
            genomes.push(name.to_string());
        }
    }
    Ok(genomes)
}

/// One row of a genome checksum table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenomeChecksum {
    pub name: String,
    pub file_name: String,
    pub md5_sum: String,
}

fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(false)
        .from_reader(reader)
}

/// Read a genome checksum table (`name`, `file_name`, `md5_sum`), keyed by
/// genome name. A genome may appear on one row only.
pub fn read_genome_checksums(path: &Path) -> Result<HashMap<String, GenomeChecksum>> {
    let mut checksums = HashMap::new();
    for (idx, row) in tsv_reader(open_maybe_gz(path)?)
        .deserialize::<GenomeChecksum>()
        .enumerate()
    {
        let row = row.map_err(|e| invalid(path, e))?;
        if checksums.contains_key(&row.name) {
            return Err(invalid(
                path,
                format!("row {}: genome '{}' listed twice", idx + 1, row.name),
            ));
        }
        checksums.insert(row.name.clone(), row);
    }
    Ok(checksums)
}

/// Per-genome metrics row of a statistics table.
#[derive(Debug, Clone, PartialEq)]
pub struct GenomeStatistics {
    pub genome_name: String,
    pub metrics: GenomeMetrics,
}

/// Read a genome statistics table.
///
/// Lines starting with `#` are skipped and header names lower-cased; the
/// `genome_name` column and every metric column are required. A genome may
/// appear on one row only.
pub fn read_genome_statistics(path: &Path) -> Result<Vec<GenomeStatistics>> {
    let mut content = String::new();
    for line in open_maybe_gz(path)?.lines() {
        let line = line.map_err(|e| invalid(path, e))?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        content.push_str(&line);
        content.push('\n');
    }

    let mut reader = tsv_reader(content.as_bytes());
    let headers: csv::StringRecord = reader
        .headers()
        .map_err(|e| invalid(path, e))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let name_idx = headers
        .iter()
        .position(|h| h == "genome_name")
        .ok_or_else(|| invalid(path, "missing 'genome_name' column"))?;

    let mut rows = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| invalid(path, e))?;
        let metrics: GenomeMetrics = record
            .deserialize(Some(&headers))
            .map_err(|e| invalid(path, format!("row {}: {}", idx + 1, e)))?;
        let genome_name = record
            .get(name_idx)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| invalid(path, format!("row {}: empty genome name", idx + 1)))?;
        if let Some(first) = seen.insert(genome_name.to_string(), idx + 1) {
            return Err(invalid(
                path,
                format!(
                    "row {}: genome '{}' already listed on row {}",
                    idx + 1,
                    genome_name,
                    first
                ),
            ));
        }
        rows.push(GenomeStatistics {
            genome_name: genome_name.to_string(),
            metrics,
        });
    }
    Ok(rows)
}

/// Read a genome metadata table.
///
/// The `Genome` column names the genome; every other column becomes a
/// key/value entry. Empty cells are skipped.
pub fn read_genome_metadata(path: &Path) -> Result<Vec<GenomeMetadataRow>> {
    let mut reader = tsv_reader(open_maybe_gz(path)?);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| invalid(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut distinct = std::collections::HashSet::new();
    if let Some(dup) = headers.iter().find(|h| !distinct.insert(h.as_str())) {
        return Err(invalid(path, format!("column '{}' appears twice", dup)));
    }
    let genome_idx = headers
        .iter()
        .position(|h| h == METADATA_GENOME_COLUMN)
        .ok_or_else(|| invalid(path, format!("missing '{}' column", METADATA_GENOME_COLUMN)))?;

    let mut rows = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| invalid(path, e))?;
        let genome_name = record
            .get(genome_idx)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| invalid(path, format!("row {}: empty genome name", idx + 1)))?;
        if let Some(first) = seen.insert(genome_name.to_string(), idx + 1) {
            return Err(invalid(
                path,
                format!(
                    "row {}: genome '{}' already listed on row {}",
                    idx + 1,
                    genome_name,
                    first
                ),
            ));
        }
        let entries = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(i, (_, value))| *i != genome_idx && !value.trim().is_empty())
            .map(|(_, (key, value))| (key.clone(), value.trim().to_string()))
            .collect();
        rows.push(GenomeMetadataRow {
            genome_name: genome_name.to_string(),
            entries,
        });
    }
    Ok(rows)
}

/// Source name encoded in a metadata table file name.
pub fn metadata_source_from_file_name(path: &Path) -> Result<String> {
    let file_name = path
        .file_name()
        .and_then(|f| f.to_str())
        .ok_or_else(|| invalid(path, "not a metadata table"))?;
    let stem = file_name
        .strip_prefix(METADATA_FILE_PREFIX)
        .and_then(|rest| {
            rest.strip_suffix(".tsv.gz")
                .or_else(|| rest.strip_suffix(".tsv"))
        })
        .ok_or_else(|| {
            invalid(
                path,
                format!(
                    "expected '{0}<source>.tsv' or '{0}<source>.tsv.gz'",
                    METADATA_FILE_PREFIX
                ),
            )
        })?;
    let source = stem.trim();
    if source.is_empty() {
        return Err(invalid(path, "empty metadata source name"));
    }
    Ok(source.to_string())
}

/// Metadata tables of a pangenome directory, sorted by file name. A missing
/// `metadata` directory yields none.
pub fn find_metadata_tables(pangenome_dir: &Path) -> Result<Vec<PathBuf>> {
    let dir = pangenome_dir.join(METADATA_DIR);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut tables = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(|e| invalid(&dir, e))? {
        let path = entry.map_err(|e| invalid(&dir, e))?.path();
        let is_table = path
            .file_name()
            .and_then(|f| f.to_str())
            .is_some_and(|f| f.starts_with(METADATA_FILE_PREFIX));
        if is_table && path.is_file() {
            tables.push(path);
        }
    }
    tables.sort();
    Ok(tables)
}

/// Read every metadata table of a pangenome directory.
pub fn read_metadata_tables(pangenome_dir: &Path) -> Result<Vec<GenomeMetadataTable>> {
    find_metadata_tables(pangenome_dir)?
        .iter()
        .map(|path| {
            Ok(GenomeMetadataTable {
                source: metadata_source_from_file_name(path)?,
                rows: read_genome_metadata(path)?,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct InfoFile {
    #[serde(rename = "Content")]
    content: InfoContent,
}

#[derive(Debug, Deserialize)]
struct InfoContent {
    #[serde(rename = "Genes")]
    genes: i32,
    #[serde(rename = "Genomes")]
    genomes: i32,
    #[serde(rename = "Families")]
    families: i32,
    #[serde(rename = "Edges")]
    edges: i32,
    #[serde(rename = "Persistent")]
    persistent: InfoPartition,
    #[serde(rename = "Shell")]
    shell: InfoPartition,
    #[serde(rename = "Cloud")]
    cloud: InfoPartition,
    #[serde(rename = "Number_of_partitions")]
    partitions: i32,
    #[serde(rename = "RGP", default)]
    rgp: i32,
    #[serde(rename = "Spots", default)]
    spots: i32,
    #[serde(rename = "Modules", default)]
    modules: InfoModules,
}

#[derive(Debug, Deserialize)]
struct InfoPartition {
    #[serde(rename = "Family_count")]
    family_count: i32,
    min_genomes_frequency: f64,
    max_genomes_frequency: f64,
    sd_genomes_frequency: f64,
    mean_genomes_frequency: f64,
}

impl From<InfoPartition> for PartitionMetrics {
    fn from(p: InfoPartition) -> Self {
        PartitionMetrics {
            family_count: p.family_count,
            min_genome_frequency: p.min_genomes_frequency,
            max_genome_frequency: p.max_genomes_frequency,
            std_genome_frequency: p.sd_genomes_frequency,
            mean_genome_frequency: p.mean_genomes_frequency,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct InfoModules {
    #[serde(rename = "Number_of_modules", default)]
    modules: i32,
    #[serde(rename = "Families_in_Modules", default)]
    families_in_modules: i32,
}

/// Parse the summary metrics of an `info.yaml` document.
pub fn parse_pangenome_info(yaml: &str) -> Result<PangenomeMetrics> {
    let info: InfoFile =
        serde_yaml::from_str(yaml).map_err(|e| Error::Serialization(e.to_string()))?;
    let c = info.content;
    Ok(PangenomeMetrics {
        gene_count: c.genes,
        genome_count: c.genomes,
        family_count: c.families,
        edge_count: c.edges,
        persistent: c.persistent.into(),
        shell: c.shell.into(),
        cloud: c.cloud.into(),
        partition_count: c.partitions,
        rgp_count: c.rgp,
        spot_count: c.spots,
        module_count: c.modules.modules,
        family_in_module_count: c.modules.families_in_modules,
    })
}

/// Read the summary metrics of an `info.yaml` file.
pub fn read_pangenome_info(path: &Path) -> Result<PangenomeMetrics> {
    let yaml = std::fs::read_to_string(path).map_err(|e| invalid(path, e))?;
    parse_pangenome_info(&yaml).map_err(|e| invalid(path, e))
}

/// Hex MD5 digest of a file, streamed.
pub fn md5_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| invalid(path, e))?;
    let mut context = md5::Context::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    pub(crate) const INFO_YAML: &str = "\
Status:
  Partitioned: true
Content:
  Genes: 12000
  Genomes: 3
  Families: 4500
  Edges: 4800
  Persistent:
    Family_count: 3000
    min_genomes_frequency: 1.0
    max_genomes_frequency: 1.0
    sd_genomes_frequency: 0.0
    mean_genomes_frequency: 1.0
  Shell:
    Family_count: 1000
    min_genomes_frequency: 0.33
    max_genomes_frequency: 0.67
    sd_genomes_frequency: 0.1
    mean_genomes_frequency: 0.5
  Cloud:
    Family_count: 500
    min_genomes_frequency: 0.33
    max_genomes_frequency: 0.33
    sd_genomes_frequency: 0.0
    mean_genomes_frequency: 0.33
  Number_of_partitions: 3
  RGP: 42
  Spots: 7
  Modules:
    Number_of_modules: 5
    Families_in_Modules: 30
";

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if name.ends_with(".gz") {
            let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
            enc.write_all(content.as_bytes()).unwrap();
            enc.finish().unwrap();
        } else {
            std::fs::write(&path, content).unwrap();
        }
        path
    }

    fn stats_header() -> String {
        let mut columns = vec!["Genome_name".to_string()];
        columns.extend(
            [
                "Contigs",
                "Genes",
                "Fragmented_genes",
                "Families",
                "Families_with_fragments",
                "Families_in_multicopy",
                "Soft_core_families",
                "Soft_core_genes",
                "Exact_core_families",
                "Exact_core_genes",
                "Persistent_genes",
                "Persistent_fragmented_genes",
                "Persistent_families",
                "Persistent_families_with_fragments",
                "Persistent_families_in_multicopy",
                "Shell_genes",
                "Shell_fragmented_genes",
                "Shell_families",
                "Shell_families_with_fragments",
                "Shell_families_in_multicopy",
                "Cloud_genes",
                "Cloud_fragmented_genes",
                "Cloud_families",
                "Cloud_families_with_fragments",
                "Cloud_families_in_multicopy",
                "Completeness",
                "Contamination",
                "Fragmentation",
                "RGPs",
                "Spots",
                "Modules",
            ]
            .iter()
            .map(|c| c.to_string()),
        );
        columns.join("\t")
    }

    pub(crate) fn stats_row(genome: &str, contigs: i32) -> String {
        let mut fields = vec![genome.to_string(), contigs.to_string()];
        fields.extend((0..24).map(|i| i.to_string()));
        fields.extend(["98.5", "0.4", "0.01"].iter().map(|s| s.to_string()));
        fields.extend(["3", "2", "1"].iter().map(|s| s.to_string()));
        fields.join("\t")
    }

    pub(crate) fn stats_table(rows: &[String]) -> String {
        let mut out = String::from("#ppanggolin metrics\n");
        out.push_str(&stats_header());
        out.push('\n');
        for row in rows {
            out.push_str(row);
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_gzip_and_plain_read_the_same() {
        let dir = TempDir::new().unwrap();
        let plain = write(&dir, "genomes.txt", "GCF_1\n\n GCF_2 \nGCF_1\n");
        let gz = write(&dir, "genomes.txt.gz", "GCF_1\n\n GCF_2 \nGCF_1\n");

        assert_eq!(read_genome_list(&plain).unwrap(), ["GCF_1", "GCF_2"]);
        assert_eq!(read_genome_list(&gz).unwrap(), ["GCF_1", "GCF_2"]);
    }

    #[test]
    fn test_find_variant_prefers_gzip() {
        let dir = TempDir::new().unwrap();
        assert!(find_variant(dir.path(), "genomes_md5sum.tsv").is_none());

        write(&dir, "genomes_md5sum.tsv", "name\tfile_name\tmd5_sum\n");
        assert_eq!(
            find_variant(dir.path(), "genomes_md5sum.tsv").unwrap(),
            dir.path().join("genomes_md5sum.tsv")
        );

        write(&dir, "genomes_md5sum.tsv.gz", "name\tfile_name\tmd5_sum\n");
        assert_eq!(
            find_variant(dir.path(), "genomes_md5sum.tsv").unwrap(),
            dir.path().join("genomes_md5sum.tsv.gz")
        );
    }

    #[test]
    fn test_read_lineage_table_names_file_on_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "taxonomy.tsv", "GCF_1\tBacteria;;Bacilli\n");
        let ranks = RankList::parse("Domain;Phylum;Class").unwrap();

        match read_lineage_table(&path, &ranks).unwrap_err() {
            Error::MalformedLineage {
                source_name, line, ..
            } => {
                assert!(source_name.ends_with("taxonomy.tsv"));
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_read_genome_checksums() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "genomes_md5sum.tsv.gz",
            "name\tfile_name\tmd5_sum\nGCF_1\tGCF_1.gbff.gz\tabc\nGCF_2\tGCF_2.gbff.gz\tdef\n",
        );
        let checksums = read_genome_checksums(&path).unwrap();
        assert_eq!(checksums.len(), 2);
        assert_eq!(checksums["GCF_2"].file_name, "GCF_2.gbff.gz");
        assert_eq!(checksums["GCF_2"].md5_sum, "def");
    }

    #[test]
    fn test_read_genome_checksums_rejects_duplicate_genome() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "genomes_md5sum.tsv",
            "name\tfile_name\tmd5_sum\nGCF_1\ta.gz\tabc\nGCF_1\tb.gz\tdef\n",
        );
        let err = read_genome_checksums(&path).unwrap_err();
        assert!(err.to_string().contains("row 2: genome 'GCF_1' listed twice"));
    }

    #[test]
    fn test_read_genome_statistics_lowercases_headers_and_skips_comments() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "genomes_statistics.tsv.gz",
            &stats_table(&[stats_row("GCF_1", 12), stats_row("GCF_2", 3)]),
        );

        let rows = read_genome_statistics(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].genome_name, "GCF_1");
        assert_eq!(rows[0].metrics.contigs, 12);
        assert_eq!(rows[1].metrics.contigs, 3);
        assert_eq!(rows[1].metrics.completeness, 98.5);
        assert_eq!(rows[1].metrics.modules, 1);
    }

    #[test]
    fn test_read_genome_statistics_rejects_missing_column() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "genomes_statistics.tsv", "Genome_name\tContigs\nGCF_1\t3\n");
        assert!(matches!(
            read_genome_statistics(&path),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_read_genome_statistics_rejects_duplicate_genome() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "genomes_statistics.tsv",
            &stats_table(&[
                stats_row("GCF_1", 1),
                stats_row("GCF_2", 1),
                stats_row("GCF_1", 2),
            ]),
        );
        match read_genome_statistics(&path).unwrap_err() {
            Error::InvalidInput(msg) => {
                assert!(msg.contains("genomes_statistics.tsv"));
                assert!(msg.contains("row 3"));
                assert!(msg.contains("'GCF_1' already listed on row 1"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_read_genome_metadata_skips_empty_cells() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "genomes_metadata_from_biosample.tsv.gz",
            "host\tGenome\tcountry\nhuman\tGCF_1\tFrance\n\tGCF_2\tSpain\n",
        );

        let rows = read_genome_metadata(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].genome_name, "GCF_1");
        assert_eq!(
            rows[0].entries,
            vec![
                ("host".to_string(), "human".to_string()),
                ("country".to_string(), "France".to_string()),
            ]
        );
        assert_eq!(
            rows[1].entries,
            vec![("country".to_string(), "Spain".to_string())]
        );
    }

    #[test]
    fn test_read_genome_metadata_rejects_bad_tables() {
        let dir = TempDir::new().unwrap();
        let no_genome = write(&dir, "a.tsv", "name\thost\nGCF_1\thuman\n");
        let err = read_genome_metadata(&no_genome).unwrap_err();
        assert!(err.to_string().contains("missing 'Genome' column"));

        let twice = write(&dir, "b.tsv", "Genome\thost\nGCF_1\thuman\nGCF_1\tsoil\n");
        let err = read_genome_metadata(&twice).unwrap_err();
        assert!(err.to_string().contains("row 2: genome 'GCF_1' already listed on row 1"));

        let repeated = write(&dir, "c.tsv", "Genome\thost\thost\nGCF_1\ta\tb\n");
        let err = read_genome_metadata(&repeated).unwrap_err();
        assert!(err.to_string().contains("column 'host' appears twice"));
    }

    #[test]
    fn test_metadata_source_from_file_name() {
        let source = |name: &str| metadata_source_from_file_name(Path::new(name));
        assert_eq!(source("genomes_metadata_from_biosample.tsv").unwrap(), "biosample");
        assert_eq!(
            source("metadata/genomes_metadata_from_gtdb.tsv.gz").unwrap(),
            "gtdb"
        );
        assert!(source("genomes_metadata_from_.tsv").is_err());
        assert!(source("genomes_metadata_from_x.csv").is_err());
        assert!(source("metadata_x.tsv").is_err());
    }

    #[test]
    fn test_find_metadata_tables_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        assert!(find_metadata_tables(dir.path()).unwrap().is_empty());

        std::fs::create_dir(dir.path().join("metadata")).unwrap();
        for name in [
            "genomes_metadata_from_b.tsv",
            "genomes_metadata_from_a.tsv.gz",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join("metadata").join(name), "").unwrap();
        }

        let names: Vec<String> = find_metadata_tables(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            ["genomes_metadata_from_a.tsv.gz", "genomes_metadata_from_b.tsv"]
        );
    }

    #[test]
    fn test_parse_pangenome_info() {
        let metrics = parse_pangenome_info(INFO_YAML).unwrap();
        assert_eq!(metrics.gene_count, 12000);
        assert_eq!(metrics.genome_count, 3);
        assert_eq!(metrics.persistent.family_count, 3000);
        assert_eq!(metrics.shell.mean_genome_frequency, 0.5);
        assert_eq!(metrics.cloud.min_genome_frequency, 0.33);
        assert_eq!(metrics.rgp_count, 42);
        assert_eq!(metrics.module_count, 5);
        assert_eq!(metrics.family_in_module_count, 30);
    }

    #[test]
    fn test_parse_pangenome_info_without_modules() {
        let yaml = INFO_YAML.split("  RGP:").next().unwrap();
        let metrics = parse_pangenome_info(yaml).unwrap();
        assert_eq!(metrics.partition_count, 3);
        assert_eq!(metrics.rgp_count, 0);
        assert_eq!(metrics.module_count, 0);
    }

    #[test]
    fn test_md5_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.bin", "");
        assert_eq!(md5_file(&path).unwrap(), "d41d8cd98f00b204e9800998ecf8427e");
        let path = write(&dir, "a.bin", "a");
        assert_eq!(md5_file(&path).unwrap(), "0cc175b9c0f1b6a831c399e269772661");
    }
}
