//! pangbank: command-line tool for loading and maintaining PangBank releases.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

use pangbank_core::defaults;
use pangbank_core::telemetry::{init_tracing, Console};
use pangbank_core::GenomeMetadataSourceInput;
use pangbank_db::{CollectionRepository, Database, PoolConfig};
use pangbank_ingest::readers::read_genome_metadata;
use pangbank_ingest::{ingest_release, ReleaseBundle};

#[derive(Parser)]
#[command(name = "pangbank")]
#[command(author, version, about = "Load and maintain PangBank collection releases")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection URL
    #[arg(long, global = true, env = "DATABASE_URL", default_value = defaults::DATABASE_URL)]
    database_url: String,

    /// Rows per bulk insert statement
    #[arg(long, global = true, env = "PANGBANK_CHUNK_SIZE", default_value_t = defaults::INSERT_CHUNK_SIZE)]
    chunk_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a collection release from its JSON descriptor
    AddCollectionRelease {
        /// Path to the release descriptor
        descriptor: PathBuf,

        /// Directory holding the mash sketch and the pangenome directory
        /// (default: the descriptor's directory)
        #[arg(long, env = "PANGBANK_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },

    /// List collections and their releases
    ListCollections {
        /// Only show the latest release of each collection
        #[arg(long)]
        only_latest_release: bool,
    },

    /// Delete a collection, or one of its releases
    DeleteCollection {
        /// Collection name
        name: String,

        /// Delete only this release
        #[arg(long)]
        release_version: Option<String>,
    },

    /// Recompute the representative taxa of a pangenome
    RecomputeTaxonomy {
        /// Pangenome id
        pangenome_id: Uuid,

        /// Taxonomy source (default: the release's taxonomy source)
        #[arg(long)]
        taxonomy_source_id: Option<Uuid>,

        /// Rewrite the stored taxa when they differ
        #[arg(long)]
        apply: bool,
    },

    /// Manage genome metadata attached outside releases
    #[command(subcommand)]
    GenomeMetadata(GenomeMetadataCommands),

    /// Apply database migrations
    Migrate,
}

#[derive(Subcommand)]
enum GenomeMetadataCommands {
    /// Attach a metadata table (a `Genome` column plus one column per key)
    Add {
        /// Path to the TSV table (plain or gzip)
        file: PathBuf,

        /// Metadata source name
        #[arg(long)]
        source: String,

        /// Metadata source version
        #[arg(long)]
        source_version: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        url: Option<String>,
    },

    /// List metadata sources
    ListSources,

    /// Delete a metadata source and its entries
    DeleteSource {
        /// Metadata source name
        name: String,

        #[arg(long)]
        source_version: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_tracing(
        "pangbank=info,pangbank_ingest=info,pangbank_db=info",
        Console::Stderr,
    );

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn connect(cli: &Cli) -> anyhow::Result<Database> {
    let db = Database::connect_with_config(&cli.database_url, PoolConfig::from_env())
        .await
        .context("failed to connect to the database")?;
    Ok(db.with_chunk_size(cli.chunk_size))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::AddCollectionRelease {
            descriptor,
            data_dir,
        } => {
            // Validate every file before opening a connection.
            let bundle = ReleaseBundle::load(descriptor, data_dir.as_deref())
                .with_context(|| format!("invalid release bundle {}", descriptor.display()))?;
            let db = connect(&cli).await?;
            let report = ingest_release(&db, &bundle).await.with_context(|| {
                format!(
                    "failed to ingest release {} of collection '{}'",
                    bundle.release.version, bundle.collection.name
                )
            })?;
            println!(
                "{} release {} ({}): {} pangenome(s) added, {} already present, {} genome(s), {} new genome-taxon link(s)",
                report.collection,
                report.release_version,
                if report.release_created { "new" } else { "existing" },
                report.pangenomes_created,
                report.pangenomes_skipped,
                report.genome_count,
                report.new_genome_links,
            );
        }
        Commands::ListCollections {
            only_latest_release,
        } => {
            let db = connect(&cli).await?;
            let collections = db.collections.list(*only_latest_release).await?;
            if collections.is_empty() {
                println!("No collections");
            }
            for c in collections {
                println!("{}", c.collection.name);
                for r in c.releases {
                    println!(
                        "  {}{}  {}  {} pangenome(s)",
                        r.release.version,
                        if r.release.latest { " (latest)" } else { "" },
                        r.release.date.date(),
                        r.pangenome_count
                    );
                }
            }
        }
        Commands::DeleteCollection {
            name,
            release_version,
        } => {
            let db = connect(&cli).await?;
            match release_version {
                Some(version) => {
                    db.collections.delete_release(name, version).await?;
                    println!("Deleted release {} of collection '{}'", version, name);
                }
                None => {
                    db.collections.delete_collection(name).await?;
                    println!("Deleted collection '{}'", name);
                }
            }
        }
        Commands::RecomputeTaxonomy {
            pangenome_id,
            taxonomy_source_id,
            apply,
        } => {
            let db = connect(&cli).await?;
            let report = db
                .pangenomes
                .recompute_representative_taxa(*pangenome_id, *taxonomy_source_id, *apply)
                .await?;
            let names = |taxa: &[pangbank_core::Taxon]| {
                taxa.iter()
                    .map(|t| t.name.as_str())
                    .collect::<Vec<_>>()
                    .join(";")
            };
            println!("stored:     {}", names(&report.stored));
            println!("recomputed: {}", names(&report.recomputed));
            match (report.changed(), report.applied) {
                (false, _) => println!("Representative taxa are up to date"),
                (true, true) => println!("Representative taxa updated"),
                (true, false) => println!("Representative taxa differ; rerun with --apply to update"),
            }
        }
        Commands::GenomeMetadata(command) => genome_metadata(&cli, command).await?,
        Commands::Migrate => {
            let db = connect(&cli).await?;
            db.migrate().await.context("failed to apply migrations")?;
            info!("Migrations applied");
            println!("Migrations applied");
        }
    }
    Ok(())
}

async fn genome_metadata(cli: &Cli, command: &GenomeMetadataCommands) -> anyhow::Result<()> {
    match command {
        GenomeMetadataCommands::Add {
            file,
            source,
            source_version,
            description,
            url,
        } => {
            let rows = read_genome_metadata(file)
                .with_context(|| format!("invalid metadata table {}", file.display()))?;
            let input = GenomeMetadataSourceInput {
                name: source.clone(),
                version: source_version.clone(),
                description: description.clone(),
                url: url.clone(),
            };
            let db = connect(cli).await?;
            let report = db.metadata.add_genome_metadata(&input, &rows).await?;
            println!(
                "{}: {} entr(ies) on {} genome(s), {} unknown genome(s) skipped",
                report.source.name, report.entry_count, report.annotated_genomes, report.unknown_genomes
            );
        }
        GenomeMetadataCommands::ListSources => {
            let db = connect(cli).await?;
            let sources = db.metadata.list_sources().await?;
            if sources.is_empty() {
                println!("No metadata sources");
            }
            for s in sources {
                println!(
                    "{}{}",
                    s.name,
                    s.version.map(|v| format!(" {}", v)).unwrap_or_default()
                );
            }
        }
        GenomeMetadataCommands::DeleteSource {
            name,
            source_version,
        } => {
            let db = connect(cli).await?;
            db.metadata
                .delete_source(name, source_version.as_deref())
                .await?;
            println!("Deleted metadata source '{}'", name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_delete_release() {
        let cli = Cli::try_parse_from([
            "pangbank",
            "delete-collection",
            "GTDB_refseq",
            "--release-version",
            "1.0.0",
        ])
        .unwrap();
        match cli.command {
            Commands::DeleteCollection {
                name,
                release_version,
            } => {
                assert_eq!(name, "GTDB_refseq");
                assert_eq!(release_version.as_deref(), Some("1.0.0"));
            }
            _ => panic!("expected delete-collection"),
        }
    }

    #[test]
    fn test_parse_recompute_with_global_chunk_size() {
        let cli = Cli::try_parse_from([
            "pangbank",
            "recompute-taxonomy",
            "0190a7d2-0000-7000-8000-000000000001",
            "--apply",
            "--chunk-size",
            "100",
        ])
        .unwrap();
        assert_eq!(cli.chunk_size, 100);
        assert!(matches!(
            cli.command,
            Commands::RecomputeTaxonomy { apply: true, taxonomy_source_id: None, .. }
        ));
    }

    #[test]
    fn test_parse_genome_metadata_add() {
        let cli = Cli::try_parse_from([
            "pangbank",
            "genome-metadata",
            "add",
            "biosample.tsv.gz",
            "--source",
            "ncbi_biosample",
            "--source-version",
            "2026-01",
        ])
        .unwrap();
        match cli.command {
            Commands::GenomeMetadata(GenomeMetadataCommands::Add {
                file,
                source,
                source_version,
                description,
                ..
            }) => {
                assert_eq!(file, PathBuf::from("biosample.tsv.gz"));
                assert_eq!(source, "ncbi_biosample");
                assert_eq!(source_version.as_deref(), Some("2026-01"));
                assert_eq!(description, None);
            }
            _ => panic!("expected genome-metadata add"),
        }
    }

    #[test]
    fn test_genome_metadata_add_requires_source() {
        assert!(
            Cli::try_parse_from(["pangbank", "genome-metadata", "add", "biosample.tsv"]).is_err()
        );
    }
}
