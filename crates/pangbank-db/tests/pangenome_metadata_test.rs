//! Representative taxa recomputation, pangenome counts and genome metadata
//! against a migrated database.

use std::collections::{HashMap, HashSet};

use pangbank_core::{
    new_v7, parse_lineage_table, representative_taxa, Error, Genome, GenomeMetadataRow,
    GenomeMetadataSourceInput, GenomeMetadataTable, GenomeRepository, MemberQuery,
    PangenomeQuery, PangenomeRepository, Pagination, RankList, TaxonomySource,
};
use pangbank_db::test_fixtures::{
    collection_input, pangenome_input, release_input, taxonomy_source_input, test_database_url,
    unique_name,
};
use pangbank_db::{create_pool, Database};
use uuid::Uuid;

async fn setup_db() -> Database {
    let pool = create_pool(&test_database_url())
        .await
        .expect("Failed to create test pool");
    Database::new(pool)
}

struct Release {
    collection: String,
    source: TaxonomySource,
    genomes: HashMap<String, Genome>,
    pangenome_id: Uuid,
}

/// One release holding pangenome `p_gamma` over two Gammaproteobacteria,
/// plus an Alphaproteobacteria genome outside any pangenome.
async fn gamma_release(
    db: &Database,
    metadata: impl FnOnce(&[String; 3]) -> Vec<GenomeMetadataTable>,
) -> (Release, [String; 3]) {
    let ranks = RankList::parse("Domain;Phylum;Class").unwrap();
    let first = unique_name("GCF_G1");
    let second = unique_name("GCF_G2");
    let alpha = unique_name("GCF_A");
    let text = format!(
        "{first}\tBacteria;Pseudomonadota;Gammaproteobacteria\n\
         {second}\tBacteria;Pseudomonadota;Gammaproteobacteria\n\
         {alpha}\tBacteria;Pseudomonadota;Alphaproteobacteria\n"
    );
    let table = parse_lineage_table(text.as_bytes(), "test", &ranks).unwrap();
    let collection = unique_name("collection");

    let mut tx = db.begin().await.unwrap();
    let source = db
        .taxonomy
        .get_or_create_source_tx(
            &mut tx,
            &taxonomy_source_input(&unique_name("GTDB"), "Domain;Phylum;Class"),
        )
        .await
        .unwrap();
    let stored_collection = db
        .collections
        .get_or_create_collection_tx(&mut tx, &collection_input(&collection))
        .await
        .unwrap();
    let (release, _) = db
        .collections
        .get_or_create_release_tx(&mut tx, &stored_collection, &release_input("1.0"), &source)
        .await
        .unwrap();
    let lookup = db
        .taxonomy
        .materialize_tx(&mut tx, &source, &table)
        .await
        .unwrap();
    let genomes = db
        .genomes
        .ensure_genomes_tx(
            &mut tx,
            &[
                (first.clone(), None),
                (second.clone(), None),
                (alpha.clone(), None),
            ],
        )
        .await
        .unwrap();
    let batch: Vec<Genome> = genomes.values().cloned().collect();
    db.taxonomy
        .link_genomes_tx(&mut tx, &batch, &table, &lookup)
        .await
        .unwrap();

    let members = [first.as_str(), second.as_str()];
    let representative = representative_taxa(members.iter().copied(), &table, &lookup).unwrap();
    let mut input = pangenome_input("p_gamma", &members);
    let names = [first.clone(), second.clone(), alpha.clone()];
    input.metadata = metadata(&names);
    let pangenome = db
        .pangenomes
        .create_pangenome_tx(&mut tx, release.id, &input, &genomes, &representative)
        .await
        .unwrap();
    db.collections
        .mark_latest_tx(&mut tx, stored_collection.id)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    (
        Release {
            collection,
            source,
            genomes,
            pangenome_id: pangenome.id,
        },
        names,
    )
}

async fn stored_taxon_ids(db: &Database, pangenome_id: Uuid) -> HashSet<Uuid> {
    let ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT taxon_id FROM pangenome_taxon WHERE pangenome_id = $1")
            .bind(pangenome_id)
            .fetch_all(db.pool())
            .await
            .unwrap();
    ids.into_iter().collect()
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_recompute_reports_then_applies_changed_links() {
    let db = setup_db().await;
    let (release, [_, second, _]) = gamma_release(&db, |_| Vec::new()).await;
    let before = stored_taxon_ids(&db, release.pangenome_id).await;
    assert_eq!(before.len(), 3);

    // Move the second member from Gammaproteobacteria to Alphaproteobacteria.
    let second_id = release.genomes[&second].id;
    let class_id = |name: &'static str| {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM taxon WHERE taxonomy_source_id = $1 AND name = $2",
        )
        .bind(release.source.id)
        .bind(name)
        .fetch_one(db.pool())
    };
    let gamma = class_id("Gammaproteobacteria").await.unwrap();
    let alpha = class_id("Alphaproteobacteria").await.unwrap();
    sqlx::query("UPDATE genome_taxon SET taxon_id = $3 WHERE genome_id = $1 AND taxon_id = $2")
        .bind(second_id)
        .bind(gamma)
        .bind(alpha)
        .execute(db.pool())
        .await
        .unwrap();

    let report = db
        .pangenomes
        .recompute_representative_taxa(release.pangenome_id, None, false)
        .await
        .unwrap();
    assert!(report.changed());
    assert!(!report.applied);
    assert_eq!(report.taxonomy_source_id, release.source.id);
    assert_eq!(report.stored.len(), 3);
    let recomputed: Vec<&str> = report.recomputed.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(recomputed, ["Bacteria", "Pseudomonadota"]);
    assert_eq!(stored_taxon_ids(&db, release.pangenome_id).await, before);

    let applied = db
        .pangenomes
        .recompute_representative_taxa(release.pangenome_id, Some(release.source.id), true)
        .await
        .unwrap();
    assert!(applied.applied);
    let expected: HashSet<Uuid> = applied.recomputed.iter().map(|t| t.id).collect();
    assert_eq!(stored_taxon_ids(&db, release.pangenome_id).await, expected);

    let again = db
        .pangenomes
        .recompute_representative_taxa(release.pangenome_id, None, true)
        .await
        .unwrap();
    assert!(!again.changed());
    assert!(!again.applied);

    db.collections
        .delete_collection(&release.collection)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_recompute_unknown_pangenome_is_not_found() {
    let db = setup_db().await;
    let err = db
        .pangenomes
        .recompute_representative_taxa(new_v7(), None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_member_metadata_is_stored_and_filterable() {
    let db = setup_db().await;
    let source = unique_name("isolation");
    let (release, [first_name, second_name, _]) = gamma_release(&db, |[first, second, alpha]| {
        vec![GenomeMetadataTable {
            source: source.clone(),
            rows: vec![
                GenomeMetadataRow {
                    genome_name: first.clone(),
                    entries: vec![
                        ("host".to_string(), "human".to_string()),
                        ("country".to_string(), "France".to_string()),
                    ],
                },
                GenomeMetadataRow {
                    genome_name: second.clone(),
                    entries: vec![("host".to_string(), "soil".to_string())],
                },
                GenomeMetadataRow {
                    genome_name: alpha.clone(),
                    entries: vec![("host".to_string(), "water".to_string())],
                },
            ],
        }]
    })
    .await;
    let pangenome_id = release.pangenome_id;

    let members = db
        .pangenomes
        .members(pangenome_id, &MemberQuery::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(members.len(), 2);
    let first_member = members
        .iter()
        .find(|m| m.genome_name == first_name)
        .unwrap();
    let keys: Vec<&str> = first_member
        .genome_metadata
        .iter()
        .map(|e| e.key.as_str())
        .collect();
    assert_eq!(keys, ["country", "host"]);
    assert!(first_member.genome_metadata.iter().all(|e| e.source == source));

    // The genome outside the pangenome got no row.
    let stored: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM genome_pangenome_metadata m
         JOIN genome_pangenome gp ON gp.id = m.genome_pangenome_id
         WHERE gp.pangenome_id = $1",
    )
    .bind(pangenome_id)
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(stored, 3);

    let humans = db
        .pangenomes
        .members(
            pangenome_id,
            &MemberQuery {
                metadata_key: Some("host".to_string()),
                metadata_value: Some("human".to_string()),
                ..MemberQuery::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    let names: Vec<&str> = humans.iter().map(|m| m.genome_name.as_str()).collect();
    assert_eq!(names, [first_name.as_str()]);

    let with_country = db
        .pangenomes
        .members(
            pangenome_id,
            &MemberQuery {
                metadata_key: Some("country".to_string()),
                ..MemberQuery::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(with_country.len(), 1);

    let count = db
        .pangenomes
        .count(&PangenomeQuery {
            collection_name: Some(release.collection.clone()),
            ..PangenomeQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(count, 1);
    let count_with_genome = db
        .pangenomes
        .count(&PangenomeQuery {
            collection_name: Some(release.collection.clone()),
            genome_name: Some(second_name.clone()),
            only_latest_release: true,
            ..PangenomeQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(count_with_genome, 1);

    db.collections
        .delete_collection(&release.collection)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_genome_metadata_lifecycle() {
    let db = setup_db().await;
    let (release, [first, _, _]) = gamma_release(&db, |_| Vec::new()).await;
    let input = GenomeMetadataSourceInput {
        name: unique_name("ncbi_biosample"),
        version: Some("2026-01".to_string()),
        ..GenomeMetadataSourceInput::default()
    };
    let rows = vec![
        GenomeMetadataRow {
            genome_name: first.clone(),
            entries: vec![("isolation_source".to_string(), "blood".to_string())],
        },
        GenomeMetadataRow {
            genome_name: unique_name("GCF_MISSING"),
            entries: vec![("isolation_source".to_string(), "soil".to_string())],
        },
    ];

    let report = db.metadata.add_genome_metadata(&input, &rows).await.unwrap();
    assert_eq!(report.annotated_genomes, 1);
    assert_eq!(report.unknown_genomes, 1);
    assert_eq!(report.entry_count, 1);

    let updated = vec![GenomeMetadataRow {
        genome_name: first.clone(),
        entries: vec![("isolation_source".to_string(), "urine".to_string())],
    }];
    let again = db.metadata.add_genome_metadata(&input, &updated).await.unwrap();
    assert_eq!(again.source.id, report.source.id);

    let genome = db
        .genomes
        .get(release.genomes[&first].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(genome.genome_metadata.len(), 1);
    assert_eq!(genome.genome_metadata[0].value, "urine");
    assert_eq!(genome.genome_metadata[0].source, input.name);

    let sources = db.metadata.list_sources().await.unwrap();
    assert!(sources.iter().any(|s| s.id == report.source.id));

    db.metadata
        .delete_source(&input.name, input.version.as_deref())
        .await
        .unwrap();
    let genome = db
        .genomes
        .get(release.genomes[&first].id)
        .await
        .unwrap()
        .unwrap();
    assert!(genome.genome_metadata.is_empty());
    assert!(matches!(
        db.metadata.delete_source(&input.name, None).await,
        Err(Error::NotFound(_))
    ));

    db.collections
        .delete_collection(&release.collection)
        .await
        .unwrap();
}
