//! Lineage parsing.
//!
//! A lineage is a `;`-delimited chain of taxon names ordered from the
//! broadest rank to the most specific one the data provides, e.g.
//! `"Bacteria;Pseudomonadota;Gammaproteobacteria"`. Positions are validated
//! against the rank list of the taxonomy source the lineage belongs to.

use std::collections::HashMap;
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use serde::Serialize;

use crate::defaults::LINEAGE_DELIMITER;
use crate::error::{Error, Result};

/// Canonical, ordered rank list of a taxonomy source.
///
/// Ranks are trimmed and title-cased, so `"domain; PHYLUM"` and
/// `"Domain;Phylum"` are the same list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankList(Vec<String>);

impl RankList {
    pub fn parse(raw: &str) -> Result<Self> {
        let ranks: Vec<String> = raw
            .split(LINEAGE_DELIMITER)
            .map(|r| title_case(r.trim()))
            .collect();

        if let Some(pos) = ranks.iter().position(|r| r.is_empty()) {
            return Err(Error::InvalidInput(format!(
                "rank list '{}' has an empty rank at position {}",
                raw, pos
            )));
        }
        Ok(Self(ranks))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rank name at `depth`.
    pub fn get(&self, depth: usize) -> Option<&str> {
        self.0.get(depth).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for RankList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(";"))
    }
}

impl FromStr for RankList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Ordered taxon names, one per rank starting at depth 0.
///
/// A lineage may stop at any rank but never skips one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lineage(Vec<String>);

impl Lineage {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// `(depth, name)` pairs from the broadest rank down.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0.iter().enumerate().map(|(d, n)| (d, n.as_str()))
    }
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(";"))
    }
}

/// Parse one raw lineage string against a rank list.
///
/// Fields are trimmed and trailing empty fields dropped. An empty string is
/// an empty lineage. An empty field followed by a named one is a gap and is
/// rejected, as is a lineage with more fields than the source has ranks.
/// The error's `line` is 0; table parsing fills in the real line.
pub fn parse_lineage(raw: &str, ranks: &RankList) -> Result<Lineage> {
    let mut names: Vec<String> = raw
        .split(LINEAGE_DELIMITER)
        .map(|n| n.trim().to_string())
        .collect();

    while names.last().is_some_and(|n| n.is_empty()) {
        names.pop();
    }

    if let Some(gap) = names.iter().position(|n| n.is_empty()) {
        return Err(malformed(
            0,
            format!(
                "empty {} between named ranks in '{}'",
                ranks.get(gap).unwrap_or("rank"),
                raw
            ),
        ));
    }

    if names.len() > ranks.len() {
        return Err(malformed(
            0,
            format!(
                "{} fields but the taxonomy declares {} ranks ({})",
                names.len(),
                ranks.len(),
                ranks
            ),
        ));
    }

    Ok(Lineage(names))
}

fn malformed(line: usize, reason: String) -> Error {
    Error::MalformedLineage {
        source_name: String::new(),
        line,
        reason,
    }
}

/// Genome name to lineage mapping read from a lineage table.
#[derive(Debug, Clone, Default)]
pub struct GenomeLineages {
    by_genome: HashMap<String, Lineage>,
}

impl GenomeLineages {
    pub fn get(&self, genome: &str) -> Option<&Lineage> {
        self.by_genome.get(genome)
    }

    pub fn len(&self) -> usize {
        self.by_genome.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_genome.is_empty()
    }

    pub fn contains(&self, genome: &str) -> bool {
        self.by_genome.contains_key(genome)
    }

    pub fn genomes(&self) -> impl Iterator<Item = &str> {
        self.by_genome.keys().map(String::as_str)
    }

    /// Insert a lineage; a different lineage for a known genome is an error.
    pub fn insert(&mut self, genome: String, lineage: Lineage) -> Result<()> {
        if let Some(existing) = self.by_genome.get(&genome) {
            if existing != &lineage {
                return Err(malformed(
                    0,
                    format!(
                        "genome '{}' listed with conflicting lineages '{}' and '{}'",
                        genome, existing, lineage
                    ),
                ));
            }
            return Ok(());
        }
        self.by_genome.insert(genome, lineage);
        Ok(())
    }

    /// Restrict to the given genomes, returning the kept mapping and the
    /// number of entries dropped.
    pub fn restrict_to<'a>(&self, genomes: impl IntoIterator<Item = &'a str>) -> (Self, usize) {
        let mut kept = HashMap::new();
        for genome in genomes {
            if let Some(lineage) = self.by_genome.get(genome) {
                kept.insert(genome.to_string(), lineage.clone());
            }
        }
        let dropped = self.by_genome.len() - kept.len();
        (Self { by_genome: kept }, dropped)
    }

    /// Distinct lineages, in a stable order.
    pub fn distinct_lineages(&self) -> Vec<&Lineage> {
        let mut lineages: Vec<&Lineage> = self.by_genome.values().collect();
        lineages.sort();
        lineages.dedup();
        lineages
    }
}

impl FromIterator<(String, Lineage)> for GenomeLineages {
    fn from_iter<I: IntoIterator<Item = (String, Lineage)>>(iter: I) -> Self {
        Self {
            by_genome: iter.into_iter().collect(),
        }
    }
}

/// Parse a `genome<TAB>lineage` table.
///
/// `source_name` labels errors (usually the file path). Lines are trimmed and
/// blank lines skipped; every other line must have exactly two tab-separated
/// fields.
pub fn parse_lineage_table<R: BufRead>(
    reader: R,
    source_name: &str,
    ranks: &RankList,
) -> Result<GenomeLineages> {
    let mut table = GenomeLineages::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let with_location = |err: Error| match err {
            Error::MalformedLineage { reason, .. } => Error::MalformedLineage {
                source_name: source_name.to_string(),
                line: line_no,
                reason,
            },
            other => other,
        };

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 2 {
            return Err(Error::MalformedLineage {
                source_name: source_name.to_string(),
                line: line_no,
                reason: format!(
                    "expected 2 tab-separated fields, found {}",
                    fields.len()
                ),
            });
        }

        let genome = fields[0].trim();
        if genome.is_empty() {
            return Err(Error::MalformedLineage {
                source_name: source_name.to_string(),
                line: line_no,
                reason: "empty genome name".to_string(),
            });
        }

        let lineage = parse_lineage(fields[1], ranks).map_err(with_location)?;
        table
            .insert(genome.to_string(), lineage)
            .map_err(with_location)?;
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranks(raw: &str) -> RankList {
        RankList::parse(raw).unwrap()
    }

    #[test]
    fn test_rank_list_is_trimmed_and_title_cased() {
        let r = ranks(" domain; PHYLUM ;class");
        assert_eq!(r.as_slice(), ["Domain", "Phylum", "Class"]);
    }

    #[test]
    fn test_rank_list_equality_ignores_case_and_spacing() {
        assert_eq!(ranks("Domain;Phylum"), ranks("domain ; phylum"));
        assert_ne!(ranks("Domain;Phylum"), ranks("Domain;Class"));
    }

    #[test]
    fn test_rank_list_rejects_empty_rank() {
        assert!(matches!(
            RankList::parse("Domain;;Class"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rank_list_display_is_canonical() {
        assert_eq!(ranks("domain;phylum").to_string(), "Domain;Phylum");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("species"), "Species");
        assert_eq!(title_case("SUB-species"), "Sub-Species");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_parse_lineage_trims_fields() {
        let lineage = parse_lineage("A; B ;C", &ranks("R1;R2;R3")).unwrap();
        assert_eq!(lineage.names(), ["A", "B", "C"]);
    }

    #[test]
    fn test_parse_lineage_allows_partial_depth() {
        let lineage = parse_lineage("Bacteria;Bacillota", &ranks("R1;R2;R3")).unwrap();
        assert_eq!(lineage.len(), 2);
    }

    #[test]
    fn test_parse_lineage_drops_trailing_empty_fields() {
        let lineage = parse_lineage("Bacteria;Bacillota;;", &ranks("R1;R2;R3;R4")).unwrap();
        assert_eq!(lineage.names(), ["Bacteria", "Bacillota"]);
    }

    #[test]
    fn test_parse_lineage_empty_string_is_empty_lineage() {
        let lineage = parse_lineage("", &ranks("R1;R2")).unwrap();
        assert!(lineage.is_empty());
        let lineage = parse_lineage("  ;  ", &ranks("R1;R2")).unwrap();
        assert!(lineage.is_empty());
    }

    #[test]
    fn test_parse_lineage_rejects_gap() {
        let err = parse_lineage("Bacteria;;Bacilli", &ranks("Domain;Phylum;Class")).unwrap_err();
        match err {
            Error::MalformedLineage { reason, .. } => assert!(reason.contains("Phylum")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_lineage_rejects_too_many_fields() {
        let err = parse_lineage("A;B;C", &ranks("R1;R2")).unwrap_err();
        assert!(matches!(err, Error::MalformedLineage { .. }));
    }

    #[test]
    fn test_parse_lineage_table() {
        let data = "GCF_1\tBacteria;Bacillota\n\nGCF_2\tBacteria;Pseudomonadota\n";
        let table = parse_lineage_table(data.as_bytes(), "tax.tsv", &ranks("D;P")).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("GCF_1").unwrap().names(), ["Bacteria", "Bacillota"]);
    }

    #[test]
    fn test_parse_lineage_table_requires_two_fields() {
        let data = "GCF_1\tBacteria\nGCF_2\tBacteria\textra\n";
        let err = parse_lineage_table(data.as_bytes(), "tax.tsv", &ranks("D;P")).unwrap_err();
        match err {
            Error::MalformedLineage {
                source_name,
                line,
                reason,
            } => {
                assert_eq!(source_name, "tax.tsv");
                assert_eq!(line, 2);
                assert!(reason.contains("found 3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_lineage_table_reports_line_of_bad_lineage() {
        let data = "GCF_1\tA\nGCF_2\tA;;C\n";
        let err = parse_lineage_table(data.as_bytes(), "tax.tsv", &ranks("D;P;C")).unwrap_err();
        assert!(matches!(err, Error::MalformedLineage { line: 2, .. }));
    }

    #[test]
    fn test_parse_lineage_table_duplicate_genome() {
        let same = "GCF_1\tA;B\nGCF_1\tA; B\n";
        let table = parse_lineage_table(same.as_bytes(), "t", &ranks("D;P")).unwrap();
        assert_eq!(table.len(), 1);

        let conflicting = "GCF_1\tA;B\nGCF_1\tA;C\n";
        let err = parse_lineage_table(conflicting.as_bytes(), "t", &ranks("D;P")).unwrap_err();
        assert!(matches!(err, Error::MalformedLineage { line: 2, .. }));
    }

    #[test]
    fn test_restrict_to_counts_dropped_entries() {
        let table: GenomeLineages = [
            ("g1".to_string(), Lineage::new(vec!["A".into()])),
            ("g2".to_string(), Lineage::new(vec!["B".into()])),
            ("g3".to_string(), Lineage::new(vec!["A".into()])),
        ]
        .into_iter()
        .collect();

        let (kept, dropped) = table.restrict_to(["g1", "g3", "missing"]);
        assert_eq!(kept.len(), 2);
        assert_eq!(dropped, 1);
        assert_eq!(kept.distinct_lineages().len(), 1);
    }
}
