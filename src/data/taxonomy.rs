//! Taxonomic rank assignments per taxon.
//!
//! Absent assignments are `None`, never a placeholder string: a classifier
//! that could not place a taxon at family level is different from one that
//! placed it in a family literally named "unknown".

use crate::error::{DivError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

/// Taxonomic ranks, broadest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    Domain,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl Rank {
    pub const ALL: [Rank; 7] = [
        Rank::Domain,
        Rank::Phylum,
        Rank::Class,
        Rank::Order,
        Rank::Family,
        Rank::Genus,
        Rank::Species,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Rank::Domain => "Domain",
            Rank::Phylum => "Phylum",
            Rank::Class => "Class",
            Rank::Order => "Order",
            Rank::Family => "Family",
            Rank::Genus => "Genus",
            Rank::Species => "Species",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Rank {
    type Err = DivError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domain" | "kingdom" => Ok(Rank::Domain),
            "phylum" => Ok(Rank::Phylum),
            "class" => Ok(Rank::Class),
            "order" => Ok(Rank::Order),
            "family" => Ok(Rank::Family),
            "genus" => Ok(Rank::Genus),
            "species" => Ok(Rank::Species),
            other => Err(DivError::InvalidParameter(format!(
                "Unknown taxonomic rank '{}'",
                other
            ))),
        }
    }
}

fn rank_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    // Greengenes "f__", SILVA "D_4__"
    PREFIX.get_or_init(|| Regex::new(r"^(?:[a-zA-Z]|D_\d+)__").expect("static regex"))
}

/// Strip a database rank prefix; a bare prefix means "not assigned".
pub fn normalize_assignment(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "NA" {
        return None;
    }
    let stripped = rank_prefix().replace(trimmed, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Rank assignments and provenance of a single taxon.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaxonRecord {
    /// One slot per [`Rank`], indexed by [`Rank::index`].
    assignments: [Option<String>; 7],
    /// Representative sequence, when known.
    pub sequence: Option<String>,
    /// Identifier the taxon carried before renaming.
    pub original_id: Option<String>,
}

impl TaxonRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style rank assignment.
    pub fn with_rank(mut self, rank: Rank, value: &str) -> Self {
        self.assignments[rank.index()] = Some(value.to_string());
        self
    }

    pub fn with_sequence(mut self, sequence: &str) -> Self {
        self.sequence = Some(sequence.to_string());
        self
    }

    /// Assignment at `rank`, `None` when absent.
    pub fn rank(&self, rank: Rank) -> Option<&str> {
        self.assignments[rank.index()].as_deref()
    }

    pub fn set_rank(&mut self, rank: Rank, value: Option<String>) {
        self.assignments[rank.index()] = value;
    }

    /// Deepest rank with an assignment.
    pub fn deepest_rank(&self) -> Option<Rank> {
        Rank::ALL
            .iter()
            .rev()
            .copied()
            .find(|&r| self.assignments[r.index()].is_some())
    }
}

/// Taxonomy table keyed by taxon identifier, in a fixed taxon order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Taxonomy {
    taxon_ids: Vec<String>,
    records: HashMap<String, TaxonRecord>,
}

impl Taxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(taxon_id, record)` pairs, rejecting duplicate identifiers.
    pub fn from_records(records: Vec<(String, TaxonRecord)>) -> Result<Self> {
        let mut taxonomy = Self::new();
        for (id, record) in records {
            taxonomy.insert(id, record)?;
        }
        Ok(taxonomy)
    }

    /// Append a taxon.
    pub fn insert(&mut self, taxon_id: String, record: TaxonRecord) -> Result<()> {
        if self.records.contains_key(&taxon_id) {
            return Err(DivError::Alignment(format!(
                "Duplicate taxon '{}' in taxonomy",
                taxon_id
            )));
        }
        self.taxon_ids.push(taxon_id.clone());
        self.records.insert(taxon_id, record);
        Ok(())
    }

    /// Load a taxonomy table from TSV.
    ///
    /// The first column holds taxon identifiers. Remaining columns are
    /// matched to ranks by header name (`Kingdom`/`Domain`, `Phylum`, ...);
    /// a `Sequence` column, if present, fills [`TaxonRecord::sequence`].
    /// Unrecognised columns are ignored.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| DivError::EmptyData("Empty taxonomy file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();

        let mut rank_columns: Vec<(usize, Rank)> = Vec::new();
        let mut sequence_column = None;
        for (idx, name) in header.iter().enumerate().skip(1) {
            if name.trim().eq_ignore_ascii_case("sequence") {
                sequence_column = Some(idx);
            } else if let Ok(rank) = name.parse::<Rank>() {
                rank_columns.push((idx, rank));
            }
        }
        if rank_columns.is_empty() {
            return Err(DivError::MissingColumn(
                "taxonomy rank (Kingdom, Phylum, ...)".to_string(),
            ));
        }

        let mut taxonomy = Self::new();
        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let mut record = TaxonRecord::new();
            for &(idx, rank) in &rank_columns {
                let value = fields.get(idx).and_then(|v| normalize_assignment(v));
                record.set_rank(rank, value);
            }
            record.sequence = sequence_column
                .and_then(|idx| fields.get(idx))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(String::from);
            taxonomy.insert(fields[0].trim().to_string(), record)?;
        }

        if taxonomy.is_empty() {
            return Err(DivError::EmptyData("No taxa in taxonomy".to_string()));
        }
        Ok(taxonomy)
    }

    pub fn len(&self) -> usize {
        self.taxon_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taxon_ids.is_empty()
    }

    pub fn taxon_ids(&self) -> &[String] {
        &self.taxon_ids
    }

    pub fn get(&self, taxon_id: &str) -> Option<&TaxonRecord> {
        self.records.get(taxon_id)
    }

    pub fn contains(&self, taxon_id: &str) -> bool {
        self.records.contains_key(taxon_id)
    }

    /// Records in taxon order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaxonRecord)> + '_ {
        self.taxon_ids
            .iter()
            .filter_map(move |id| self.records.get(id).map(|r| (id.as_str(), r)))
    }

    /// Subset (and reorder) to the given taxa.
    pub fn subset(&self, taxon_ids: &[String]) -> Result<Self> {
        let mut subset = Self::new();
        for id in taxon_ids {
            let record = self.records.get(id).ok_or_else(|| {
                DivError::Alignment(format!("Taxon '{}' not found in taxonomy", id))
            })?;
            subset.insert(id.clone(), record.clone())?;
        }
        Ok(subset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_normalize_assignment() {
        assert_eq!(normalize_assignment("f__Mitochondria").as_deref(), Some("Mitochondria"));
        assert_eq!(normalize_assignment("D_4__Rikenellaceae").as_deref(), Some("Rikenellaceae"));
        assert_eq!(normalize_assignment("Bacteroides").as_deref(), Some("Bacteroides"));
        assert_eq!(normalize_assignment("g__"), None);
        assert_eq!(normalize_assignment("NA"), None);
        assert_eq!(normalize_assignment("  "), None);
        // a literal label survives as a value
        assert_eq!(normalize_assignment("unknown").as_deref(), Some("unknown"));
    }

    #[test]
    fn test_rank_parsing() {
        assert_eq!("Kingdom".parse::<Rank>().unwrap(), Rank::Domain);
        assert_eq!("family".parse::<Rank>().unwrap(), Rank::Family);
        assert!("clade".parse::<Rank>().is_err());
    }

    #[test]
    fn test_record_accessors() {
        let record = TaxonRecord::new()
            .with_rank(Rank::Domain, "Bacteria")
            .with_rank(Rank::Order, "Chloroplast");
        assert_eq!(record.rank(Rank::Order), Some("Chloroplast"));
        assert_eq!(record.rank(Rank::Family), None);
        assert_eq!(record.deepest_rank(), Some(Rank::Order));
        assert_eq!(TaxonRecord::new().deepest_rank(), None);
    }

    #[test]
    fn test_from_tsv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ASV\tKingdom\tPhylum\tOrder\tFamily\tSequence").unwrap();
        writeln!(file, "a1\tk__Bacteria\tp__Firmicutes\to__Clostridiales\tf__\tACGT").unwrap();
        writeln!(file, "a2\tBacteria\tNA\tRickettsiales\tMitochondria\t").unwrap();
        file.flush().unwrap();

        let tax = Taxonomy::from_tsv(file.path()).unwrap();
        assert_eq!(tax.taxon_ids(), &["a1", "a2"]);

        let a1 = tax.get("a1").unwrap();
        assert_eq!(a1.rank(Rank::Domain), Some("Bacteria"));
        assert_eq!(a1.rank(Rank::Family), None);
        assert_eq!(a1.sequence.as_deref(), Some("ACGT"));

        let a2 = tax.get("a2").unwrap();
        assert_eq!(a2.rank(Rank::Phylum), None);
        assert_eq!(a2.rank(Rank::Family), Some("Mitochondria"));
        assert_eq!(a2.sequence, None);
    }

    #[test]
    fn test_duplicate_taxa_rejected() {
        let result = Taxonomy::from_records(vec![
            ("t".to_string(), TaxonRecord::new()),
            ("t".to_string(), TaxonRecord::new()),
        ]);
        assert!(matches!(result, Err(DivError::Alignment(_))));
    }

    #[test]
    fn test_subset() {
        let tax = Taxonomy::from_records(vec![
            ("a".to_string(), TaxonRecord::new().with_rank(Rank::Genus, "A")),
            ("b".to_string(), TaxonRecord::new().with_rank(Rank::Genus, "B")),
        ])
        .unwrap();
        let sub = tax.subset(&["b".to_string()]).unwrap();
        assert_eq!(sub.taxon_ids(), &["b"]);
        assert!(tax.subset(&["z".to_string()]).is_err());
    }
}
