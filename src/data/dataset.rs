//! The aligned (abundance, taxonomy, metadata) triple.

use crate::data::{AbundanceMatrix, Metadata, Rank, TaxonRecord, Taxonomy};
use crate::error::{DivError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Label used by [`CommunityDataset::aggregate_rank`] for taxa without an assignment.
pub const UNASSIGNED: &str = "Unassigned";

/// Decides whether a taxon survives [`CommunityDataset::filter_taxa`].
pub trait TaxonPredicate {
    fn keep(&self, record: &TaxonRecord) -> bool;
}

impl<F> TaxonPredicate for F
where
    F: Fn(&TaxonRecord) -> bool,
{
    fn keep(&self, record: &TaxonRecord) -> bool {
        self(record)
    }
}

/// Abundance, taxonomy and metadata sharing one taxon axis and one sample axis.
///
/// All transformations return a new dataset; the receiver is left untouched
/// so results can be re-derived against the unfiltered data.
#[derive(Debug, Clone)]
pub struct CommunityDataset {
    abundance: AbundanceMatrix,
    taxonomy: Taxonomy,
    metadata: Metadata,
}

fn mismatch_report(label: &str, missing: &[&String]) -> String {
    let shown: Vec<&str> = missing.iter().take(5).map(|s| s.as_str()).collect();
    let more = if missing.len() > shown.len() {
        format!(" (+{} more)", missing.len() - shown.len())
    } else {
        String::new()
    };
    format!("{}: {}{}", label, shown.join(", "), more)
}

fn looks_like_sequence(id: &str) -> bool {
    static DNA: OnceLock<Regex> = OnceLock::new();
    DNA.get_or_init(|| Regex::new(r"^[ACGTNacgtn]{20,}$").expect("static regex"))
        .is_match(id)
}

impl CommunityDataset {
    /// Validate and align the three input tables.
    ///
    /// Fails with [`DivError::Alignment`] when a sample or taxon is present in
    /// one table but absent from another. Taxonomy and metadata are reordered
    /// to follow the abundance matrix axes.
    pub fn build(abundance: AbundanceMatrix, taxonomy: Taxonomy, metadata: Metadata) -> Result<Self> {
        let mut problems = Vec::new();

        let abundance_taxa: HashSet<&String> = abundance.taxon_ids().iter().collect();
        if abundance_taxa.len() != abundance.n_taxa() {
            problems.push("duplicate taxon identifiers in abundance matrix".to_string());
        }
        let abundance_samples: HashSet<&String> = abundance.sample_ids().iter().collect();
        if abundance_samples.len() != abundance.n_samples() {
            problems.push("duplicate sample identifiers in abundance matrix".to_string());
        }

        let no_taxonomy: Vec<&String> = abundance
            .taxon_ids()
            .iter()
            .filter(|id| !taxonomy.contains(id))
            .collect();
        if !no_taxonomy.is_empty() {
            problems.push(mismatch_report("taxa without taxonomy", &no_taxonomy));
        }
        let no_counts: Vec<&String> = taxonomy
            .taxon_ids()
            .iter()
            .filter(|id| !abundance_taxa.contains(id))
            .collect();
        if !no_counts.is_empty() {
            problems.push(mismatch_report("taxonomy entries without counts", &no_counts));
        }

        let no_metadata: Vec<&String> = abundance
            .sample_ids()
            .iter()
            .filter(|id| !metadata.has_sample(id))
            .collect();
        if !no_metadata.is_empty() {
            problems.push(mismatch_report("samples without metadata", &no_metadata));
        }
        let no_abundance: Vec<&String> = metadata
            .sample_ids()
            .iter()
            .filter(|id| !abundance_samples.contains(id))
            .collect();
        if !no_abundance.is_empty() {
            problems.push(mismatch_report("metadata samples without counts", &no_abundance));
        }

        if !problems.is_empty() {
            return Err(DivError::Alignment(problems.join("; ")));
        }

        let taxonomy = taxonomy.subset(abundance.taxon_ids())?;
        let metadata = metadata.subset_samples(abundance.sample_ids())?;
        info!(
            taxa = abundance.n_taxa(),
            samples = abundance.n_samples(),
            "Built community dataset"
        );

        Ok(Self {
            abundance,
            taxonomy,
            metadata,
        })
    }

    pub fn abundance(&self) -> &AbundanceMatrix {
        &self.abundance
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn n_taxa(&self) -> usize {
        self.abundance.n_taxa()
    }

    pub fn n_samples(&self) -> usize {
        self.abundance.n_samples()
    }

    pub fn taxon_ids(&self) -> &[String] {
        self.abundance.taxon_ids()
    }

    pub fn sample_ids(&self) -> &[String] {
        self.abundance.sample_ids()
    }

    /// True when all three tables agree on taxon and sample order.
    pub fn is_aligned(&self) -> bool {
        self.taxonomy.taxon_ids() == self.abundance.taxon_ids()
            && self.metadata.sample_ids() == self.abundance.sample_ids()
    }

    /// Replace taxon identifiers with `ASV1`, `ASV2`, ... in abundance row order.
    ///
    /// The previous identifier is kept as [`TaxonRecord::original_id`]; when it
    /// is a nucleotide sequence and no sequence is recorded yet, it also fills
    /// [`TaxonRecord::sequence`].
    pub fn rename_taxa(&self) -> Result<Self> {
        let new_ids: Vec<String> = (1..=self.n_taxa()).map(|i| format!("ASV{}", i)).collect();

        let mut taxonomy = Taxonomy::new();
        for (old_id, new_id) in self.abundance.taxon_ids().iter().zip(&new_ids) {
            let mut record = self
                .taxonomy
                .get(old_id)
                .cloned()
                .ok_or_else(|| DivError::Alignment(format!("Taxon '{}' lost its taxonomy", old_id)))?;
            if record.sequence.is_none() && looks_like_sequence(old_id) {
                record.sequence = Some(old_id.clone());
            }
            record.original_id = Some(old_id.clone());
            taxonomy.insert(new_id.clone(), record)?;
        }

        let abundance = self.abundance.with_taxon_ids(new_ids)?;
        debug!(taxa = abundance.n_taxa(), "Renamed taxa to sequential ASV identifiers");
        Ok(Self {
            abundance,
            taxonomy,
            metadata: self.metadata.clone(),
        })
    }

    /// Keep only taxa whose taxonomy record satisfies `predicate`.
    pub fn filter_taxa<P: TaxonPredicate + ?Sized>(&self, predicate: &P) -> Result<Self> {
        let keep: Vec<usize> = self
            .abundance
            .taxon_ids()
            .iter()
            .enumerate()
            .filter(|(_, id)| self.taxonomy.get(id).map(|r| predicate.keep(r)).unwrap_or(false))
            .map(|(i, _)| i)
            .collect();
        let filtered = self.subset_taxa(&keep)?;
        info!(
            before = self.n_taxa(),
            after = filtered.n_taxa(),
            "Filtered taxa by taxonomy"
        );
        Ok(filtered)
    }

    /// Keep the taxa at `indices` across abundance and taxonomy.
    pub fn subset_taxa(&self, indices: &[usize]) -> Result<Self> {
        let abundance = self.abundance.subset_taxa(indices)?;
        let taxonomy = self.taxonomy.subset(abundance.taxon_ids())?;
        Ok(Self {
            abundance,
            taxonomy,
            metadata: self.metadata.clone(),
        })
    }

    /// Keep the samples at `indices` across abundance and metadata.
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let abundance = self.abundance.subset_samples(indices)?;
        let metadata = self.metadata.subset_samples(abundance.sample_ids())?;
        Ok(Self {
            abundance,
            taxonomy: self.taxonomy.clone(),
            metadata,
        })
    }

    /// Drop samples with zero total abundance, returning the removed IDs.
    pub fn drop_empty_samples(&self) -> Result<(Self, Vec<String>)> {
        let totals = self.abundance.sample_totals();
        let keep: Vec<usize> = (0..totals.len()).filter(|&i| totals[i] > 0).collect();
        let removed: Vec<String> = (0..totals.len())
            .filter(|&i| totals[i] == 0)
            .map(|i| self.sample_ids()[i].clone())
            .collect();
        if !removed.is_empty() {
            info!(removed = removed.len(), "Dropped samples with zero total abundance");
        }
        Ok((self.subset_samples(&keep)?, removed))
    }

    /// Relative abundance per sample, summed by assignment at `rank`.
    ///
    /// Taxa without an assignment at `rank` are pooled under [`UNASSIGNED`].
    /// Samples with zero depth get all-zero proportions.
    pub fn aggregate_rank(&self, rank: Rank) -> RankAbundance {
        let labels: Vec<String> = self
            .taxon_ids()
            .iter()
            .map(|id| {
                self.taxonomy
                    .get(id)
                    .and_then(|r| r.rank(rank))
                    .unwrap_or(UNASSIGNED)
                    .to_string()
            })
            .collect();

        let totals = self.abundance.sample_totals();
        let mut by_label: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (taxon, label) in labels.iter().enumerate() {
            let entry = by_label
                .entry(label.clone())
                .or_insert_with(|| vec![0.0; self.n_samples()]);
            for (sample, &count) in self.abundance.taxon_profile(taxon).iter().enumerate() {
                if totals[sample] > 0 {
                    entry[sample] += count as f64 / totals[sample] as f64;
                }
            }
        }

        let (labels, proportions) = by_label.into_iter().unzip();
        RankAbundance {
            rank,
            sample_ids: self.sample_ids().to_vec(),
            labels,
            proportions,
        }
    }
}

/// Relative abundance agglomerated at one taxonomic rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankAbundance {
    pub rank: Rank,
    pub sample_ids: Vec<String>,
    /// Sorted rank labels.
    pub labels: Vec<String>,
    /// `proportions[label][sample]`.
    pub proportions: Vec<Vec<f64>>,
}
