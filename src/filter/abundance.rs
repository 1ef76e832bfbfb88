//! Rare-taxon pruning by overall relative abundance.

use crate::data::CommunityDataset;
use crate::error::{DivError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Keep taxa whose share of all reads exceeds `min_relative_abundance`.
///
/// A taxon's share is its total count across samples divided by the grand
/// total of the matrix. The comparison is strict, so a threshold of 0 drops
/// only taxa that were never observed and a threshold of 1 drops every taxon.
/// The sample axis is unchanged.
pub fn prune_rare_taxa(dataset: &CommunityDataset, min_relative_abundance: f64) -> Result<CommunityDataset> {
    Ok(prune_rare_taxa_with_stats(dataset, min_relative_abundance)?.0)
}

/// Summary of a pruning pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneSummary {
    pub threshold: f64,
    pub n_before: usize,
    pub n_after: usize,
    pub n_removed: usize,
    /// Proportion of total reads held by the kept taxa.
    pub reads_retained: f64,
}

impl std::fmt::Display for PruneSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Rare Taxon Pruning (> {:.2e})", self.threshold)?;
        writeln!(f, "  Taxa before:    {}", self.n_before)?;
        writeln!(f, "  Taxa after:     {}", self.n_after)?;
        writeln!(f, "  Taxa removed:   {}", self.n_removed)?;
        writeln!(f, "  Reads retained: {:.1}%", self.reads_retained * 100.0)?;
        Ok(())
    }
}

/// [`prune_rare_taxa`] plus a summary of what was removed.
pub fn prune_rare_taxa_with_stats(
    dataset: &CommunityDataset,
    min_relative_abundance: f64,
) -> Result<(CommunityDataset, PruneSummary)> {
    if !(0.0..=1.0).contains(&min_relative_abundance) {
        return Err(DivError::InvalidParameter(
            "min_relative_abundance must be between 0 and 1".to_string(),
        ));
    }

    let abundance = dataset.abundance();
    let grand_total = abundance.grand_total();
    if grand_total == 0 {
        return Err(DivError::EmptyData("All counts are zero".to_string()));
    }

    let taxon_totals = abundance.taxon_totals();
    let keep: Vec<usize> = (0..abundance.n_taxa())
        .into_par_iter()
        .filter(|&t| taxon_totals[t] as f64 / grand_total as f64 > min_relative_abundance)
        .collect();

    let kept_reads: u64 = keep.iter().map(|&t| taxon_totals[t]).sum();
    let pruned = dataset.subset_taxa(&keep)?;

    let summary = PruneSummary {
        threshold: min_relative_abundance,
        n_before: dataset.n_taxa(),
        n_after: pruned.n_taxa(),
        n_removed: dataset.n_taxa() - pruned.n_taxa(),
        reads_retained: kept_reads as f64 / grand_total as f64,
    };
    info!(
        threshold = min_relative_abundance,
        before = summary.n_before,
        after = summary.n_after,
        "Pruned rare taxa"
    );
    Ok((pruned, summary))
}
