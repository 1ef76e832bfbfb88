//! Sample filtering by sequencing depth.

use crate::data::CommunityDataset;
use crate::error::{DivError, Result};
use tracing::{info, warn};

/// Drop samples whose total read count is below `min_reads`.
///
/// Taxa are never removed here, even when they become all-zero; run
/// [`prune_rare_taxa`](super::prune_rare_taxa) afterwards if that matters.
/// Returns the filtered dataset and the identifiers of the dropped samples.
pub fn filter_library_size(dataset: &CommunityDataset, min_reads: u64) -> Result<(CommunityDataset, Vec<String>)> {
    let totals = dataset.abundance().sample_totals();
    let (keep, drop): (Vec<usize>, Vec<usize>) =
        (0..dataset.n_samples()).partition(|&s| totals[s] >= min_reads);

    if keep.is_empty() {
        return Err(DivError::EmptyData(format!(
            "No samples have at least {} reads",
            min_reads
        )));
    }

    let dropped: Vec<String> = drop
        .iter()
        .map(|&s| dataset.sample_ids()[s].clone())
        .collect();
    if !dropped.is_empty() {
        warn!(min_reads, dropped = ?dropped, "Dropping shallow samples");
    }

    let filtered = dataset.subset_samples(&keep)?;
    info!(min_reads, kept = filtered.n_samples(), "Filtered samples by library size");
    Ok((filtered, dropped))
}
