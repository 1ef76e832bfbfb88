//! Within-sample (alpha) diversity indices.

use crate::data::{CommunityDataset, DiversityRecord, GroupedValue, Metadata, SuiteReport, TestOutcome};
use crate::error::{DivError, Result};
use crate::test::shapiro_wilk;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

/// Supported alpha-diversity indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlphaIndex {
    /// Number of taxa with a non-zero count.
    Observed,
    /// Bias-corrected Chao1 richness estimate.
    Chao1,
    /// Shannon entropy with natural logarithm.
    Shannon,
    /// Gini-Simpson index, `1 - Σp²`.
    Simpson,
    /// `1 / Σp²`.
    InverseSimpson,
    /// Pielou's evenness, `H / ln(S)`.
    Pielou,
}

impl AlphaIndex {
    pub const ALL: [AlphaIndex; 6] = [
        AlphaIndex::Observed,
        AlphaIndex::Chao1,
        AlphaIndex::Shannon,
        AlphaIndex::Simpson,
        AlphaIndex::InverseSimpson,
        AlphaIndex::Pielou,
    ];

    /// Richness, Shannon and Simpson.
    pub const DEFAULT: [AlphaIndex; 3] = [AlphaIndex::Observed, AlphaIndex::Shannon, AlphaIndex::Simpson];

    pub fn name(self) -> &'static str {
        match self {
            AlphaIndex::Observed => "Observed",
            AlphaIndex::Chao1 => "Chao1",
            AlphaIndex::Shannon => "Shannon",
            AlphaIndex::Simpson => "Simpson",
            AlphaIndex::InverseSimpson => "InvSimpson",
            AlphaIndex::Pielou => "Pielou",
        }
    }

    /// Value of this index for one count vector with a non-zero total.
    pub fn compute(self, counts: &[u64]) -> f64 {
        match self {
            AlphaIndex::Observed => observed(counts),
            AlphaIndex::Chao1 => chao1(counts),
            AlphaIndex::Shannon => shannon(counts),
            AlphaIndex::Simpson => simpson(counts),
            AlphaIndex::InverseSimpson => inverse_simpson(counts),
            AlphaIndex::Pielou => pielou(counts),
        }
    }
}

impl std::fmt::Display for AlphaIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlphaIndex {
    type Err = DivError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "observed" | "richness" => Ok(AlphaIndex::Observed),
            "chao1" => Ok(AlphaIndex::Chao1),
            "shannon" => Ok(AlphaIndex::Shannon),
            "simpson" => Ok(AlphaIndex::Simpson),
            "invsimpson" | "inverse_simpson" => Ok(AlphaIndex::InverseSimpson),
            "pielou" | "evenness" => Ok(AlphaIndex::Pielou),
            other => Err(DivError::InvalidParameter(format!("Unknown alpha index '{}'", other))),
        }
    }
}

fn proportions(counts: &[u64]) -> impl Iterator<Item = f64> + '_ {
    let total: u64 = counts.iter().sum();
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(move |&c| c as f64 / total as f64)
}

pub fn observed(counts: &[u64]) -> f64 {
    counts.iter().filter(|&&c| c > 0).count() as f64
}

/// `S_obs + F1(F1-1) / (2(F2+1))`, the bias-corrected form that stays finite
/// when there are no doubletons.
pub fn chao1(counts: &[u64]) -> f64 {
    let f1 = counts.iter().filter(|&&c| c == 1).count() as f64;
    let f2 = counts.iter().filter(|&&c| c == 2).count() as f64;
    observed(counts) + f1 * (f1 - 1.0) / (2.0 * (f2 + 1.0))
}

pub fn shannon(counts: &[u64]) -> f64 {
    let h: f64 = proportions(counts).map(|p| -p * p.ln()).sum();
    // a single taxon gives -1·ln(1) = -0.0
    h.max(0.0)
}

pub fn simpson(counts: &[u64]) -> f64 {
    1.0 - proportions(counts).map(|p| p * p).sum::<f64>()
}

pub fn inverse_simpson(counts: &[u64]) -> f64 {
    1.0 / proportions(counts).map(|p| p * p).sum::<f64>()
}

/// Evenness is 0 for a single-taxon sample.
pub fn pielou(counts: &[u64]) -> f64 {
    let s = observed(counts);
    if s <= 1.0 {
        0.0
    } else {
        shannon(counts) / s.ln()
    }
}

/// Compute `indices` for every sample.
///
/// Records are ordered by sample, then by the order of `indices`. Fails
/// with [`DivError::EmptySample`] on the first sample whose total count is
/// zero; use [`CommunityDataset::drop_empty_samples`] to exclude those first.
pub fn estimate(dataset: &CommunityDataset, indices: &[AlphaIndex]) -> Result<Vec<DiversityRecord>> {
    if indices.is_empty() {
        return Err(DivError::InvalidParameter("No alpha indices requested".to_string()));
    }

    let totals = dataset.abundance().sample_totals();
    if let Some(s) = totals.iter().position(|&t| t == 0) {
        return Err(DivError::EmptySample {
            sample_id: dataset.sample_ids()[s].clone(),
        });
    }

    let profiles = dataset.abundance().sample_profiles();
    let records: Vec<DiversityRecord> = profiles
        .par_iter()
        .zip(dataset.sample_ids().par_iter())
        .flat_map_iter(|(counts, sample_id)| {
            indices.iter().map(move |&index| DiversityRecord {
                sample_id: sample_id.clone(),
                index,
                value: index.compute(counts),
            })
        })
        .collect();

    info!(
        samples = dataset.n_samples(),
        indices = indices.len(),
        "Computed alpha diversity"
    );
    Ok(records)
}

/// Sample IDs and values of one index, in record order.
pub fn values_for(records: &[DiversityRecord], index: AlphaIndex) -> (Vec<String>, Vec<f64>) {
    records
        .iter()
        .filter(|r| r.index == index)
        .map(|r| (r.sample_id.clone(), r.value))
        .unzip()
}

/// Distinct indices present in `records`, in first-seen order.
pub fn indices_in(records: &[DiversityRecord]) -> Vec<AlphaIndex> {
    let mut seen = Vec::new();
    for r in records {
        if !seen.contains(&r.index) {
            seen.push(r.index);
        }
    }
    seen
}

/// Shapiro-Wilk test of each index's distribution across samples.
///
/// Reported for inspection only; choosing between parametric and rank-based
/// group tests is left to the caller.
pub fn normality_by_index(records: &[DiversityRecord]) -> SuiteReport {
    let outcomes = indices_in(records)
        .into_iter()
        .map(|index| {
            let (_, values) = values_for(records, index);
            let outcome = TestOutcome::from_result("Shapiro-Wilk", index.name(), None, shapiro_wilk(&values));
            if let Some(r) = &outcome.result {
                debug!(index = index.name(), w = r.statistic, p = r.p_value, "Normality check");
            }
            outcome
        })
        .collect();
    SuiteReport { outcomes }
}

/// `{sample, metric, group}` rows for plotting, grouped by a metadata column.
pub fn grouped_rows(records: &[DiversityRecord], metadata: &Metadata, column: &str) -> Result<Vec<GroupedValue>> {
    if !metadata.has_column(column) {
        return Err(DivError::MissingColumn(column.to_string()));
    }
    Ok(records
        .iter()
        .map(|r| GroupedValue {
            sample_id: r.sample_id.clone(),
            metric: r.index.name().to_string(),
            value: r.value,
            group: metadata.get(&r.sample_id, column).and_then(|v| v.as_level()),
        })
        .collect())
}
