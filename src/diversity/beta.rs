//! Between-sample (beta) dissimilarities.

use crate::data::{CommunityDataset, DistanceMatrix};
use crate::error::{DivError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

/// A dissimilarity between two count profiles over the same taxa.
///
/// Implementations must be symmetric, return 0 for identical profiles and
/// never return a negative value. Both profiles have a non-zero total.
pub trait Dissimilarity: Sync {
    /// Short method identifier stored on the resulting matrix.
    fn name(&self) -> &'static str;

    fn dissimilarity(&self, x: &[u64], y: &[u64]) -> f64;
}

/// Bray-Curtis: `Σ|x_i - y_i| / Σ(x_i + y_i)` on raw counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrayCurtis;

impl Dissimilarity for BrayCurtis {
    fn name(&self) -> &'static str {
        "bray"
    }

    fn dissimilarity(&self, x: &[u64], y: &[u64]) -> f64 {
        let (num, den) = x.iter().zip(y).fold((0u64, 0u64), |(num, den), (&a, &b)| {
            (num + a.abs_diff(b), den + a + b)
        });
        num as f64 / den as f64
    }
}

/// Jaccard distance on presence/absence: `1 - |X ∩ Y| / |X ∪ Y|`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jaccard;

impl Dissimilarity for Jaccard {
    fn name(&self) -> &'static str {
        "jaccard"
    }

    fn dissimilarity(&self, x: &[u64], y: &[u64]) -> f64 {
        let (shared, union) = x.iter().zip(y).fold((0usize, 0usize), |(s, u), (&a, &b)| {
            match (a > 0, b > 0) {
                (true, true) => (s + 1, u + 1),
                (false, false) => (s, u),
                _ => (s, u + 1),
            }
        });
        1.0 - shared as f64 / union as f64
    }
}

/// Named dissimilarity methods for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMethod {
    #[default]
    BrayCurtis,
    Jaccard,
}

impl DistanceMethod {
    pub fn name(self) -> &'static str {
        self.metric().name()
    }

    fn metric(self) -> &'static dyn Dissimilarity {
        match self {
            DistanceMethod::BrayCurtis => &BrayCurtis,
            DistanceMethod::Jaccard => &Jaccard,
        }
    }
}

impl std::fmt::Display for DistanceMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMethod {
    type Err = DivError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bray" | "braycurtis" | "bray_curtis" | "bray-curtis" => Ok(DistanceMethod::BrayCurtis),
            "jaccard" => Ok(DistanceMethod::Jaccard),
            other => Err(DivError::InvalidParameter(format!(
                "Unknown distance method '{}'",
                other
            ))),
        }
    }
}

/// Pairwise dissimilarity matrix for a named method.
///
/// `seed` is accepted for methods with a stochastic component (e.g. a
/// rarefied variant); the built-in methods are deterministic and ignore it.
pub fn compute_distance(dataset: &CommunityDataset, method: DistanceMethod, seed: Option<u64>) -> Result<DistanceMatrix> {
    if seed.is_some() {
        debug!(method = method.name(), "Seed ignored by deterministic distance method");
    }
    compute_with(dataset, method.metric())
}

/// Pairwise dissimilarity matrix for any [`Dissimilarity`].
///
/// Fails with [`DivError::DegenerateSample`] when a sample has zero total
/// abundance.
pub fn compute_with<D: Dissimilarity + ?Sized>(dataset: &CommunityDataset, metric: &D) -> Result<DistanceMatrix> {
    let totals = dataset.abundance().sample_totals();
    if let Some(s) = totals.iter().position(|&t| t == 0) {
        return Err(DivError::DegenerateSample {
            sample_id: dataset.sample_ids()[s].clone(),
        });
    }

    let profiles = dataset.abundance().sample_profiles();
    let n = profiles.len();
    let condensed: Vec<f64> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let profiles = &profiles;
            ((i + 1)..n).map(move |j| metric.dissimilarity(&profiles[i], &profiles[j]))
        })
        .collect();

    info!(method = metric.name(), samples = n, "Computed dissimilarity matrix");
    DistanceMatrix::new(dataset.sample_ids().to_vec(), metric.name(), condensed)
}
