//! Low-dimensional embeddings of a distance matrix.
//!
//! An [`Ordinator`] places every sample of a [`DistanceMatrix`] in a
//! `dims`-dimensional space and reports how well the embedded Euclidean
//! distances reproduce the input (Kruskal stress, lower is better).

pub mod nmds;
pub mod pcoa;

pub use nmds::{Nmds, NmdsConfig};
pub use pcoa::{principal_coordinates, Pcoa, PrincipalCoordinates};

use crate::data::DistanceMatrix;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Interchangeable embedding method.
pub trait Ordinator: Sync {
    fn name(&self) -> &'static str;

    /// Embed `dm` in `dims` dimensions.
    ///
    /// Stochastic methods are reproducible only when `seed` is given.
    fn fit(&self, dm: &DistanceMatrix, dims: usize, seed: Option<u64>) -> Result<OrdinationResult>;
}

/// Raised when the best restart did not stabilise within its iteration
/// budget. The best iterate is still returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceWarning {
    pub iterations: usize,
    pub stress: f64,
    pub restarts: usize,
}

impl std::fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Best of {} restarts did not converge within {} iterations (stress {:.4})",
            self.restarts, self.iterations, self.stress
        )
    }
}

/// Sample coordinates with their goodness of fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinationResult {
    pub method: String,
    pub sample_ids: Vec<String>,
    /// One coordinate vector per sample.
    pub coordinates: Vec<Vec<f64>>,
    pub stress: f64,
    pub converged: bool,
    pub n_iterations: usize,
    /// Share of inertia per axis, for eigen-based methods.
    pub explained: Vec<f64>,
    pub warning: Option<ConvergenceWarning>,
}

impl OrdinationResult {
    pub fn new(method: &str, sample_ids: Vec<String>, coordinates: Vec<Vec<f64>>, stress: f64) -> Self {
        Self {
            method: method.to_string(),
            sample_ids,
            coordinates,
            stress,
            converged: true,
            n_iterations: 0,
            explained: Vec::new(),
            warning: None,
        }
    }

    pub fn dims(&self) -> usize {
        self.coordinates.first().map_or(0, Vec::len)
    }

    pub fn coordinates_of(&self, sample_id: &str) -> Option<&[f64]> {
        self.sample_ids
            .iter()
            .position(|s| s == sample_id)
            .map(|i| self.coordinates[i].as_slice())
    }

    /// Write one row per sample with axes `Axis1..AxisN`.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write!(writer, "sample")?;
        for a in 1..=self.dims() {
            write!(writer, "\tAxis{}", a)?;
        }
        writeln!(writer)?;
        for (id, coords) in self.sample_ids.iter().zip(&self.coordinates) {
            write!(writer, "{}", id)?;
            for c in coords {
                write!(writer, "\t{:.6}", c)?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Euclidean distances between all pairs of points, condensed order.
pub(crate) fn embedded_distances(points: &[Vec<f64>]) -> Vec<f64> {
    let n = points.len();
    let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            let d2: f64 = points[i]
                .iter()
                .zip(&points[j])
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            out.push(d2.sqrt());
        }
    }
    out
}

/// Metric Kruskal stress-1 of an embedding against the input dissimilarities.
pub(crate) fn kruskal_stress(dm: &DistanceMatrix, points: &[Vec<f64>]) -> f64 {
    let fitted = embedded_distances(points);
    let num: f64 = dm
        .condensed()
        .iter()
        .zip(&fitted)
        .map(|(d, f)| (d - f).powi(2))
        .sum();
    let den: f64 = dm.condensed().iter().map(|d| d * d).sum();
    if den > 0.0 {
        (num / den).sqrt()
    } else {
        0.0
    }
}
