//! Principal coordinates analysis (classical scaling).

use super::{kruskal_stress, OrdinationResult, Ordinator};
use crate::data::DistanceMatrix;
use crate::error::{DivError, Result};
use nalgebra::DMatrix;
use tracing::debug;

/// Eigenvalues smaller than this fraction of the largest are treated as zero.
const EIGEN_TOLERANCE: f64 = 1e-7;

/// Full Euclidean embedding of a dissimilarity matrix.
///
/// Axes come in decreasing eigenvalue order. Semimetric dissimilarities
/// (such as Bray-Curtis) produce negative eigenvalues; those axes are kept
/// and scaled by `sqrt(|λ|)` so distances can be reconstructed as
/// `Σ_pos Δ² - Σ_neg Δ²`.
#[derive(Debug, Clone)]
pub struct PrincipalCoordinates {
    pub sample_ids: Vec<String>,
    /// Non-zero eigenvalues, positive first then negative, each group by
    /// decreasing magnitude.
    pub eigenvalues: Vec<f64>,
    /// `n × axes` scores, column `a` scaled by `sqrt(|eigenvalues[a]|)`.
    pub vectors: DMatrix<f64>,
}

impl PrincipalCoordinates {
    pub fn n_positive(&self) -> usize {
        self.eigenvalues.iter().filter(|&&l| l > 0.0).count()
    }

    /// Proportion of the positive inertia carried by each positive axis.
    pub fn explained(&self) -> Vec<f64> {
        let total: f64 = self.eigenvalues.iter().filter(|&&l| l > 0.0).sum();
        self.eigenvalues
            .iter()
            .filter(|&&l| l > 0.0)
            .map(|l| l / total)
            .collect()
    }
}

/// Gower-centred double eigendecomposition of `-d²/2`.
pub fn principal_coordinates(dm: &DistanceMatrix) -> Result<PrincipalCoordinates> {
    let n = dm.n();
    if n < 2 {
        return Err(DivError::InvalidParameter(
            "Ordination requires at least 2 samples".to_string(),
        ));
    }

    let a = DMatrix::from_fn(n, n, |i, j| -0.5 * dm.get(i, j).powi(2));
    let row_means: Vec<f64> = (0..n).map(|i| a.row(i).mean()).collect();
    let grand = a.mean();
    // A is symmetric, so column means equal row means
    let g = DMatrix::from_fn(n, n, |i, j| a[(i, j)] - row_means[i] - row_means[j] + grand);

    let eigen = g.symmetric_eigen();
    let max_abs = eigen.eigenvalues.iter().fold(0.0f64, |m, l| m.max(l.abs()));
    if max_abs <= 0.0 {
        return Err(DivError::Numerical("All dissimilarities are zero".to_string()));
    }

    let mut axes: Vec<(f64, usize)> = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .filter(|(_, l)| l.abs() > EIGEN_TOLERANCE * max_abs)
        .map(|(idx, &l)| (l, idx))
        .collect();
    // positive axes by decreasing value, then negative by decreasing magnitude
    axes.sort_by(|x, y| {
        (y.0 > 0.0)
            .cmp(&(x.0 > 0.0))
            .then(y.0.abs().total_cmp(&x.0.abs()))
    });

    let mut vectors = DMatrix::zeros(n, axes.len());
    for (col, &(lambda, idx)) in axes.iter().enumerate() {
        let scale = lambda.abs().sqrt();
        let v = eigen.eigenvectors.column(idx);
        // fix the sign so the largest loading is positive
        let sign = if v.iter().fold(0.0f64, |m, x| if x.abs() > m.abs() { *x } else { m }) < 0.0 {
            -1.0
        } else {
            1.0
        };
        for i in 0..n {
            vectors[(i, col)] = sign * v[i] * scale;
        }
    }

    let eigenvalues: Vec<f64> = axes.iter().map(|&(l, _)| l).collect();
    debug!(
        positive = eigenvalues.iter().filter(|&&l| l > 0.0).count(),
        negative = eigenvalues.iter().filter(|&&l| l < 0.0).count(),
        "Principal coordinates computed"
    );

    Ok(PrincipalCoordinates {
        sample_ids: dm.sample_ids().to_vec(),
        eigenvalues,
        vectors,
    })
}

/// Classical scaling as an [`Ordinator`]; deterministic, ignores the seed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pcoa;

impl Ordinator for Pcoa {
    fn name(&self) -> &'static str {
        "PCoA"
    }

    fn fit(&self, dm: &DistanceMatrix, dims: usize, _seed: Option<u64>) -> Result<OrdinationResult> {
        let pc = principal_coordinates(dm)?;
        let available = pc.n_positive();
        if dims == 0 || dims > available {
            return Err(DivError::InvalidParameter(format!(
                "Requested {} dimensions, {} positive axes available",
                dims, available
            )));
        }

        let coordinates: Vec<Vec<f64>> = (0..dm.n())
            .map(|i| (0..dims).map(|a| pc.vectors[(i, a)]).collect())
            .collect();
        let stress = kruskal_stress(dm, &coordinates);
        let mut result = OrdinationResult::new(self.name(), pc.sample_ids.clone(), coordinates, stress);
        result.explained = pc.explained().into_iter().take(dims).collect();
        Ok(result)
    }
}
