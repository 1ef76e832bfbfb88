//! Non-metric multidimensional scaling.
//!
//! Stress is minimised by SMACOF majorization alternating with monotone
//! (isotonic) regression of the fitted distances on the rank order of the
//! dissimilarities. Ties in the dissimilarities may be broken freely (the
//! primary approach). Several starts are tried and the lowest-stress
//! solution is kept; the first start is the PCoA solution, the rest are
//! random.
//!
//! The optimiser finds local minima only. Results are reproducible when a
//! seed is given: restart `r` draws from ChaCha stream `r` of the seed, so
//! the outcome does not depend on how restarts are scheduled.

use super::{embedded_distances, principal_coordinates, ConvergenceWarning, OrdinationResult, Ordinator};
use crate::data::DistanceMatrix;
use crate::error::{DivError, Result};
use nalgebra::DMatrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Stress below which the fit is considered perfect.
const STRESS_FLOOR: f64 = 1e-8;

/// Configuration for NMDS fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NmdsConfig {
    /// Number of starts, the first from PCoA.
    pub restarts: usize,
    /// Majorization iterations per start.
    pub max_iterations: usize,
    /// Converged once stress changes by less than this fraction per iteration.
    pub tolerance: f64,
    /// Run restarts on the rayon pool.
    pub parallel: bool,
}

impl Default for NmdsConfig {
    fn default() -> Self {
        Self {
            restarts: 20,
            max_iterations: 500,
            tolerance: 1e-6,
            parallel: true,
        }
    }
}

impl NmdsConfig {
    pub fn quick() -> Self {
        Self {
            restarts: 5,
            max_iterations: 200,
            ..Default::default()
        }
    }

    pub fn thorough() -> Self {
        Self {
            restarts: 50,
            max_iterations: 2000,
            tolerance: 1e-8,
            ..Default::default()
        }
    }
}

/// NMDS as an [`Ordinator`].
#[derive(Debug, Clone, Default)]
pub struct Nmds {
    pub config: NmdsConfig,
}

impl Nmds {
    pub fn new(config: NmdsConfig) -> Self {
        Self { config }
    }
}

/// Outcome of one start.
#[derive(Debug, Clone)]
struct Fit {
    points: Vec<Vec<f64>>,
    stress: f64,
    iterations: usize,
    converged: bool,
}

/// Pair ordering by dissimilarity, with the ranges of tied values.
struct RankOrder {
    order: Vec<usize>,
    ties: Vec<(usize, usize)>,
}

impl RankOrder {
    fn new(dissimilarities: &[f64]) -> Self {
        let mut order: Vec<usize> = (0..dissimilarities.len()).collect();
        order.sort_by(|&a, &b| dissimilarities[a].total_cmp(&dissimilarities[b]));
        let mut ties = Vec::new();
        let mut start = 0;
        for i in 1..=order.len() {
            if i == order.len() || dissimilarities[order[i]] != dissimilarities[order[start]] {
                if i - start > 1 {
                    ties.push((start, i));
                }
                start = i;
            }
        }
        Self { order, ties }
    }

    /// Least-squares monotone fit of `fitted` on the dissimilarity order.
    fn disparities(&self, fitted: &[f64]) -> Vec<f64> {
        let mut order = self.order.clone();
        for &(start, end) in &self.ties {
            order[start..end].sort_by(|&a, &b| fitted[a].total_cmp(&fitted[b]));
        }
        let ordered: Vec<f64> = order.iter().map(|&p| fitted[p]).collect();
        let monotone = pool_adjacent_violators(&ordered);
        let mut out = vec![0.0; fitted.len()];
        for (&p, v) in order.iter().zip(monotone) {
            out[p] = v;
        }
        out
    }
}

/// Isotonic (non-decreasing) regression with unit weights.
fn pool_adjacent_violators(values: &[f64]) -> Vec<f64> {
    let mut sums: Vec<f64> = Vec::with_capacity(values.len());
    let mut counts: Vec<usize> = Vec::with_capacity(values.len());
    for &v in values {
        sums.push(v);
        counts.push(1);
        while sums.len() > 1 {
            let last = sums.len() - 1;
            if sums[last - 1] / counts[last - 1] as f64 <= sums[last] / counts[last] as f64 {
                break;
            }
            let (s, c) = (sums[last], counts[last]);
            sums.pop();
            counts.pop();
            sums[last - 1] += s;
            counts[last - 1] += c;
        }
    }
    sums.iter()
        .zip(&counts)
        .flat_map(|(s, &c)| std::iter::repeat(s / c as f64).take(c))
        .collect()
}

/// Kruskal stress-1 of fitted distances against their disparities.
fn stress1(fitted: &[f64], disparities: &[f64]) -> f64 {
    let num: f64 = fitted.iter().zip(disparities).map(|(f, d)| (f - d).powi(2)).sum();
    let den: f64 = fitted.iter().map(|f| f * f).sum();
    if den > 0.0 {
        (num / den).sqrt()
    } else {
        1.0
    }
}

/// Scale `points` so the squared fitted distances sum to the number of pairs.
fn normalize(points: &mut [Vec<f64>]) {
    let fitted = embedded_distances(points);
    let ss: f64 = fitted.iter().map(|f| f * f).sum();
    if ss > 0.0 {
        let scale = (fitted.len() as f64 / ss).sqrt();
        for p in points.iter_mut() {
            for x in p.iter_mut() {
                *x *= scale;
            }
        }
    }
}

/// Guttman transform: the majorizing update for fixed disparities.
fn guttman(points: &[Vec<f64>], fitted: &[f64], disparities: &[f64]) -> Vec<Vec<f64>> {
    let n = points.len();
    let dims = points[0].len();
    let mut next = vec![vec![0.0; dims]; n];
    let mut idx = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            if fitted[idx] > 0.0 {
                let ratio = disparities[idx] / fitted[idx];
                for a in 0..dims {
                    let step = ratio * (points[i][a] - points[j][a]);
                    next[i][a] += step;
                    next[j][a] -= step;
                }
            }
            idx += 1;
        }
    }
    for p in next.iter_mut() {
        for x in p.iter_mut() {
            *x /= n as f64;
        }
    }
    next
}

fn smacof(ranks: &RankOrder, mut points: Vec<Vec<f64>>, config: &NmdsConfig) -> Fit {
    normalize(&mut points);
    let n_pairs = ranks.order.len() as f64;
    let mut fitted = embedded_distances(&points);
    let mut previous = f64::INFINITY;
    let mut iterations = 0;

    loop {
        let disparities = ranks.disparities(&fitted);
        let stress = stress1(&fitted, &disparities);
        if stress < STRESS_FLOOR || (previous - stress).abs() < config.tolerance * previous {
            return Fit {
                points,
                stress,
                iterations,
                converged: true,
            };
        }
        if iterations == config.max_iterations {
            return Fit {
                points,
                stress,
                iterations,
                converged: false,
            };
        }

        let ss: f64 = disparities.iter().map(|d| d * d).sum();
        let scale = if ss > 0.0 { (n_pairs / ss).sqrt() } else { 1.0 };
        let scaled: Vec<f64> = disparities.iter().map(|d| d * scale).collect();
        points = guttman(&points, &fitted, &scaled);
        fitted = embedded_distances(&points);
        previous = stress;
        iterations += 1;
    }
}

/// Centre the configuration and rotate it onto its principal axes.
fn principal_rotation(points: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = points.len();
    let dims = points[0].len();
    let mut x = DMatrix::from_fn(n, dims, |i, a| points[i][a]);
    for a in 0..dims {
        let mean = x.column(a).mean();
        for i in 0..n {
            x[(i, a)] -= mean;
        }
    }
    let eigen = (x.transpose() * &x).symmetric_eigen();
    let mut axes: Vec<usize> = (0..dims).collect();
    axes.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let rotated = &x * eigen.eigenvectors.select_columns(&axes);
    (0..n)
        .map(|i| {
            (0..dims)
                .map(|a| {
                    let column = rotated.column(a);
                    let largest = column.iter().fold(0.0f64, |m, v| if v.abs() > m.abs() { *v } else { m });
                    if largest < 0.0 {
                        -rotated[(i, a)]
                    } else {
                        rotated[(i, a)]
                    }
                })
                .collect()
        })
        .collect()
}

impl Nmds {
    fn start(&self, restart: usize, seed: u64, n: usize, dims: usize, pcoa: Option<&Vec<Vec<f64>>>) -> Vec<Vec<f64>> {
        if restart == 0 {
            if let Some(points) = pcoa {
                return points.clone();
            }
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(restart as u64);
        (0..n)
            .map(|_| (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect()
    }
}

impl Ordinator for Nmds {
    fn name(&self) -> &'static str {
        "NMDS"
    }

    fn fit(&self, dm: &DistanceMatrix, dims: usize, seed: Option<u64>) -> Result<OrdinationResult> {
        let n = dm.n();
        if n < 3 {
            return Err(DivError::InvalidParameter(
                "NMDS requires at least 3 samples".to_string(),
            ));
        }
        if dims == 0 || dims >= n {
            return Err(DivError::InvalidParameter(format!(
                "NMDS dimensions must be in 1..{}, got {}",
                n, dims
            )));
        }
        if self.config.restarts == 0 {
            return Err(DivError::InvalidParameter(
                "NMDS needs at least one start".to_string(),
            ));
        }
        if dm.condensed().iter().all(|&d| d == 0.0) {
            return Err(DivError::Numerical("All dissimilarities are zero".to_string()));
        }

        let seed = seed.unwrap_or_else(|| {
            let seed = rand::random::<u64>();
            debug!(seed, "No ordination seed given, drew a fresh one");
            seed
        });
        let ranks = RankOrder::new(dm.condensed());
        let pcoa: Option<Vec<Vec<f64>>> = principal_coordinates(dm)
            .ok()
            .filter(|pc| pc.n_positive() >= dims)
            .map(|pc| (0..n).map(|i| (0..dims).map(|a| pc.vectors[(i, a)]).collect()).collect());

        let run = |restart: usize| -> Fit {
            let fit = smacof(&ranks, self.start(restart, seed, n, dims, pcoa.as_ref()), &self.config);
            debug!(
                restart,
                stress = fit.stress,
                iterations = fit.iterations,
                converged = fit.converged,
                "NMDS start finished"
            );
            fit
        };
        let fits: Vec<Fit> = if self.config.parallel {
            (0..self.config.restarts).into_par_iter().map(run).collect()
        } else {
            (0..self.config.restarts).map(run).collect()
        };

        // min_by keeps the earliest of equal minima
        let best = fits
            .into_iter()
            .min_by(|a, b| a.stress.total_cmp(&b.stress))
            .ok_or_else(|| DivError::Numerical("No NMDS start completed".to_string()))?;

        let coordinates = principal_rotation(&best.points);
        let mut result = OrdinationResult::new(self.name(), dm.sample_ids().to_vec(), coordinates, best.stress);
        result.converged = best.converged;
        result.n_iterations = best.iterations;
        if !best.converged {
            let warning = ConvergenceWarning {
                iterations: best.iterations,
                stress: best.stress,
                restarts: self.config.restarts,
            };
            warn!("{}", warning);
            result.warning = Some(warning);
        }
        info!(
            dims,
            stress = result.stress,
            converged = result.converged,
            "NMDS ordination"
        );
        Ok(result)
    }
}
