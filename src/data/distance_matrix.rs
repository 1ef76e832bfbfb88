//! Condensed symmetric sample × sample dissimilarity matrix.

use crate::error::{DivError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Pairwise dissimilarities between samples.
///
/// Stores one value per unordered pair (upper triangle, row-major); the
/// diagonal is implicitly zero. Only symmetry and non-negativity are
/// guaranteed: the triangle inequality may fail for semimetric methods
/// such as Bray-Curtis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    sample_ids: Vec<String>,
    method: String,
    condensed: Vec<f64>,
}

#[inline]
fn condensed_index(n: usize, i: usize, j: usize) -> usize {
    let (a, b) = if i < j { (i, j) } else { (j, i) };
    a * n - a * (a + 1) / 2 + (b - a - 1)
}

impl DistanceMatrix {
    /// Wrap a condensed vector of `n(n-1)/2` values.
    pub fn new(sample_ids: Vec<String>, method: &str, condensed: Vec<f64>) -> Result<Self> {
        let n = sample_ids.len();
        let expected = n * n.saturating_sub(1) / 2;
        if condensed.len() != expected {
            return Err(DivError::DimensionMismatch {
                expected,
                actual: condensed.len(),
            });
        }
        if let Some(bad) = condensed.iter().find(|d| !d.is_finite() || **d < 0.0) {
            return Err(DivError::Numerical(format!(
                "Dissimilarities must be finite and non-negative, found {}",
                bad
            )));
        }
        Ok(Self {
            sample_ids,
            method: method.to_string(),
            condensed,
        })
    }

    /// Build from a square matrix, checking symmetry and a zero diagonal.
    pub fn from_dense(sample_ids: Vec<String>, method: &str, dense: &DMatrix<f64>) -> Result<Self> {
        let n = sample_ids.len();
        if dense.nrows() != n || dense.ncols() != n {
            return Err(DivError::DimensionMismatch {
                expected: n,
                actual: dense.nrows(),
            });
        }
        let mut condensed = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            if dense[(i, i)].abs() > 1e-12 {
                return Err(DivError::Numerical(format!(
                    "Non-zero diagonal at sample '{}'",
                    sample_ids[i]
                )));
            }
            for j in (i + 1)..n {
                if (dense[(i, j)] - dense[(j, i)]).abs() > 1e-12 {
                    return Err(DivError::Numerical(format!(
                        "Asymmetric dissimilarity between '{}' and '{}'",
                        sample_ids[i], sample_ids[j]
                    )));
                }
                condensed.push(dense[(i, j)]);
            }
        }
        Self::new(sample_ids, method, condensed)
    }

    pub fn n(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Name of the dissimilarity method that produced the matrix.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn condensed(&self) -> &[f64] {
        &self.condensed
    }

    /// Dissimilarity between samples `i` and `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            0.0
        } else {
            self.condensed[condensed_index(self.n(), i, j)]
        }
    }

    pub fn index_of(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|s| s == sample_id)
    }

    /// Dissimilarity between two samples by identifier.
    pub fn between(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.get(self.index_of(a)?, self.index_of(b)?))
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let n = self.n();
        DMatrix::from_fn(n, n, |i, j| self.get(i, j))
    }

    /// Restrict to the samples at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n()) {
            return Err(DivError::InvalidParameter(format!(
                "Sample index {} out of bounds",
                bad
            )));
        }
        let mut condensed = Vec::with_capacity(indices.len() * indices.len().saturating_sub(1) / 2);
        for (a, &i) in indices.iter().enumerate() {
            for &j in &indices[a + 1..] {
                condensed.push(self.get(i, j));
            }
        }
        let sample_ids = indices.iter().map(|&i| self.sample_ids[i].clone()).collect();
        Self::new(sample_ids, &self.method, condensed)
    }

    /// Write as a square TSV with sample IDs on both axes.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write!(writer, "{}", self.method)?;
        for id in &self.sample_ids {
            write!(writer, "\t{}", id)?;
        }
        writeln!(writer)?;
        for i in 0..self.n() {
            write!(writer, "{}", self.sample_ids[i])?;
            for j in 0..self.n() {
                write!(writer, "\t{:.6}", self.get(i, j))?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}
