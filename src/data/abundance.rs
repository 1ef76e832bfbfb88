//! Sparse taxon abundance matrix for amplicon count tables.

use crate::error::{DivError, Result};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A sparse matrix of non-negative read counts.
///
/// Rows are taxa, columns are samples. Stored in CSR form, so per-taxon
/// operations (totals, subsetting) are cheap and per-sample profiles are
/// materialised on demand with [`AbundanceMatrix::sample_profile`].
#[derive(Debug, Clone)]
pub struct AbundanceMatrix {
    /// Sparse matrix in CSR format (taxa × samples).
    data: CsMat<u64>,
    /// Taxon identifiers (row names), in input order.
    taxon_ids: Vec<String>,
    /// Sample identifiers (column names), in input order.
    sample_ids: Vec<String>,
}

impl AbundanceMatrix {
    /// Create a matrix from a sparse taxa × samples matrix and identifiers.
    pub fn new(data: CsMat<u64>, taxon_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != taxon_ids.len() {
            return Err(DivError::DimensionMismatch {
                expected: nrows,
                actual: taxon_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(DivError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        Ok(Self {
            data,
            taxon_ids,
            sample_ids,
        })
    }

    /// Build from per-sample count rows (sample × taxon orientation).
    ///
    /// `rows[s][t]` is the count of taxon `t` in sample `s`.
    pub fn from_sample_rows(
        sample_ids: Vec<String>,
        taxon_ids: Vec<String>,
        rows: &[Vec<u64>],
    ) -> Result<Self> {
        if rows.len() != sample_ids.len() {
            return Err(DivError::DimensionMismatch {
                expected: sample_ids.len(),
                actual: rows.len(),
            });
        }
        let mut tri_mat = TriMat::new((taxon_ids.len(), sample_ids.len()));
        for (col, row) in rows.iter().enumerate() {
            if row.len() != taxon_ids.len() {
                return Err(DivError::DimensionMismatch {
                    expected: taxon_ids.len(),
                    actual: row.len(),
                });
            }
            for (taxon, &count) in row.iter().enumerate() {
                if count > 0 {
                    tri_mat.add_triplet(taxon, col, count);
                }
            }
        }
        Self::new(tri_mat.to_csr(), taxon_ids, sample_ids)
    }

    /// Build from `(taxon, sample, count)` triplets.
    pub fn from_triplets(
        taxon_ids: Vec<String>,
        sample_ids: Vec<String>,
        triplets: &[(usize, usize, u64)],
    ) -> Result<Self> {
        let mut tri_mat = TriMat::new((taxon_ids.len(), sample_ids.len()));
        for &(row, col, count) in triplets {
            if row >= taxon_ids.len() || col >= sample_ids.len() {
                return Err(DivError::InvalidParameter(format!(
                    "Triplet ({}, {}) outside a {} × {} matrix",
                    row,
                    col,
                    taxon_ids.len(),
                    sample_ids.len()
                )));
            }
            if count > 0 {
                tri_mat.add_triplet(row, col, count);
            }
        }
        Self::new(tri_mat.to_csr(), taxon_ids, sample_ids)
    }

    /// Load a count table from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with sample IDs (first column is the taxon ID header)
    /// - Subsequent rows: taxon ID followed by one count per sample
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| DivError::EmptyData("Empty abundance table".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(DivError::EmptyData(
                "Abundance table must have at least one sample column".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header[1..].iter().map(|s| s.trim().to_string()).collect();
        let n_samples = sample_ids.len();

        let mut triplets: Vec<(usize, usize, u64)> = Vec::new();
        let mut taxon_ids: Vec<String> = Vec::new();

        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let row_idx = taxon_ids.len();
            let fields: Vec<&str> = line.split('\t').collect();
            taxon_ids.push(fields[0].trim().to_string());

            if fields.len() - 1 != n_samples {
                return Err(DivError::DimensionMismatch {
                    expected: n_samples,
                    actual: fields.len() - 1,
                });
            }
            for (col_idx, value_str) in fields[1..].iter().enumerate() {
                let value: u64 = value_str.trim().parse().map_err(|_| DivError::InvalidCount {
                    value: value_str.to_string(),
                    row: row_idx,
                    col: col_idx,
                })?;
                if value > 0 {
                    triplets.push((row_idx, col_idx, value));
                }
            }
        }

        if taxon_ids.is_empty() {
            return Err(DivError::EmptyData("No taxa in abundance table".to_string()));
        }

        Self::from_triplets(taxon_ids, sample_ids, &triplets)
    }

    /// Write the matrix to a TSV file (taxa as rows).
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "taxon_id")?;
        for sample_id in &self.sample_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row_idx, taxon_id) in self.taxon_ids.iter().enumerate() {
            write!(writer, "{}", taxon_id)?;
            for value in self.taxon_profile(row_idx) {
                write!(writer, "\t{}", value)?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Count of `taxon` in `sample`, zero for unstored entries.
    #[inline]
    pub fn get(&self, taxon: usize, sample: usize) -> u64 {
        self.data.get(taxon, sample).copied().unwrap_or(0)
    }

    #[inline]
    pub fn n_taxa(&self) -> usize {
        self.taxon_ids.len()
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    #[inline]
    pub fn taxon_ids(&self) -> &[String] {
        &self.taxon_ids
    }

    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Non-zero entries as `(taxon, sample, count)` triplets in row order.
    pub fn triplets(&self) -> Vec<(usize, usize, u64)> {
        self.data
            .outer_iterator()
            .enumerate()
            .flat_map(|(row, row_vec)| {
                row_vec
                    .iter()
                    .map(move |(col, &val)| (row, col, val))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Dense counts of one taxon across all samples.
    pub fn taxon_profile(&self, taxon: usize) -> Vec<u64> {
        let mut dense = vec![0u64; self.n_samples()];
        if let Some(row_vec) = self.data.outer_view(taxon) {
            for (col, &val) in row_vec.iter() {
                dense[col] = val;
            }
        }
        dense
    }

    /// Dense count vector of one sample over all taxa.
    pub fn sample_profile(&self, sample: usize) -> Vec<u64> {
        (0..self.n_taxa()).map(|taxon| self.get(taxon, sample)).collect()
    }

    /// All sample profiles, one dense vector per sample.
    pub fn sample_profiles(&self) -> Vec<Vec<u64>> {
        let mut profiles = vec![vec![0u64; self.n_taxa()]; self.n_samples()];
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                profiles[col][row] = val;
            }
        }
        profiles
    }

    /// Total count of each taxon across samples.
    pub fn taxon_totals(&self) -> Vec<u64> {
        (0..self.n_taxa())
            .into_par_iter()
            .map(|row| {
                self.data
                    .outer_view(row)
                    .map(|v| v.iter().map(|(_, &val)| val).sum())
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Sequencing depth (total count) of each sample.
    pub fn sample_totals(&self) -> Vec<u64> {
        let mut sums = vec![0u64; self.n_samples()];
        for row_vec in self.data.outer_iterator() {
            for (col, &val) in row_vec.iter() {
                sums[col] += val;
            }
        }
        sums
    }

    /// Sum of every count in the matrix.
    pub fn grand_total(&self) -> u64 {
        self.data.data().iter().sum()
    }

    /// Keep only the taxa at `indices`, in the given order.
    pub fn subset_taxa(&self, indices: &[usize]) -> Result<Self> {
        let mut triplets = Vec::new();
        let mut new_taxon_ids = Vec::with_capacity(indices.len());

        for (new_row, &old_row) in indices.iter().enumerate() {
            if old_row >= self.n_taxa() {
                return Err(DivError::InvalidParameter(format!(
                    "Taxon index {} out of bounds",
                    old_row
                )));
            }
            new_taxon_ids.push(self.taxon_ids[old_row].clone());
            if let Some(row_vec) = self.data.outer_view(old_row) {
                for (col, &val) in row_vec.iter() {
                    triplets.push((new_row, col, val));
                }
            }
        }

        Self::from_triplets(new_taxon_ids, self.sample_ids.clone(), &triplets)
    }

    /// Keep only the samples at `indices`, in the given order.
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let col_map: HashMap<usize, usize> = indices
            .iter()
            .enumerate()
            .map(|(new_idx, &old_idx)| (old_idx, new_idx))
            .collect();

        let mut new_sample_ids = Vec::with_capacity(indices.len());
        for &old_col in indices {
            if old_col >= self.n_samples() {
                return Err(DivError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    old_col
                )));
            }
            new_sample_ids.push(self.sample_ids[old_col].clone());
        }

        let mut triplets = Vec::new();
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (old_col, &val) in row_vec.iter() {
                if let Some(&new_col) = col_map.get(&old_col) {
                    triplets.push((row, new_col, val));
                }
            }
        }

        Self::from_triplets(self.taxon_ids.clone(), new_sample_ids, &triplets)
    }

    /// Same counts under new taxon identifiers.
    pub fn with_taxon_ids(&self, taxon_ids: Vec<String>) -> Result<Self> {
        Self::new(self.data.clone(), taxon_ids, self.sample_ids.clone())
    }
}
