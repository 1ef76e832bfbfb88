//! Sample covariates (body site, subject, antibiotic usage, ...).

use crate::error::{DivError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A covariate value: a categorical level or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with string levels.
    Categorical(String),
    /// Continuous numeric variable.
    Continuous(f64),
    /// Missing value.
    Missing,
}

impl Variable {
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            _ => None,
        }
    }

    /// Level label when this value is used as a grouping factor.
    ///
    /// Numeric values become levels through their display form, the way a
    /// numeric subject code is treated as a factor.
    pub fn as_level(&self) -> Option<String> {
        match self {
            Variable::Categorical(s) => Some(s.clone()),
            Variable::Continuous(v) => Some(v.to_string()),
            Variable::Missing => None,
        }
    }
}

/// Column type inferred when loading metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
}

/// A metadata column read as a grouping factor, aligned to sample order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    /// Column the factor was read from.
    pub name: String,
    /// One label per sample; `None` where the covariate is missing.
    pub labels: Vec<Option<String>>,
    /// Sorted distinct levels.
    pub levels: Vec<String>,
}

impl Factor {
    /// Build a factor from per-sample labels.
    pub fn new(name: &str, labels: Vec<Option<String>>) -> Self {
        let mut levels: Vec<String> = labels
            .iter()
            .flatten()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        levels.sort();
        Self {
            name: name.to_string(),
            labels,
            levels,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Level index of each sample (`None` where missing).
    pub fn codes(&self) -> Vec<Option<usize>> {
        self.labels
            .iter()
            .map(|label| {
                label
                    .as_ref()
                    .and_then(|l| self.levels.iter().position(|lvl| lvl == l))
            })
            .collect()
    }

    /// Indices of samples with a non-missing label.
    pub fn observed_indices(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_some())
            .map(|(i, _)| i)
            .collect()
    }
}

/// Sample metadata containing covariates for each sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Sample IDs in order.
    sample_ids: Vec<String>,
    /// Column names.
    column_names: Vec<String>,
    /// Data stored as sample_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
    /// Type hints for each column.
    column_types: HashMap<String, VariableType>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self {
            sample_ids: Vec::new(),
            column_names: Vec::new(),
            data: HashMap::new(),
            column_types: HashMap::new(),
        }
    }

    /// Build metadata from in-memory rows of `(sample_id, values)`.
    ///
    /// Column types are taken from the first non-missing value in each column.
    pub fn from_rows(column_names: Vec<String>, rows: Vec<(String, Vec<Variable>)>) -> Result<Self> {
        let mut sample_ids = Vec::with_capacity(rows.len());
        let mut data = HashMap::new();
        let mut column_types = HashMap::new();

        for (sample_id, values) in rows {
            if values.len() != column_names.len() {
                return Err(DivError::DimensionMismatch {
                    expected: column_names.len(),
                    actual: values.len(),
                });
            }
            if data.contains_key(&sample_id) {
                return Err(DivError::Alignment(format!(
                    "Duplicate sample '{}' in metadata",
                    sample_id
                )));
            }
            let mut sample_data = HashMap::new();
            for (col_name, value) in column_names.iter().zip(values) {
                let var_type = match &value {
                    Variable::Categorical(_) => Some(VariableType::Categorical),
                    Variable::Continuous(_) => Some(VariableType::Continuous),
                    Variable::Missing => None,
                };
                if let Some(t) = var_type {
                    column_types.entry(col_name.clone()).or_insert(t);
                }
                sample_data.insert(col_name.clone(), value);
            }
            sample_ids.push(sample_id.clone());
            data.insert(sample_id, sample_data);
        }

        Ok(Self {
            sample_ids,
            column_names,
            data,
            column_types,
        })
    }

    /// Load metadata from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is sample ID)
    /// - Subsequent rows: sample ID followed by covariate values
    ///
    /// Columns are inferred as continuous if all values parse as numbers,
    /// otherwise categorical. Empty cells and `NA` are missing.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| DivError::EmptyData("Empty metadata file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(DivError::EmptyData(
                "Metadata must have at least one covariate column".to_string(),
            ));
        }
        let column_names: Vec<String> = header[1..].iter().map(|s| s.trim().to_string()).collect();

        let mut raw_data: Vec<(String, Vec<String>)> = Vec::new();
        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let sample_id = fields[0].trim().to_string();
            let values: Vec<String> = fields[1..].iter().map(|s| s.to_string()).collect();
            raw_data.push((sample_id, values));
        }

        if raw_data.is_empty() {
            return Err(DivError::EmptyData("No samples in metadata".to_string()));
        }

        let is_missing = |v: &str| v.is_empty() || v == "NA" || v == "na";

        let mut column_types = HashMap::new();
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let all_numeric = raw_data.iter().all(|(_, values)| {
                values
                    .get(col_idx)
                    .map(|v| {
                        let v = v.trim();
                        is_missing(v) || v.parse::<f64>().is_ok()
                    })
                    .unwrap_or(true)
            });
            let var_type = if all_numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            column_types.insert(col_name.clone(), var_type);
        }

        let mut rows = Vec::with_capacity(raw_data.len());
        for (sample_id, values) in raw_data {
            let parsed: Vec<Variable> = column_names
                .iter()
                .enumerate()
                .map(|(col_idx, col_name)| {
                    let raw = values.get(col_idx).map(|v| v.trim()).unwrap_or("");
                    if is_missing(raw) {
                        return Variable::Missing;
                    }
                    match column_types.get(col_name) {
                        Some(VariableType::Continuous) => raw
                            .parse::<f64>()
                            .map(Variable::Continuous)
                            .unwrap_or(Variable::Missing),
                        Some(VariableType::Categorical) | None => {
                            Variable::Categorical(raw.to_string())
                        }
                    }
                })
                .collect();
            rows.push((sample_id, parsed));
        }

        let mut metadata = Self::from_rows(column_names, rows)?;
        metadata.column_types = column_types;
        Ok(metadata)
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Value for a specific sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|m| m.get(column))
    }

    /// All values of a column, in sample order.
    pub fn column(&self, column: &str) -> Result<Vec<&Variable>> {
        if !self.has_column(column) {
            return Err(DivError::MissingColumn(column.to_string()));
        }
        Ok(self
            .sample_ids
            .iter()
            .map(|sid| {
                self.data
                    .get(sid)
                    .and_then(|m| m.get(column))
                    .unwrap_or(&Variable::Missing)
            })
            .collect())
    }

    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// Sorted distinct non-missing levels of a column.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        Ok(self.factor(column)?.levels)
    }

    /// Read a column as a grouping factor aligned to sample order.
    pub fn factor(&self, column: &str) -> Result<Factor> {
        let labels = self
            .column(column)?
            .into_iter()
            .map(Variable::as_level)
            .collect();
        Ok(Factor::new(column, labels))
    }

    /// Factor aligned to an arbitrary sample order.
    pub fn factor_for(&self, column: &str, sample_ids: &[String]) -> Result<Factor> {
        if !self.has_column(column) {
            return Err(DivError::MissingColumn(column.to_string()));
        }
        let labels = sample_ids
            .iter()
            .map(|sid| self.get(sid, column).and_then(Variable::as_level))
            .collect();
        Ok(Factor::new(column, labels))
    }

    /// Subset (and reorder) metadata to the given samples.
    pub fn subset_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let mut new_data = HashMap::new();
        let mut new_sample_ids = Vec::with_capacity(sample_ids.len());

        for sid in sample_ids {
            match self.data.get(sid) {
                Some(sample_data) => {
                    new_data.insert(sid.clone(), sample_data.clone());
                    new_sample_ids.push(sid.clone());
                }
                None => {
                    return Err(DivError::Alignment(format!(
                        "Sample '{}' not found in metadata",
                        sid
                    )));
                }
            }
        }

        Ok(Self {
            sample_ids: new_sample_ids,
            column_names: self.column_names.clone(),
            data: new_data,
            column_types: self.column_types.clone(),
        })
    }

    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.data.contains_key(sample_id)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}
