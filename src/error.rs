//! Error types for the composable-diversity library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum DivError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid count value '{value}' at row {row}, column {col}")]
    InvalidCount {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Abundance, taxonomy and metadata disagree on their identifier sets.
    #[error("Alignment error: {0}")]
    Alignment(String),

    /// A sample with zero total abundance reached a within-sample computation.
    #[error("Sample '{sample_id}' has zero total abundance; alpha diversity is undefined")]
    EmptySample { sample_id: String },

    /// A sample with zero total abundance reached a between-sample computation.
    #[error("Sample '{sample_id}' has zero total abundance; dissimilarity is undefined")]
    DegenerateSample { sample_id: String },

    #[error("Insufficient groups: found {found} non-empty group(s), at least 2 required")]
    InsufficientGroups { found: usize },

    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, DivError>;
