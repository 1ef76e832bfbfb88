//! End-to-end diversity analysis driven by a YAML configuration.

mod runner;

pub use runner::{DiversityPipeline, PipelineConfig, PipelineReport};
