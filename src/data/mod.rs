//! Data structures for community diversity analysis.

mod abundance;
mod dataset;
mod distance_matrix;
mod metadata;
mod result;
pub mod snapshot;
mod taxonomy;

pub use abundance::AbundanceMatrix;
pub use dataset::{CommunityDataset, RankAbundance, TaxonPredicate, UNASSIGNED};
pub use distance_matrix::DistanceMatrix;
pub use metadata::{Factor, Metadata, Variable, VariableType};
pub use result::{
    write_diversity_tsv, DiversityRecord, GroupedValue, PairwiseComparison, PairwiseFailure,
    Posthoc, SuiteReport, TestOutcome, TestResult,
};
pub use snapshot::{SnapshotStore, FILTERED_DATASET_KEY};
pub use taxonomy::{normalize_assignment, Rank, TaxonRecord, Taxonomy};
