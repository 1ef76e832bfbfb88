//! Filtering primitives for community datasets.

pub mod abundance;
pub mod contaminant;
pub mod library_size;

pub use abundance::{prune_rare_taxa, prune_rare_taxa_with_stats, PruneSummary};
pub use contaminant::{ContaminantFilter, Exclusion, MissingRankPolicy};
pub use library_size::filter_library_size;
