//! Composable Community Diversity Library
//!
//! This library provides modular primitives for alpha and beta diversity
//! analysis of amplicon (16S/ITS) abundance tables.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (AbundanceMatrix, Taxonomy, Metadata, CommunityDataset)
//! - **filter**: Contaminant, library size and rare-taxon filtering
//! - **diversity**: Alpha indices and beta dissimilarities
//! - **ordination**: PCoA and non-metric multidimensional scaling
//! - **test**: Hypothesis tests (rank-based, parametric, PERMANOVA, dispersion)
//! - **correct**: Multiple testing correction (Holm, Bonferroni, Benjamini-Hochberg)
//! - **pipeline**: Pipeline composition and execution
//!
//! # Example
//!
//! ```no_run
//! use composable_diversity::prelude::*;
//!
//! let abundance = AbundanceMatrix::from_tsv("abundance.tsv").unwrap();
//! let taxonomy = Taxonomy::from_tsv("taxonomy.tsv").unwrap();
//! let metadata = Metadata::from_tsv("metadata.tsv").unwrap();
//! let dataset = CommunityDataset::build(abundance, taxonomy, metadata).unwrap();
//!
//! let report = DiversityPipeline::new()
//!     .contaminants(ContaminantFilter::bacteria_only())
//!     .prune(1e-5)
//!     .distance(DistanceMethod::BrayCurtis)
//!     .group_by("body.site")
//!     .seed(711)
//!     .run(&dataset)
//!     .unwrap();
//!
//! println!("{}", report);
//! ```

pub mod correct;
pub mod data;
pub mod diversity;
pub mod error;
pub mod filter;
pub mod ordination;
pub mod pipeline;
pub mod test;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::correct::{adjust, adjust_bh, adjust_bonferroni, adjust_holm, PAdjust};
    pub use crate::data::{
        write_diversity_tsv, AbundanceMatrix, CommunityDataset, DistanceMatrix, DiversityRecord,
        Factor, Metadata, PairwiseComparison, PairwiseFailure, Posthoc, Rank, SnapshotStore, SuiteReport, TaxonRecord,
        Taxonomy, TestOutcome, TestResult, Variable,
    };
    pub use crate::diversity::{
        compute_distance, compute_with, estimate, AlphaIndex, BrayCurtis, Dissimilarity,
        DistanceMethod, Jaccard,
    };
    pub use crate::error::{DivError, Result};
    pub use crate::filter::{
        filter_library_size, prune_rare_taxa, prune_rare_taxa_with_stats, ContaminantFilter,
        Exclusion, MissingRankPolicy, PruneSummary,
    };
    pub use crate::ordination::{
        principal_coordinates, Nmds, NmdsConfig, OrdinationResult, Ordinator, Pcoa,
    };
    pub use crate::pipeline::{DiversityPipeline, PipelineConfig, PipelineReport};
    pub use crate::test::{
        anova_oneway, betadisper, kruskal_wallis, mann_whitney, pairwise_permanova,
        pairwise_wilcox, permanova, permutest, shapiro_wilk, t_test, tukey_hsd, CentroidKind,
        Groups, HypothesisSuite, PermutationConfig, SuiteConfig, TTestKind,
    };
}
