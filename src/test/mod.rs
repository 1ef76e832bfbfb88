//! Statistical hypothesis testing for diversity measures.

pub mod multi_group;
pub mod normality;

pub use dispersion::{betadisper, pairwise_dispersion, permutest, CentroidKind, Dispersion};
pub use groups::Groups;
pub use multi_group::{anova_oneway, kruskal_wallis, pairwise_wilcox, tukey_hsd};
pub use normality::shapiro_wilk;
pub use permanova::{pairwise_permanova, permanova};
pub use permutation::{
    permutation_indices, permutation_test, permutation_test_against, PermutationConfig,
    PermutationOutcome,
};
pub use suite::{HypothesisSuite, SuiteConfig};
pub use two_group::{mann_whitney, mann_whitney_groups, t_test, t_test_groups, TTestKind};
