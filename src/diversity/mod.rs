//! Alpha diversity indices and beta dissimilarities.

pub mod alpha;
pub mod beta;

pub use alpha::{estimate, grouped_rows, normality_by_index, values_for, AlphaIndex};
pub use beta::{compute_distance, compute_with, BrayCurtis, Dissimilarity, DistanceMethod, Jaccard};
