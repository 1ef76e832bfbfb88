//! Taxonomy-based removal of organelle and off-target taxa.

use crate::data::{Rank, TaxonPredicate, TaxonRecord};
use serde::{Deserialize, Serialize};

/// How a taxon with no assignment at a checked rank is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRankPolicy {
    /// An absent assignment never matches an exclusion.
    #[default]
    Keep,
    /// An absent assignment at any checked rank excludes the taxon.
    Exclude,
}

/// A `(rank, value)` pair that marks a taxon as a contaminant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    pub rank: Rank,
    pub value: String,
}

impl Exclusion {
    pub fn new(rank: Rank, value: &str) -> Self {
        Self {
            rank,
            value: value.to_string(),
        }
    }
}

/// Contaminant predicate over the taxonomy table.
///
/// The default drops `Family == "Mitochondria"` and `Order == "Chloroplast"`
/// and keeps taxa whose family or order is unassigned. Values are compared
/// exactly after rank-prefix normalisation at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContaminantFilter {
    pub exclusions: Vec<Exclusion>,
    /// When set, taxa must carry this domain (e.g. "Bacteria").
    #[serde(default)]
    pub required_domain: Option<String>,
    #[serde(default)]
    pub missing: MissingRankPolicy,
}

impl Default for ContaminantFilter {
    fn default() -> Self {
        Self {
            exclusions: vec![
                Exclusion::new(Rank::Family, "Mitochondria"),
                Exclusion::new(Rank::Order, "Chloroplast"),
            ],
            required_domain: None,
            missing: MissingRankPolicy::Keep,
        }
    }
}

impl ContaminantFilter {
    /// Default exclusions plus a required bacterial domain.
    pub fn bacteria_only() -> Self {
        Self {
            required_domain: Some("Bacteria".to_string()),
            ..Default::default()
        }
    }

    pub fn with_missing_policy(mut self, missing: MissingRankPolicy) -> Self {
        self.missing = missing;
        self
    }

    /// Whether the record is flagged as a contaminant.
    pub fn is_contaminant(&self, record: &TaxonRecord) -> bool {
        for exclusion in &self.exclusions {
            match record.rank(exclusion.rank) {
                Some(value) if value == exclusion.value => return true,
                None if self.missing == MissingRankPolicy::Exclude => return true,
                _ => {}
            }
        }
        if let Some(domain) = &self.required_domain {
            match record.rank(Rank::Domain) {
                Some(value) => return value != domain,
                None => return self.missing == MissingRankPolicy::Exclude,
            }
        }
        false
    }
}

impl TaxonPredicate for ContaminantFilter {
    fn keep(&self, record: &TaxonRecord) -> bool {
        !self.is_contaminant(record)
    }
}
