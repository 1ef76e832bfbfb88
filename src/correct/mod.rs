//! Multiple testing correction methods.

pub mod bh;
pub mod holm;

pub use bh::adjust_bh;
pub use holm::{adjust_bonferroni, adjust_holm};

use serde::{Deserialize, Serialize};

/// p-value adjustment applied to post-hoc comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PAdjust {
    #[default]
    Holm,
    Bonferroni,
    BenjaminiHochberg,
    None,
}

impl PAdjust {
    pub fn name(self) -> &'static str {
        match self {
            PAdjust::Holm => "holm",
            PAdjust::Bonferroni => "bonferroni",
            PAdjust::BenjaminiHochberg => "BH",
            PAdjust::None => "none",
        }
    }
}

/// Adjust `p_values` with `method`, preserving input order.
pub fn adjust(p_values: &[f64], method: PAdjust) -> Vec<f64> {
    match method {
        PAdjust::Holm => adjust_holm(p_values),
        PAdjust::Bonferroni => adjust_bonferroni(p_values),
        PAdjust::BenjaminiHochberg => adjust_bh(p_values),
        PAdjust::None => p_values.to_vec(),
    }
}

/// Indices that sort `p_values` ascending (NaN last).
fn sorted_order(p_values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..p_values.len()).collect();
    indices.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));
    indices
}
