//! Benjamini-Hochberg false discovery rate correction.

use super::sorted_order;

/// Apply Benjamini-Hochberg FDR correction.
///
/// For p-values sorted ascending, the adjusted value at rank `i` is
/// `min(p[i] * n / i, q[i+1])`, capped at 1. Output follows input order.
pub fn adjust_bh(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    if n == 0 {
        return Vec::new();
    }

    let indices = sorted_order(p_values);
    let mut q_sorted = vec![0.0; n];
    let n_f64 = n as f64;

    // Start from largest p-value
    q_sorted[n - 1] = p_values[indices[n - 1]].min(1.0);

    // Work backwards
    for i in (0..n - 1).rev() {
        let rank = i + 1;
        let adjusted = p_values[indices[i]] * n_f64 / rank as f64;
        q_sorted[i] = adjusted.min(q_sorted[i + 1]).min(1.0);
    }

    let mut q_values = vec![0.0; n];
    for (i, &orig_idx) in indices.iter().enumerate() {
        q_values[orig_idx] = q_sorted[i];
    }
    q_values
}
