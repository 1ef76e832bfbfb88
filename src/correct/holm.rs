//! Family-wise error rate corrections.

use super::sorted_order;

/// Holm step-down adjustment.
///
/// For p-values sorted ascending, the adjusted value at position `i`
/// (0-based) is the running maximum of `(n - i) * p[i]`, capped at 1, so
/// each adjusted value is at least its raw p-value and the ordering of the
/// raw values is preserved.
pub fn adjust_holm(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    let indices = sorted_order(p_values);

    let mut adjusted = vec![0.0; n];
    let mut running_max: f64 = 0.0;
    for (i, &orig_idx) in indices.iter().enumerate() {
        let scaled = ((n - i) as f64 * p_values[orig_idx]).min(1.0);
        running_max = running_max.max(scaled);
        adjusted[orig_idx] = running_max;
    }
    adjusted
}

/// Bonferroni adjustment: `min(n * p, 1)`.
pub fn adjust_bonferroni(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len() as f64;
    p_values.iter().map(|&p| (p * n).min(1.0)).collect()
}
