//! Shapiro-Wilk test of normality.
//!
//! Coefficients and p-values follow Royston's approximations (Applied
//! Statistics algorithm R94), valid for 3 to 5000 observations.

use crate::data::TestResult;
use crate::error::{DivError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.5440, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

/// `c[0] + c[1] x + c[2] x² + ...`
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, &coef| acc * x + coef)
}

/// Coefficients `a_1 ≥ a_2 ≥ ... ≥ a_{n/2}` pairing `x_(n+1-i) - x_(i)`.
fn coefficients(n: usize, normal: &Normal) -> Vec<f64> {
    let half = n / 2;
    if n == 3 {
        return vec![std::f64::consts::FRAC_1_SQRT_2];
    }

    let an25 = n as f64 + 0.25;
    let m: Vec<f64> = (1..=half)
        .map(|i| -normal.inverse_cdf((i as f64 - 0.375) / an25))
        .collect();
    let summ2: f64 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let u = 1.0 / (n as f64).sqrt();

    let mut a = vec![0.0; half];
    let a1 = m[0] / ssumm2 + poly(&C1, u);
    a[0] = a1;
    let (first_free, eps) = if n > 5 {
        let a2 = m[1] / ssumm2 + poly(&C2, u);
        a[1] = a2;
        let eps = (summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1]) / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2);
        (2, eps)
    } else {
        let eps = (summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1);
        (1, eps)
    };
    let fac = eps.sqrt();
    for i in first_free..half {
        a[i] = m[i] / fac;
    }
    a
}

/// Shapiro-Wilk W statistic and p-value for a numeric sample.
pub fn shapiro_wilk(values: &[f64]) -> Result<TestResult> {
    let n = values.len();
    if !(3..=5000).contains(&n) {
        return Err(DivError::InvalidParameter(format!(
            "Shapiro-Wilk requires between 3 and 5000 observations, got {}",
            n
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DivError::Numerical("Shapiro-Wilk input contains non-finite values".to_string()));
    }

    let mut x = values.to_vec();
    x.sort_by(|a, b| a.total_cmp(b));
    if x[n - 1] - x[0] < 1e-10 * x[n - 1].abs().max(1.0) {
        return Err(DivError::Numerical("All values are identical".to_string()));
    }

    let normal = Normal::new(0.0, 1.0).map_err(|e| DivError::Numerical(e.to_string()))?;
    let a = coefficients(n, &normal);

    let mean = x.iter().sum::<f64>() / n as f64;
    let ss: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    let b: f64 = a
        .iter()
        .enumerate()
        .map(|(i, ai)| ai * (x[n - 1 - i] - x[i]))
        .sum();
    let w = (b * b / ss).min(1.0);

    let p_value = shapiro_p_value(w, n, &normal);
    Ok(TestResult::new("Shapiro-Wilk", w, p_value))
}

fn shapiro_p_value(w: f64, n: usize, normal: &Normal) -> f64 {
    if n == 3 {
        let p = 6.0 / std::f64::consts::PI * (w.sqrt().asin() - 0.75f64.sqrt().asin());
        return p.clamp(0.0, 1.0);
    }
    let one_minus_w = 1.0 - w;
    if one_minus_w <= 0.0 {
        return 1.0;
    }
    let y = one_minus_w.ln();
    let nf = n as f64;
    let (z, m, s) = if n <= 11 {
        let gamma = poly(&G, nf);
        if y >= gamma {
            return 0.0;
        }
        (-(gamma - y).ln(), poly(&C3, nf), poly(&C4, nf).exp())
    } else {
        let ln_n = nf.ln();
        (y, poly(&C5, ln_n), poly(&C6, ln_n).exp())
    };
    1.0 - normal.cdf((z - m) / s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_poly() {
        assert_relative_eq!(poly(&[1.0, 2.0, 3.0], 2.0), 17.0);
    }

    #[test]
    fn test_coefficients_match_published_table() {
        let normal = Normal::new(0.0, 1.0).unwrap();
        // Shapiro & Wilk (1965) table, n = 10: a1 = 0.5739, a2 = 0.3291
        let a = coefficients(10, &normal);
        assert_eq!(a.len(), 5);
        assert_relative_eq!(a[0], 0.5739, epsilon = 5e-3);
        assert_relative_eq!(a[1], 0.3291, epsilon = 5e-3);
        assert!(a.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_normal_looking_sample() {
        // symmetric, bell-shaped
        let x = [
            -1.9, -1.3, -0.9, -0.6, -0.4, -0.2, -0.05, 0.0, 0.05, 0.2, 0.4, 0.6, 0.9, 1.3, 1.9,
        ];
        let r = shapiro_wilk(&x).unwrap();
        assert!(r.statistic > 0.95);
        assert!(r.p_value > 0.1);
    }

    #[test]
    fn test_skewed_sample_rejected() {
        let x = [1.0, 1.1, 1.0, 1.2, 1.1, 1.0, 1.3, 1.1, 1.0, 9.0, 15.0, 30.0];
        let r = shapiro_wilk(&x).unwrap();
        assert!(r.statistic < 0.8);
        assert!(r.p_value < 0.01);
    }

    #[test]
    fn test_matches_r_reference() {
        // shapiro.test(1:20): W = 0.96036, p-value = 0.5517
        let x: Vec<f64> = (1..=20).map(f64::from).collect();
        let r = shapiro_wilk(&x).unwrap();
        assert_relative_eq!(r.statistic, 0.96036, epsilon = 1e-4);
        assert_relative_eq!(r.p_value, 0.5517, epsilon = 1e-3);
    }

    #[test]
    fn test_three_points() {
        // equally spaced points give W = 1
        let r = shapiro_wilk(&[1.0, 2.0, 3.0]).unwrap();
        assert_relative_eq!(r.statistic, 1.0, epsilon = 1e-12);
        assert_relative_eq!(r.p_value, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(shapiro_wilk(&[1.0, 2.0]).is_err());
        assert!(shapiro_wilk(&[4.0, 4.0, 4.0, 4.0]).is_err());
        assert!(shapiro_wilk(&[1.0, f64::NAN, 2.0]).is_err());
    }
}
