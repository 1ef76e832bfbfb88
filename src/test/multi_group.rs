//! k-sample tests and their post-hoc comparisons.

use super::groups::{mean, Groups};
use super::ptukey::{ptukey, qtukey};
use super::ranks::{rank_with_ties, tie_sum};
use super::two_group::mann_whitney;
use crate::correct::PAdjust;
use crate::data::{PairwiseComparison, Posthoc, TestResult};
use crate::error::{DivError, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor};

/// Between- and within-group sums of squares of a one-way layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct OneWay {
    pub ss_between: f64,
    pub ss_within: f64,
    pub df_between: f64,
    pub df_within: f64,
}

impl OneWay {
    /// `values[i]` belongs to group `codes[i]` of `k`; every group is non-empty.
    pub fn fit(values: &[f64], codes: &[usize], k: usize) -> Self {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for (&v, &g) in values.iter().zip(codes) {
            sums[g] += v;
            counts[g] += 1;
        }
        let means: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect();
        let grand = mean(values);
        let ss_between = means
            .iter()
            .zip(&counts)
            .map(|(m, &c)| c as f64 * (m - grand).powi(2))
            .sum();
        let ss_within = values
            .iter()
            .zip(codes)
            .map(|(v, &g)| (v - means[g]).powi(2))
            .sum();
        Self {
            ss_between,
            ss_within,
            df_between: (k - 1) as f64,
            df_within: (values.len() - k) as f64,
        }
    }

    /// F ratio; infinite when the within-group spread is zero.
    pub fn f_statistic(&self) -> f64 {
        (self.ss_between / self.df_between) / (self.ss_within / self.df_within)
    }
}

/// Kruskal-Wallis rank sum test with tie correction.
pub fn kruskal_wallis(groups: &Groups) -> Result<TestResult> {
    let (values, codes) = groups.flatten();
    let n = values.len() as f64;
    let (ranks, ties) = rank_with_ties(&values);

    let mut rank_sums = vec![0.0; groups.n_groups()];
    for (r, &g) in ranks.iter().zip(&codes) {
        rank_sums[g] += r;
    }
    let h_raw = 12.0 / (n * (n + 1.0))
        * rank_sums
            .iter()
            .zip(groups.sizes())
            .map(|(r, size)| r * r / size as f64)
            .sum::<f64>()
        - 3.0 * (n + 1.0);
    let correction = 1.0 - tie_sum(&ties) / (n * n * n - n);
    if correction <= 0.0 {
        return Err(DivError::Numerical("All observations are tied".to_string()));
    }
    let h = h_raw / correction;

    let df = (groups.n_groups() - 1) as f64;
    let chi2 = ChiSquared::new(df).map_err(|e| DivError::Numerical(e.to_string()))?;
    let p_value = 1.0 - chi2.cdf(h);
    Ok(TestResult::new("Kruskal-Wallis", h, p_value).with_df(vec![df]))
}

/// One-way analysis of variance. The effect size is η² = SS_between / SS_total.
pub fn anova_oneway(groups: &Groups) -> Result<TestResult> {
    let (values, codes) = groups.flatten();
    if values.len() <= groups.n_groups() {
        return Err(DivError::InvalidParameter(
            "ANOVA needs more observations than groups".to_string(),
        ));
    }
    let fit = OneWay::fit(&values, &codes, groups.n_groups());
    if fit.ss_within <= 0.0 {
        return Err(DivError::Numerical("Zero within-group variance".to_string()));
    }

    let f = fit.f_statistic();
    let dist = FisherSnedecor::new(fit.df_between, fit.df_within).map_err(|e| DivError::Numerical(e.to_string()))?;
    let p_value = 1.0 - dist.cdf(f);

    let mut result = TestResult::new("ANOVA", f, p_value).with_df(vec![fit.df_between, fit.df_within]);
    result.effect_size = Some(fit.ss_between / (fit.ss_between + fit.ss_within));
    Ok(result)
}

/// Mann-Whitney tests between every pair of groups, adjusted with `method`.
///
/// A pair that cannot be tested (all values tied, say) is recorded as a
/// failure and left out of the adjustment.
pub fn pairwise_wilcox(groups: &Groups, method: PAdjust) -> Posthoc {
    let mut posthoc = Posthoc::default();
    for (i, j) in groups.pairs() {
        let (a, b) = (&groups.names()[i], &groups.names()[j]);
        let c = mann_whitney(groups.group(i), groups.group(j)).map(|r| {
            let mut c = PairwiseComparison::new(a, b, r.p_value);
            c.statistic = Some(r.statistic);
            c
        });
        posthoc.push(a, b, c);
    }
    posthoc.adjusted(method)
}

/// Tukey's honestly significant differences after a one-way ANOVA.
///
/// Each comparison carries the mean difference (second minus first group),
/// the studentized range statistic, the family-wise p-value in both p-value
/// fields and a simultaneous `conf_level` interval.
pub fn tukey_hsd(groups: &Groups, conf_level: f64) -> Result<Vec<PairwiseComparison>> {
    if !(0.0..1.0).contains(&conf_level) {
        return Err(DivError::InvalidParameter(
            "conf_level must be in [0, 1)".to_string(),
        ));
    }
    let (values, codes) = groups.flatten();
    let k = groups.n_groups();
    if values.len() <= k {
        return Err(DivError::InvalidParameter(
            "Tukey HSD needs more observations than groups".to_string(),
        ));
    }
    let fit = OneWay::fit(&values, &codes, k);
    let mse = fit.ss_within / fit.df_within;
    if mse <= 0.0 {
        return Err(DivError::Numerical("Zero within-group variance".to_string()));
    }
    let q_crit = qtukey(conf_level, k, fit.df_within);
    let sizes = groups.sizes();
    let means: Vec<f64> = (0..k).map(|g| mean(groups.group(g))).collect();

    Ok(groups
        .pairs()
        .into_iter()
        .map(|(i, j)| {
            let diff = means[j] - means[i];
            let se = (mse / 2.0 * (1.0 / sizes[i] as f64 + 1.0 / sizes[j] as f64)).sqrt();
            let q = diff.abs() / se;
            let p = (1.0 - ptukey(q, k, fit.df_within)).clamp(0.0, 1.0);
            let mut c = PairwiseComparison::new(&groups.names()[i], &groups.names()[j], p);
            c.estimate = Some(diff);
            c.statistic = Some(q);
            c.conf_low = Some(diff - q_crit * se);
            c.conf_high = Some(diff + q_crit * se);
            c
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Hollander & Wolfe data from the R `kruskal.test` help page.
    fn hollander_wolfe() -> Groups {
        let values = [2.9, 3.0, 2.5, 2.6, 3.2, 3.8, 2.7, 4.0, 2.4, 2.8, 3.4, 3.7, 2.2, 2.0];
        let labels: Vec<Option<String>> = ["a"; 5]
            .iter()
            .chain(["b"; 4].iter())
            .chain(["c"; 5].iter())
            .map(|s| Some(s.to_string()))
            .collect();
        Groups::from_labels(&values, &labels).unwrap()
    }

    fn separated() -> Groups {
        let values = [1.0, 1.2, 0.8, 1.1, 5.0, 5.3, 4.8, 5.1, 9.0, 9.2, 8.9, 9.1];
        let labels: Vec<Option<String>> = ["lo"; 4]
            .iter()
            .chain(["mid"; 4].iter())
            .chain(["hi"; 4].iter())
            .map(|s| Some(s.to_string()))
            .collect();
        Groups::from_labels(&values, &labels).unwrap()
    }

    #[test]
    fn test_kruskal_wallis_matches_r() {
        // Kruskal-Wallis chi-squared = 0.77143, df = 2, p-value = 0.68
        let r = kruskal_wallis(&hollander_wolfe()).unwrap();
        assert_relative_eq!(r.statistic, 0.77143, epsilon = 1e-4);
        assert_eq!(r.df, vec![2.0]);
        assert_relative_eq!(r.p_value, 0.68, epsilon = 1e-3);
    }

    #[test]
    fn test_anova() {
        let r = anova_oneway(&hollander_wolfe()).unwrap();
        assert_relative_eq!(r.statistic, 0.56007, epsilon = 1e-4);
        assert_eq!(r.df, vec![2.0, 11.0]);
        // F(2, 11) upper tail: (1 + 2F/11)^(-11/2)
        let expected = (1.0 + 2.0 * r.statistic / 11.0).powf(-5.5);
        assert_relative_eq!(r.p_value, expected, epsilon = 1e-6);
        assert_relative_eq!(r.effect_size.unwrap(), 0.09242, epsilon = 1e-4);

        let r = anova_oneway(&separated()).unwrap();
        assert!(r.p_value < 1e-6);
    }

    #[test]
    fn test_tukey_hsd() {
        let cmp = tukey_hsd(&hollander_wolfe(), 0.95).unwrap();
        assert_eq!(cmp.len(), 3);
        assert_eq!((cmp[0].group_a.as_str(), cmp[0].group_b.as_str()), ("a", "b"));
        assert_relative_eq!(cmp[0].estimate.unwrap(), 0.385, epsilon = 1e-9);
        assert_relative_eq!(cmp[0].p_value, 0.6462, epsilon = 2e-3);
        assert_relative_eq!(cmp[0].conf_low.unwrap(), -0.7592, epsilon = 2e-3);
        assert_relative_eq!(cmp[0].conf_high.unwrap(), 1.5292, epsilon = 2e-3);

        let cmp = tukey_hsd(&separated(), 0.95).unwrap();
        assert!(cmp.iter().all(|c| c.p_value < 0.001));
    }

    #[test]
    fn test_pairwise_wilcox_holm() {
        let posthoc = pairwise_wilcox(&separated(), PAdjust::Holm);
        assert!(posthoc.failures.is_empty());
        assert_eq!(posthoc.comparisons.len(), 3);
        for c in &posthoc.comparisons {
            // exact p for complete separation of 4 vs 4 is 2/70
            assert_relative_eq!(c.p_value, 2.0 / 70.0, epsilon = 1e-12);
            assert!(c.p_adjusted >= c.p_value);
        }
        let none = pairwise_wilcox(&separated(), PAdjust::None);
        assert_eq!(none.comparisons[0].p_adjusted, none.comparisons[0].p_value);
    }

    #[test]
    fn test_pairwise_wilcox_tied_pair_kept_apart() {
        let labels: Vec<Option<String>> =
            ["a", "a", "b", "b", "c", "c"].iter().map(|s| Some(s.to_string())).collect();
        let groups = Groups::from_labels(&[1.0, 2.0, 7.0, 7.0, 7.0, 7.0], &labels).unwrap();
        assert!(kruskal_wallis(&groups).is_ok());

        let posthoc = pairwise_wilcox(&groups, PAdjust::Bonferroni);
        assert_eq!(posthoc.len(), 3);
        assert_eq!(posthoc.comparisons.len(), 2);
        assert_eq!(posthoc.failures.len(), 1);
        let failed = &posthoc.failures[0];
        assert_eq!((failed.group_a.as_str(), failed.group_b.as_str()), ("b", "c"));
        assert!(failed.error.contains("tied"));
        // only the two computed p-values share the correction
        for c in &posthoc.comparisons {
            assert_relative_eq!(c.p_adjusted, (2.0 * c.p_value).min(1.0), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        let labels: Vec<Option<String>> = ["a", "a", "b", "b"].iter().map(|s| Some(s.to_string())).collect();
        let tied = Groups::from_labels(&[1.0, 1.0, 1.0, 1.0], &labels).unwrap();
        assert!(kruskal_wallis(&tied).is_err());
        assert!(anova_oneway(&tied).is_err());

        let singletons = Groups::from_labels(&[1.0, 2.0], &labels[1..3]).unwrap();
        assert!(anova_oneway(&singletons).is_err());
    }
}
