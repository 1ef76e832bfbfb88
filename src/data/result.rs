//! Result records handed to reporting and plotting layers.

use crate::correct::{adjust, PAdjust};
use crate::diversity::AlphaIndex;
use crate::error::{DivError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// One alpha-diversity value for one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiversityRecord {
    pub sample_id: String,
    pub index: AlphaIndex,
    pub value: f64,
}

/// A `{sample, metric, group}` row for plotting collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedValue {
    pub sample_id: String,
    pub metric: String,
    pub value: f64,
    pub group: Option<String>,
}

/// Write diversity records as a long-format TSV.
pub fn write_diversity_tsv<P: AsRef<Path>>(records: &[DiversityRecord], path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "sample_id\tindex\tvalue")?;
    for r in records {
        writeln!(writer, "{}\t{}\t{:.6}", r.sample_id, r.index.name(), r.value)?;
    }
    writer.flush()?;
    Ok(())
}

/// One post-hoc comparison between two groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseComparison {
    pub group_a: String,
    pub group_b: String,
    /// Difference of means (`b - a`) where the test defines one.
    pub estimate: Option<f64>,
    pub statistic: Option<f64>,
    pub p_value: f64,
    pub p_adjusted: f64,
    /// Simultaneous confidence interval, for Tukey HSD.
    pub conf_low: Option<f64>,
    pub conf_high: Option<f64>,
}

impl PairwiseComparison {
    pub fn new(group_a: &str, group_b: &str, p_value: f64) -> Self {
        Self {
            group_a: group_a.to_string(),
            group_b: group_b.to_string(),
            estimate: None,
            statistic: None,
            p_value,
            p_adjusted: p_value,
            conf_low: None,
            conf_high: None,
        }
    }
}

/// A pair of groups that could not be compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseFailure {
    pub group_a: String,
    pub group_b: String,
    pub error: String,
}

/// Pairwise follow-up of an omnibus test.
///
/// A pair that fails lands in `failures` and the remaining pairs are still
/// compared. Only the successful comparisons share a p-value adjustment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Posthoc {
    pub comparisons: Vec<PairwiseComparison>,
    pub failures: Vec<PairwiseFailure>,
}

impl Posthoc {
    /// Add the outcome of comparing `group_a` with `group_b`.
    pub fn push(&mut self, group_a: &str, group_b: &str, result: Result<PairwiseComparison>) {
        match result {
            Ok(c) => self.comparisons.push(c),
            Err(e) => {
                debug!(group_a, group_b, error = %e, "Pairwise comparison failed");
                self.failures.push(PairwiseFailure {
                    group_a: group_a.to_string(),
                    group_b: group_b.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Every pair failed for the same reason.
    pub fn all_failed<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>, error: &DivError) -> Self {
        let mut posthoc = Self::default();
        for (a, b) in pairs {
            posthoc.failures.push(PairwiseFailure {
                group_a: a.to_string(),
                group_b: b.to_string(),
                error: error.to_string(),
            });
        }
        posthoc
    }

    /// Fill `p_adjusted` of the successful comparisons.
    pub fn adjusted(mut self, method: PAdjust) -> Self {
        let raw: Vec<f64> = self.comparisons.iter().map(|c| c.p_value).collect();
        for (c, adj) in self.comparisons.iter_mut().zip(adjust(&raw, method)) {
            c.p_adjusted = adj;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.comparisons.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one hypothesis test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Test name, e.g. "Kruskal-Wallis".
    pub test: String,
    pub statistic: f64,
    pub p_value: f64,
    /// Metadata column the samples were grouped by.
    pub grouping: Option<String>,
    /// Degrees of freedom, when the test has them.
    pub df: Vec<f64>,
    /// R² for variance partitioning tests.
    pub effect_size: Option<f64>,
    /// Permutations used for the p-value, for permutation tests.
    pub n_permutations: Option<usize>,
    pub pairwise: Vec<PairwiseComparison>,
    /// Pairs whose follow-up comparison could not be computed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pairwise_failures: Vec<PairwiseFailure>,
}

impl TestResult {
    pub fn new(test: &str, statistic: f64, p_value: f64) -> Self {
        Self {
            test: test.to_string(),
            statistic,
            p_value,
            grouping: None,
            df: Vec::new(),
            effect_size: None,
            n_permutations: None,
            pairwise: Vec::new(),
            pairwise_failures: Vec::new(),
        }
    }

    pub fn with_grouping(mut self, grouping: &str) -> Self {
        self.grouping = Some(grouping.to_string());
        self
    }

    pub fn with_df(mut self, df: Vec<f64>) -> Self {
        self.df = df;
        self
    }

    pub fn with_posthoc(mut self, posthoc: Posthoc) -> Self {
        self.pairwise = posthoc.comparisons;
        self.pairwise_failures = posthoc.failures;
        self
    }

    pub fn is_significant_at(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// One entry of a suite run: the result, or why the test could not run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Test name.
    pub test: String,
    /// Quantity tested: an alpha index name or a distance method.
    pub target: String,
    pub grouping: Option<String>,
    pub result: Option<TestResult>,
    pub error: Option<String>,
}

impl TestOutcome {
    /// Record a test's result, keeping the error message on failure.
    pub fn from_result(test: &str, target: &str, grouping: Option<&str>, result: Result<TestResult>) -> Self {
        let (result, error) = match result {
            Ok(r) => (Some(r), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            test: test.to_string(),
            target: target.to_string(),
            grouping: grouping.map(String::from),
            result,
            error,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_some()
    }
}

/// Results of a batch of tests, including failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteReport {
    pub outcomes: Vec<TestOutcome>,
}

impl SuiteReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &TestOutcome> {
        self.outcomes.iter().filter(|o| o.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TestOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn n_failed(&self) -> usize {
        self.failed().count()
    }

    /// Find the result of `test` on `target`.
    pub fn find(&self, test: &str, target: &str) -> Option<&TestResult> {
        self.outcomes
            .iter()
            .find(|o| o.test == test && o.target == target)
            .and_then(|o| o.result.as_ref())
    }

    pub fn extend(&mut self, other: SuiteReport) {
        self.outcomes.extend(other.outcomes);
    }

    /// One row per test (pairwise detail is only in the JSON form).
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "test\ttarget\tgrouping\tstatistic\tp_value\tstatus")?;
        for o in &self.outcomes {
            let grouping = o.grouping.as_deref().unwrap_or("");
            match (&o.result, &o.error) {
                (Some(r), _) => writeln!(
                    writer,
                    "{}\t{}\t{}\t{:.6}\t{:.4e}\tok",
                    o.test, o.target, grouping, r.statistic, r.p_value
                )?,
                (None, err) => writeln!(
                    writer,
                    "{}\t{}\t{}\tNA\tNA\tfailed: {}",
                    o.test,
                    o.target,
                    grouping,
                    err.as_deref().unwrap_or("unknown")
                )?,
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl std::fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Hypothesis tests: {} run, {} failed", self.len(), self.n_failed())?;
        for o in &self.outcomes {
            let grouping = o.grouping.as_deref().unwrap_or("-");
            match &o.result {
                Some(r) => {
                    writeln!(
                        f,
                        "  {:<22} {:<14} {:<28} stat={:>10.4}  p={:.4}",
                        o.test, o.target, grouping, r.statistic, r.p_value
                    )?;
                    for failed in &r.pairwise_failures {
                        writeln!(f, "    {} vs {}: FAILED: {}", failed.group_a, failed.group_b, failed.error)?;
                    }
                }
                None => writeln!(
                    f,
                    "  {:<22} {:<14} {:<28} FAILED: {}",
                    o.test,
                    o.target,
                    grouping,
                    o.error.as_deref().unwrap_or("unknown")
                )?,
            }
        }
        Ok(())
    }
}
