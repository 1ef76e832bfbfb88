//! Pipeline runner sequencing the diversity analysis stages.

use crate::correct::PAdjust;
use crate::data::{
    write_diversity_tsv, CommunityDataset, DistanceMatrix, DiversityRecord, SnapshotStore, SuiteReport,
    FILTERED_DATASET_KEY,
};
use crate::diversity::{compute_distance, estimate, AlphaIndex, DistanceMethod};
use crate::error::{DivError, Result};
use crate::filter::{filter_library_size, prune_rare_taxa_with_stats, ContaminantFilter, PruneSummary};
use crate::ordination::{Nmds, NmdsConfig, OrdinationResult, Ordinator};
use crate::test::{CentroidKind, HypothesisSuite, PermutationConfig, SuiteConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Pipeline configuration for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name of the pipeline.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Taxa removed before any analysis.
    pub contaminants: ContaminantFilter,
    /// Replace taxon identifiers (often full sequences) with `ASV1..N`.
    pub rename_taxa: bool,
    /// Samples below this depth are dropped; zero-depth samples always are.
    pub min_library_size: u64,
    pub alpha_indices: Vec<AlphaIndex>,
    /// Taxa at or below this share of all reads are pruned before beta diversity.
    pub min_relative_abundance: f64,
    pub distance: DistanceMethod,
    pub ordination: NmdsConfig,
    /// Dimensions of the NMDS embedding.
    pub ordination_dims: usize,
    /// Metadata columns to test by.
    pub group_columns: Vec<String>,
    pub permutations: usize,
    /// Master seed for permutations and ordination restarts.
    pub seed: Option<u64>,
    /// Where the filtered dataset is snapshotted, if anywhere.
    pub snapshot_dir: Option<PathBuf>,
    /// Also run t-tests and ANOVA.
    pub parametric: bool,
    pub p_adjust: PAdjust,
    pub centroid: CentroidKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "diversity".to_string(),
            description: None,
            contaminants: ContaminantFilter::default(),
            rename_taxa: true,
            min_library_size: 0,
            alpha_indices: AlphaIndex::DEFAULT.to_vec(),
            min_relative_abundance: 1e-5,
            distance: DistanceMethod::BrayCurtis,
            ordination: NmdsConfig::default(),
            ordination_dims: 2,
            group_columns: Vec::new(),
            permutations: 999,
            seed: None,
            snapshot_dir: None,
            parametric: true,
            p_adjust: PAdjust::Holm,
            centroid: CentroidKind::Centroid,
        }
    }
}

impl PipelineConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(DivError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(DivError::from)
    }

    /// A fully populated configuration to start from.
    pub fn example() -> Self {
        Self {
            name: "body-site-diversity".to_string(),
            description: Some("Alpha and beta diversity by body site".to_string()),
            contaminants: ContaminantFilter::bacteria_only(),
            min_library_size: 1000,
            alpha_indices: vec![
                AlphaIndex::Observed,
                AlphaIndex::Chao1,
                AlphaIndex::Shannon,
                AlphaIndex::Simpson,
            ],
            group_columns: vec!["body.site".to_string(), "reported.antibiotic.usage".to_string()],
            seed: Some(711),
            snapshot_dir: Some(PathBuf::from("snapshots")),
            ..Default::default()
        }
    }

    fn suite_config(&self) -> SuiteConfig {
        SuiteConfig {
            permutations: PermutationConfig {
                n_permutations: self.permutations,
                seed: self.seed,
                parallel: true,
            },
            parametric: self.parametric,
            p_adjust: self.p_adjust,
            centroid: self.centroid,
            ..Default::default()
        }
    }
}

/// Everything a pipeline run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub name: String,
    /// Taxa after contaminant filtering.
    pub n_taxa_filtered: usize,
    /// Samples that entered alpha diversity.
    pub n_samples: usize,
    /// Samples removed for zero or low depth.
    pub dropped_samples: Vec<String>,
    pub alpha: Vec<DiversityRecord>,
    pub prune: PruneSummary,
    pub distances: DistanceMatrix,
    /// Absent when the data could not be ordinated.
    pub ordination: Option<OrdinationResult>,
    pub tests: SuiteReport,
    pub snapshot: Option<PathBuf>,
}

impl PipelineReport {
    /// Write `alpha.tsv`, `distance.tsv`, `ordination.tsv`, `tests.tsv` and
    /// `report.json` into `dir`.
    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        write_diversity_tsv(&self.alpha, dir.join("alpha.tsv"))?;
        self.distances.to_tsv(dir.join("distance.tsv"))?;
        if let Some(ordination) = &self.ordination {
            ordination.to_tsv(dir.join("ordination.tsv"))?;
        }
        self.tests.to_tsv(dir.join("tests.tsv"))?;
        fs::write(dir.join("report.json"), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl std::fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Pipeline '{}'", self.name)?;
        writeln!(
            f,
            "  {} taxa after filtering, {} samples ({} dropped)",
            self.n_taxa_filtered,
            self.n_samples,
            self.dropped_samples.len()
        )?;
        writeln!(f, "  {}", self.prune)?;
        match &self.ordination {
            Some(o) => writeln!(
                f,
                "  {} stress {:.4}{}",
                o.method,
                o.stress,
                if o.converged { "" } else { " (not converged)" }
            )?,
            None => writeln!(f, "  no ordination")?,
        }
        write!(f, "{}", self.tests)
    }
}

/// Builder for configuring and running the diversity pipeline.
#[derive(Debug, Clone, Default)]
pub struct DiversityPipeline {
    config: PipelineConfig,
}

impl DiversityPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a config.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Convert to config for serialization.
    pub fn to_config(&self) -> PipelineConfig {
        self.config.clone()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    pub fn contaminants(mut self, filter: ContaminantFilter) -> Self {
        self.config.contaminants = filter;
        self
    }

    pub fn rename_taxa(mut self, rename: bool) -> Self {
        self.config.rename_taxa = rename;
        self
    }

    pub fn min_library_size(mut self, min_reads: u64) -> Self {
        self.config.min_library_size = min_reads;
        self
    }

    pub fn alpha_indices(mut self, indices: &[AlphaIndex]) -> Self {
        self.config.alpha_indices = indices.to_vec();
        self
    }

    pub fn prune(mut self, min_relative_abundance: f64) -> Self {
        self.config.min_relative_abundance = min_relative_abundance;
        self
    }

    pub fn distance(mut self, method: DistanceMethod) -> Self {
        self.config.distance = method;
        self
    }

    pub fn ordination(mut self, config: NmdsConfig) -> Self {
        self.config.ordination = config;
        self
    }

    pub fn ordination_dims(mut self, dims: usize) -> Self {
        self.config.ordination_dims = dims;
        self
    }

    /// Add a metadata column to test by.
    pub fn group_by(mut self, column: &str) -> Self {
        self.config.group_columns.push(column.to_string());
        self
    }

    pub fn permutations(mut self, n: usize) -> Self {
        self.config.permutations = n;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn snapshot_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.snapshot_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn parametric(mut self, parametric: bool) -> Self {
        self.config.parametric = parametric;
        self
    }

    /// Run every stage on a freshly built dataset.
    pub fn run(&self, dataset: &CommunityDataset) -> Result<PipelineReport> {
        info!(
            pipeline = %self.config.name,
            taxa = dataset.n_taxa(),
            samples = dataset.n_samples(),
            "Starting pipeline"
        );
        let mut filtered = stage("contaminant filter", dataset.filter_taxa(&self.config.contaminants))?;
        if self.config.rename_taxa {
            filtered = stage("rename taxa", filtered.rename_taxa())?;
        }

        let snapshot = match &self.config.snapshot_dir {
            Some(dir) => {
                let store = stage("snapshot", SnapshotStore::open(dir))?;
                Some(stage("snapshot", store.save(FILTERED_DATASET_KEY, &filtered))?)
            }
            None => None,
        };
        self.analyse(filtered, snapshot)
    }

    /// Continue from the filtered dataset snapshotted by an earlier [`run`](Self::run).
    pub fn resume(&self) -> Result<PipelineReport> {
        let dir = self.config.snapshot_dir.as_ref().ok_or_else(|| {
            DivError::Pipeline("Resuming requires snapshot_dir to be set".to_string())
        })?;
        let store = stage("snapshot", SnapshotStore::open(dir))?;
        let filtered = stage("snapshot", store.load(FILTERED_DATASET_KEY))?;
        info!(taxa = filtered.n_taxa(), samples = filtered.n_samples(), "Resumed from snapshot");
        self.analyse(filtered, None)
    }

    fn analyse(&self, filtered: CommunityDataset, snapshot: Option<PathBuf>) -> Result<PipelineReport> {
        let config = &self.config;
        let n_taxa_filtered = filtered.n_taxa();

        let (mut dataset, mut dropped_samples) = stage("drop empty samples", filtered.drop_empty_samples())?;
        if config.min_library_size > 0 {
            let (deep, shallow) = stage("library size", filter_library_size(&dataset, config.min_library_size))?;
            dataset = deep;
            dropped_samples.extend(shallow);
        }

        let alpha = stage("alpha diversity", estimate(&dataset, &config.alpha_indices))?;

        let (pruned, prune) = stage(
            "prune",
            prune_rare_taxa_with_stats(&dataset, config.min_relative_abundance),
        )?;
        let (pruned, emptied) = stage("prune", pruned.drop_empty_samples())?;
        if !emptied.is_empty() {
            warn!(samples = ?emptied, "Samples left empty by pruning are excluded from beta diversity");
        }

        let distances = stage("distance", compute_distance(&pruned, config.distance, config.seed))?;

        let nmds = Nmds::new(config.ordination.clone());
        let ordination = match nmds.fit(&distances, config.ordination_dims, config.seed) {
            Ok(o) => Some(o),
            Err(e) => {
                warn!(error = %e, "Ordination skipped");
                None
            }
        };

        let suite = HypothesisSuite::new(config.suite_config());
        let tests = suite.run(&alpha, Some(&distances), dataset.metadata(), &config.group_columns);

        info!(
            pipeline = %config.name,
            tests = tests.len(),
            failed = tests.n_failed(),
            "Pipeline finished"
        );
        Ok(PipelineReport {
            name: config.name.clone(),
            n_taxa_filtered,
            n_samples: dataset.n_samples(),
            dropped_samples,
            alpha,
            prune,
            distances,
            ordination,
            tests,
            snapshot,
        })
    }
}

fn stage<T>(name: &str, result: Result<T>) -> Result<T> {
    result.map_err(|e| DivError::Pipeline(format!("Stage '{}' failed: {}", name, e)))
}
