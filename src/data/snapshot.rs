//! Save and reload a [`CommunityDataset`] as an opaque keyed blob.
//!
//! A long pipeline saves its contaminant-filtered dataset under
//! [`FILTERED_DATASET_KEY`] and can later resume from it without re-running
//! ingestion and cleanup. Blobs are JSON documents; reloading re-validates
//! alignment through [`CommunityDataset::build`].

use crate::data::{AbundanceMatrix, CommunityDataset, Metadata, Taxonomy};
use crate::error::{DivError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Key under which the pipeline stores its filtered, pre-pruning dataset.
pub const FILTERED_DATASET_KEY: &str = "filtered_dataset";

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct DatasetBlob {
    format_version: u32,
    created_at: DateTime<Utc>,
    taxon_ids: Vec<String>,
    sample_ids: Vec<String>,
    /// Non-zero `(taxon, sample, count)` entries.
    counts: Vec<(usize, usize, u64)>,
    taxonomy: Taxonomy,
    metadata: Metadata,
}

impl DatasetBlob {
    fn capture(dataset: &CommunityDataset) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            taxon_ids: dataset.taxon_ids().to_vec(),
            sample_ids: dataset.sample_ids().to_vec(),
            counts: dataset.abundance().triplets(),
            taxonomy: dataset.taxonomy().clone(),
            metadata: dataset.metadata().clone(),
        }
    }

    fn restore(self) -> Result<CommunityDataset> {
        if self.format_version != FORMAT_VERSION {
            return Err(DivError::Snapshot(format!(
                "Unsupported snapshot format version {}",
                self.format_version
            )));
        }
        let abundance = AbundanceMatrix::from_triplets(self.taxon_ids, self.sample_ids, &self.counts)?;
        CommunityDataset::build(abundance, self.taxonomy, self.metadata)
    }
}

/// Directory-backed store of dataset snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(DivError::Snapshot(format!("Invalid snapshot key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }

    /// Store `dataset` under `key`, replacing any previous blob.
    pub fn save(&self, key: &str, dataset: &CommunityDataset) -> Result<PathBuf> {
        let path = self.path_for(key)?;
        let blob = DatasetBlob::capture(dataset);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&blob)?)?;
        fs::rename(&tmp, &path)?;
        info!(key, path = %path.display(), "Saved dataset snapshot");
        Ok(path)
    }

    /// Reload the dataset stored under `key`.
    pub fn load(&self, key: &str) -> Result<CommunityDataset> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Err(DivError::Snapshot(format!(
                "No snapshot '{}' in {}",
                key,
                self.dir.display()
            )));
        }
        let blob: DatasetBlob = serde_json::from_slice(&fs::read(&path)?)?;
        let dataset = blob.restore()?;
        info!(key, taxa = dataset.n_taxa(), samples = dataset.n_samples(), "Loaded dataset snapshot");
        Ok(dataset)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).map(|p| p.exists()).unwrap_or(false)
    }
}
