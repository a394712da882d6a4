use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;

use crate::errors::MagqcError;

pub const GUNC_OUTPUT_DIR: &str = "gunc_output";
pub const DIAMOND_OUTPUT_DIR: &str = "diamond_output";
pub const GENE_CALLS_DIR: &str = "gene_calls";
pub const PLOTS_DIR: &str = "plots";
pub const GENE_COUNTS_FILE: &str = "gene_counts.json";

/// One GUNC output tree, either flat (a single unpartitioned run) or with one
/// subdirectory per sample. All downstream code goes through [`enumerate`]
/// instead of inspecting the layout itself.
///
/// [`enumerate`]: ResultDirectory::enumerate
#[derive(Debug, Clone)]
pub struct ResultDirectory {
    root: PathBuf,
}

impl ResultDirectory {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A `gunc_output` directory directly under root means a single
    /// unpartitioned run.
    pub fn is_unpartitioned(&self) -> bool {
        self.root.join(GUNC_OUTPUT_DIR).is_dir()
    }

    /// Map each sample id to its subtree path. Unpartitioned trees map the
    /// empty sample id to the root itself. Sorted by sample id so report
    /// output is stable. A missing or empty root yields an empty map; callers
    /// decide whether "no results" is an error.
    pub fn enumerate(&self) -> Result<IndexMap<String, PathBuf>> {
        let mut samples = IndexMap::new();

        if self.is_unpartitioned() {
            samples.insert(String::new(), self.root.clone());
            return Ok(samples);
        }

        if !self.root.is_dir() {
            return Ok(samples);
        }

        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("Couldn't read results directory: {}", self.root.display()))?;
        for entry in entries {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let sample_id = path
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("Non-UTF8 sample directory name: {}", path.display()))?
                .to_string();
            samples.insert(sample_id, path);
        }

        samples.sort_keys();
        Ok(samples)
    }
}

/// Read the per-genome gene counts written by GUNC's detailed output.
///
/// Returns `None` when the file is absent (older GUNC runs, or plots-only
/// trees); malformed JSON is a validation error naming the file.
pub fn read_gene_counts(sample_path: &Path) -> Result<Option<IndexMap<String, u64>>> {
    let path = sample_path.join(GENE_CALLS_DIR).join(GENE_COUNTS_FILE);
    if !path.is_file() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Couldn't read gene counts file: {}", path.display()))?;
    let counts: IndexMap<String, u64> = serde_json::from_str(&contents).map_err(|e| {
        MagqcError::Validation(format!(
            "Gene counts file {} is not valid JSON: {}",
            path.display(),
            e
        ))
    })?;

    Ok(Some(counts))
}
