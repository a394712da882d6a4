use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use log::info;
use tempfile::TempDir;

use crate::collate::collate_results;
use crate::core::results::ResultDirectory;
use crate::errors::MagqcError;
use crate::utils::{create_spinner, find_db_file, run_command};

const GUNC: &str = "gunc";

/// Reference databases GUNC can download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Database {
    Progenomes,
    Gtdb,
}

impl Database {
    pub fn as_str(&self) -> &'static str {
        match self {
            Database::Progenomes => "progenomes",
            Database::Gtdb => "gtdb",
        }
    }
}

/// How the input MAG directory is laid out. Resolved once up front; nothing
/// downstream re-inspects the tree to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// A flat directory of `*.fasta` files, one per genome.
    FeatureData,
    /// One subdirectory per sample, each holding that sample's genomes.
    SampleData,
}

impl InputLayout {
    pub fn detect(input_dir: &Path) -> Result<Self> {
        let mut has_subdirs = false;
        for entry in std::fs::read_dir(input_dir)
            .with_context(|| format!("Couldn't read input directory: {}", input_dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "fasta") {
                return Ok(InputLayout::FeatureData);
            }
            if path.is_dir() {
                has_subdirs = true;
            }
        }

        if has_subdirs {
            Ok(InputLayout::SampleData)
        } else {
            Err(MagqcError::Validation(format!(
                "Input directory {} contains neither *.fasta files nor sample subdirectories",
                input_dir.display()
            ))
            .into())
        }
    }
}

/// Knobs forwarded to `gunc run`.
#[derive(Debug, Clone)]
pub struct GuncParams {
    pub threads: usize,
    pub sensitive: bool,
    pub use_species_level: bool,
    pub min_mapped_genes: u64,
}

impl Default for GuncParams {
    fn default() -> Self {
        Self {
            threads: 1,
            sensitive: false,
            use_species_level: false,
            min_mapped_genes: 11,
        }
    }
}

/// The fixed `gunc run` argument template.
pub fn build_run_args(
    db_file: &Path,
    params: &GuncParams,
    input_dir: &Path,
    out_dir: &Path,
) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--db_file".to_string(),
        db_file.display().to_string(),
        "--threads".to_string(),
        params.threads.to_string(),
        "--file_suffix".to_string(),
        ".fasta".to_string(),
        "--detailed_output".to_string(),
    ];
    if params.sensitive {
        args.push("--sensitive".to_string());
    }
    if params.use_species_level {
        args.push("--use_species_level".to_string());
    }
    args.extend([
        "--min_mapped_genes".to_string(),
        params.min_mapped_genes.to_string(),
        "--input_dir".to_string(),
        input_dir.display().to_string(),
        "--out_dir".to_string(),
        out_dir.display().to_string(),
    ]);
    args
}

fn list_sample_dirs(input_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut samples = Vec::new();
    for entry in std::fs::read_dir(input_dir)
        .with_context(|| format!("Couldn't read input directory: {}", input_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let sample_id = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Non-UTF8 sample directory name: {}", path.display()))?
            .to_string();
        samples.push((sample_id, path));
    }
    samples.sort();
    Ok(samples)
}

/// Run GUNC once per partition (the whole collection, or one sample's
/// genomes), then collate the partition trees into `output_root`.
///
/// Invocations are sequential; GUNC saturates its own `--threads` per run. A
/// non-zero exit aborts the whole pipeline, partial partition output is never
/// collated.
pub fn run_gunc(
    input_dir: &Path,
    layout: InputLayout,
    db_dir: &Path,
    params: &GuncParams,
    output_root: &Path,
) -> Result<ResultDirectory> {
    let db_file = find_db_file(db_dir)?;
    let scratch = TempDir::new().context("Failed to create scratch directory")?;
    let mut partitions = Vec::new();

    match layout {
        InputLayout::FeatureData => {
            let partition_root = scratch.path().join("partition_0");
            std::fs::create_dir_all(&partition_root)?;
            let args = build_run_args(&db_file, params, input_dir, &partition_root);
            let spinner = create_spinner("Running GUNC on all genomes...");
            run_command(GUNC, &args)?;
            spinner.finish_with_message("GUNC run complete");
            partitions.push(ResultDirectory::new(partition_root));
        }
        InputLayout::SampleData => {
            for (idx, (sample_id, sample_input)) in list_sample_dirs(input_dir)?.iter().enumerate()
            {
                info!("Running GUNC for sample '{}'", sample_id);
                let partition_root = scratch.path().join(format!("partition_{idx}"));
                let sample_out = partition_root.join(sample_id);
                std::fs::create_dir_all(&sample_out)?;
                let args = build_run_args(&db_file, params, sample_input, &sample_out);
                let spinner = create_spinner(&format!("Running GUNC for sample '{sample_id}'..."));
                run_command(GUNC, &args)?;
                spinner.finish_with_message(format!("Sample '{sample_id}' done"));
                partitions.push(ResultDirectory::new(partition_root));
            }
        }
    }

    collate_results(&partitions, output_root)
}

/// Download a GUNC reference database into `dest`.
pub fn download_db(dest: &Path, database: Database) -> Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create output directory: {}", dest.display()))?;

    let args = vec![
        "download_db".to_string(),
        dest.display().to_string(),
        "--database".to_string(),
        database.as_str().to_string(),
    ];
    run_command(GUNC, &args)
}
