use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::results::{ResultDirectory, DIAMOND_OUTPUT_DIR, GUNC_OUTPUT_DIR};
use crate::errors::MagqcError;

pub const SUMMARY_FILE_SUFFIX: &str = ".all_levels.tsv";

/// Column set of GUNC's all-levels output, in file order.
pub const EXPECTED_COLUMNS: [&str; 13] = [
    "genome",
    "n_genes_called",
    "n_genes_mapped",
    "n_contigs",
    "taxonomic_level",
    "proportion_genes_retained_in_major_clades",
    "genes_retained_index",
    "clade_separation_score",
    "contamination_portion",
    "n_effective_surplus_clades",
    "mean_hit_identity",
    "reference_representation_score",
    "pass.GUNC",
];

/// One row of a GUNC all-levels file, with every column retained so the
/// combined table can be written back out unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRow {
    pub genome: String,
    pub n_genes_called: u64,
    pub n_genes_mapped: u64,
    pub n_contigs: u64,
    pub taxonomic_level: String,
    pub proportion_genes_retained_in_major_clades: f64,
    pub genes_retained_index: f64,
    pub clade_separation_score: f64,
    pub contamination_portion: f64,
    pub n_effective_surplus_clades: f64,
    pub mean_hit_identity: f64,
    pub reference_representation_score: f64,
    #[serde(rename = "pass.GUNC", deserialize_with = "deserialize_pass")]
    pub pass_gunc: bool,
}

/// Normalized per-genome quality record as embedded in the report. One record
/// per (genome, taxonomic level) pair; `sample_id` is empty for unpartitioned
/// runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    pub sample_id: String,
    pub mag_id: String,
    pub taxonomic_level: String,
    pub reference_representation_score: f64,
    pub contamination_portion: f64,
    pub pass_gunc: bool,
    pub n_contigs: u64,
    pub n_genes_mapped: u64,
    pub clade_separation_score: f64,
    pub genes_retained_index: f64,
}

impl SummaryRecord {
    fn from_raw(sample_id: &str, raw: &RawRow) -> Self {
        Self {
            sample_id: sample_id.to_string(),
            mag_id: raw.genome.clone(),
            taxonomic_level: raw.taxonomic_level.clone(),
            reference_representation_score: raw.reference_representation_score,
            contamination_portion: raw.contamination_portion,
            pass_gunc: raw.pass_gunc,
            n_contigs: raw.n_contigs,
            n_genes_mapped: raw.n_genes_mapped,
            clade_separation_score: raw.clade_separation_score,
            genes_retained_index: raw.genes_retained_index,
        }
    }
}

/// GUNC has emitted pass/fail as both native booleans and free text across
/// versions, so accept either. Text matching is case-insensitive.
pub fn coerce_pass_text(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "pass" | "1" | "yes"
    )
}

fn deserialize_pass<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct PassVisitor;

    impl serde::de::Visitor<'_> for PassVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a boolean or pass/fail text")
        }

        // native booleans pass through untouched
        fn visit_bool<E: serde::de::Error>(self, v: bool) -> std::result::Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> std::result::Result<bool, E> {
            Ok(v == 1)
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> std::result::Result<bool, E> {
            Ok(v == 1)
        }

        fn visit_f64<E: serde::de::Error>(self, v: f64) -> std::result::Result<bool, E> {
            Ok((v - 1.0).abs() < f64::EPSILON)
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<bool, E> {
            Ok(coerce_pass_text(v))
        }
    }

    deserializer.deserialize_any(PassVisitor)
}

fn validate_header(headers: &csv::StringRecord, path: &Path) -> Result<()> {
    let missing: Vec<&str> = EXPECTED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .copied()
        .collect();

    if !missing.is_empty() {
        return Err(MagqcError::Validation(format!(
            "GUNC results file does not contain expected columns: {} is missing {}",
            path.display(),
            missing.join(", ")
        ))
        .into());
    }

    Ok(())
}

/// All `*.all_levels.tsv` files under a sample subtree's `gunc_output`
/// directory, sorted by filename.
pub fn list_summary_files(sample_path: &Path) -> Result<Vec<PathBuf>> {
    let gunc_output = sample_path.join(GUNC_OUTPUT_DIR);
    let mut files = Vec::new();

    if !gunc_output.is_dir() {
        return Ok(files);
    }

    for entry in std::fs::read_dir(&gunc_output)
        .with_context(|| format!("Couldn't read {}", gunc_output.display()))?
    {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if path.is_file() && name.ends_with(SUMMARY_FILE_SUFFIX) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Parse one all-levels file, validating its column set first.
pub fn read_raw_rows(path: &Path) -> Result<Vec<RawRow>> {
    let file =
        File::open(path).with_context(|| format!("Couldn't open {}", path.display()))?;
    let mut rdr = csv::ReaderBuilder::new().delimiter(b'\t').from_reader(file);

    validate_header(rdr.headers()?, path)?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: RawRow =
            result.with_context(|| format!("Malformed row in {}", path.display()))?;
        rows.push(row);
    }

    Ok(rows)
}

/// Extract every summary record from one sample's subtree.
pub fn extract_sample(sample_id: &str, sample_path: &Path) -> Result<Vec<SummaryRecord>> {
    let mut records = Vec::new();
    for path in list_summary_files(sample_path)? {
        for raw in read_raw_rows(&path)? {
            records.push(SummaryRecord::from_raw(sample_id, &raw));
        }
    }
    Ok(records)
}

/// Extract every summary record from a whole result tree. Zero matching
/// files anywhere is an error so an empty report can't ship silently.
pub fn extract_all(results: &ResultDirectory) -> Result<Vec<SummaryRecord>> {
    let mut records = Vec::new();
    let mut n_files = 0;

    for (sample_id, sample_path) in results.enumerate()? {
        let files = list_summary_files(&sample_path)?;
        n_files += files.len();
        for path in files {
            for raw in read_raw_rows(&path)? {
                records.push(SummaryRecord::from_raw(&sample_id, &raw));
            }
        }
    }

    if n_files == 0 {
        return Err(MagqcError::EmptyResults(format!(
            "No GUNC results found in {}",
            results.root().display()
        ))
        .into());
    }

    Ok(records)
}

/// The raw detection output files for one sample, as (genome id, path) pairs
/// sorted by genome id. The id is the filename up to the first `.`.
pub fn diamond_files(sample_path: &Path) -> Result<Vec<(String, PathBuf)>> {
    let diamond_output = sample_path.join(DIAMOND_OUTPUT_DIR);
    let mut files = Vec::new();

    if !diamond_output.is_dir() {
        return Ok(files);
    }

    for entry in std::fs::read_dir(&diamond_output)
        .with_context(|| format!("Couldn't read {}", diamond_output.display()))?
    {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if let Some(id) = name.split('.').next() {
                files.push((id.to_string(), path));
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Genome ids for one sample, taken from `diamond_output` filenames.
/// Independent of the summary rows: a genome that mapped no genes still
/// shows up here.
pub fn scan_genomes(sample_path: &Path) -> Result<Vec<String>> {
    let mut genomes: Vec<String> = diamond_files(sample_path)?
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    genomes.dedup();
    Ok(genomes)
}

/// Write the combined all-levels table for a whole result tree as one TSV.
/// Keeps GUNC's 13 columns; a `sample_id` column is appended when the tree is
/// sample-partitioned.
pub fn write_summary_table(results: &ResultDirectory, output: &Path) -> Result<()> {
    let samples = results.enumerate()?;
    let partitioned = samples.keys().any(|s| !s.is_empty());

    let mut rows: Vec<(String, RawRow)> = Vec::new();
    for (sample_id, sample_path) in &samples {
        for path in list_summary_files(sample_path)? {
            for raw in read_raw_rows(&path)? {
                rows.push((sample_id.clone(), raw));
            }
        }
    }

    if rows.is_empty() {
        return Err(MagqcError::EmptyResults(format!(
            "No GUNC results found in {}",
            results.root().display()
        ))
        .into());
    }

    let file = File::create(output)
        .with_context(|| format!("Couldn't create output file: {}", output.display()))?;
    let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(file);

    let mut header: Vec<&str> = EXPECTED_COLUMNS.to_vec();
    if partitioned {
        header.push("sample_id");
    }
    wtr.write_record(&header)?;

    for (sample_id, raw) in rows {
        let mut record = vec![
            raw.genome,
            raw.n_genes_called.to_string(),
            raw.n_genes_mapped.to_string(),
            raw.n_contigs.to_string(),
            raw.taxonomic_level,
            raw.proportion_genes_retained_in_major_clades.to_string(),
            raw.genes_retained_index.to_string(),
            raw.clade_separation_score.to_string(),
            raw.contamination_portion.to_string(),
            raw.n_effective_surplus_clades.to_string(),
            raw.mean_hit_identity.to_string(),
            raw.reference_representation_score.to_string(),
            raw.pass_gunc.to_string(),
        ];
        if partitioned {
            record.push(sample_id);
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;

    Ok(())
}
