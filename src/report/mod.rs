use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::debug;
use rayon::prelude::*;
use tera::Tera;

use crate::core::results::{read_gene_counts, ResultDirectory, PLOTS_DIR};
use crate::core::summary::{diamond_files, extract_sample, SummaryRecord};
use crate::errors::MagqcError;
use crate::utils::{create_progress_bar, run_command};

const GUNC: &str = "gunc";
const INDEX_TEMPLATE: &str = "index.html";

/// Template and static assets the report is rendered from. Defaults to the
/// bundled files; callers can swap in their own.
pub struct ReportAssets {
    pub index_template: String,
    pub scripts: Vec<(String, String)>,
    pub stylesheets: Vec<(String, String)>,
}

impl Default for ReportAssets {
    fn default() -> Self {
        Self {
            index_template: include_str!("assets/index.html.tera").to_string(),
            scripts: vec![(
                "report.js".to_string(),
                include_str!("assets/js/report.js").to_string(),
            )],
            stylesheets: vec![
                (
                    "report.css".to_string(),
                    include_str!("assets/css/report.css").to_string(),
                ),
                (
                    "skeleton.css".to_string(),
                    include_str!("assets/css/skeleton.css").to_string(),
                ),
            ],
        }
    }
}

/// Aggregated report content, returned so callers can log what was rendered.
#[derive(Debug)]
pub struct Report {
    pub samples: IndexMap<String, Vec<String>>,
    pub records: Vec<SummaryRecord>,
}

struct SampleReport {
    sample_id: String,
    genomes: Vec<String>,
    records: Vec<SummaryRecord>,
    gene_counts: Option<IndexMap<String, u64>>,
}

pub struct ReportBuilder {
    assets: ReportAssets,
    threads: usize,
}

impl ReportBuilder {
    pub fn new(assets: ReportAssets, threads: usize) -> Self {
        Self {
            assets,
            threads: threads.max(1),
        }
    }

    /// Build the full report for a collated result tree into `output_dir`.
    ///
    /// Per-sample work (record extraction, plot resolution) is fanned out
    /// over a pool of `threads` workers; each worker writes only its own
    /// sample's plot directory. The first failed sample aborts the report.
    pub fn build(&self, results: &ResultDirectory, output_dir: &Path) -> Result<Report> {
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory: {}", output_dir.display())
        })?;

        let samples: Vec<(String, PathBuf)> = results.enumerate()?.into_iter().collect();
        let pb = create_progress_bar(samples.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .context("Failed to build report worker pool")?;

        let sample_reports: Vec<SampleReport> = pool.install(|| {
            samples
                .par_iter()
                .map(|(sample_id, sample_path)| {
                    let report = process_sample(sample_id, sample_path, output_dir)?;
                    pb.inc(1);
                    Ok(report)
                })
                .collect::<Result<Vec<_>>>()
        })?;
        pb.finish_with_message("Samples processed");

        let mut sample_map: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut records = Vec::new();
        let mut gene_counts: IndexMap<String, IndexMap<String, u64>> = IndexMap::new();
        for sr in sample_reports {
            sample_map.insert(sr.sample_id.clone(), sr.genomes);
            records.extend(sr.records);
            if let Some(counts) = sr.gene_counts {
                gene_counts.insert(sr.sample_id, counts);
            }
        }
        sample_map.sort_keys();
        gene_counts.sort_keys();

        if records.is_empty() {
            return Err(MagqcError::EmptyResults(format!(
                "No GUNC results found in {}",
                results.root().display()
            ))
            .into());
        }

        self.render(output_dir, &sample_map, &records, &gene_counts)?;
        self.write_assets(output_dir)?;

        Ok(Report {
            samples: sample_map,
            records,
        })
    }

    fn render(
        &self,
        output_dir: &Path,
        samples: &IndexMap<String, Vec<String>>,
        records: &[SummaryRecord],
        gene_counts: &IndexMap<String, IndexMap<String, u64>>,
    ) -> Result<()> {
        let mut templates = Tera::default();
        templates
            .add_raw_template(INDEX_TEMPLATE, &self.assets.index_template)
            .context("Invalid report template")?;

        let mut context = tera::Context::new();
        context.insert("samples", &serde_json::to_string(samples)?);
        context.insert("summary_data", &serde_json::to_string(records)?);
        context.insert("gene_counts", &serde_json::to_string(gene_counts)?);
        context.insert("version", env!("CARGO_PKG_VERSION"));

        let html = templates
            .render(INDEX_TEMPLATE, &context)
            .context("Failed to render report template")?;
        std::fs::write(output_dir.join("index.html"), html)
            .context("Failed to write index.html")?;

        Ok(())
    }

    fn write_assets(&self, output_dir: &Path) -> Result<()> {
        let js_dir = output_dir.join("js");
        std::fs::create_dir_all(&js_dir)?;
        for (name, content) in &self.assets.scripts {
            std::fs::write(js_dir.join(name), content)?;
        }

        let css_dir = output_dir.join("css");
        std::fs::create_dir_all(&css_dir)?;
        for (name, content) in &self.assets.stylesheets {
            std::fs::write(css_dir.join(name), strip_input_styles(content))?;
        }

        Ok(())
    }
}

/// One worker's unit of work: extract this sample's summary records and make
/// sure every genome in its diamond output has a plot fragment in the report.
fn process_sample(sample_id: &str, sample_path: &Path, output_dir: &Path) -> Result<SampleReport> {
    let records = extract_sample(sample_id, sample_path)?;
    let gene_counts = read_gene_counts(sample_path)?;

    let plot_dir = if sample_id.is_empty() {
        output_dir.join(PLOTS_DIR)
    } else {
        output_dir.join(PLOTS_DIR).join(sample_id)
    };
    std::fs::create_dir_all(&plot_dir)
        .with_context(|| format!("Failed to create plot directory: {}", plot_dir.display()))?;

    let mut genomes = Vec::new();
    for (genome, diamond_file) in diamond_files(sample_path)? {
        resolve_plot(sample_path, &genome, &diamond_file, &plot_dir)?;
        genomes.push(genome);
    }
    genomes.dedup();

    Ok(SampleReport {
        sample_id: sample_id.to_string(),
        genomes,
        records,
        gene_counts,
    })
}

/// Reuse an existing plot fragment when the run already produced one,
/// otherwise have GUNC synthesize it from the raw detection output.
fn resolve_plot(
    sample_path: &Path,
    genome: &str,
    diamond_file: &Path,
    plot_dir: &Path,
) -> Result<()> {
    let fragment = format!("{genome}.viz.html");
    let existing = sample_path.join(PLOTS_DIR).join(&fragment);

    if existing.is_file() {
        debug!("Reusing existing plot fragment: {}", existing.display());
        std::fs::copy(&existing, plot_dir.join(&fragment)).with_context(|| {
            format!("Failed to copy plot fragment: {}", existing.display())
        })?;
        return Ok(());
    }

    let args = vec![
        "plot".to_string(),
        "--verbose".to_string(),
        "-d".to_string(),
        diamond_file.display().to_string(),
        "-o".to_string(),
        plot_dir.display().to_string(),
    ];
    run_command(GUNC, &args)
}

/// Drop checkbox/radio input rules from a stylesheet before shipping it.
/// The bundled third-party stylesheet styles those inputs in a way that
/// clashes with the report's own controls.
pub fn strip_input_styles(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    for rule in css.split_inclusive('}') {
        let selector = rule.split('{').next().unwrap_or("");
        if selector.contains("input[type=\"checkbox\"]") || selector.contains("input[type=\"radio\"]")
        {
            continue;
        }
        out.push_str(rule);
    }
    out
}
