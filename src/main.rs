use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use magqc::run::Database;

/// GUNC wrapper for MAG quality control
#[derive(Parser, Debug)]
#[command(author, version, about = "Run GUNC on MAGs and aggregate the results")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a GUNC reference database
    DownloadDb(DownloadDbArgs),
    /// Run GUNC on a directory of MAGs, one invocation per sample
    Run(RunArgs),
    /// Merge GUNC result trees from separate partitions into one
    Collate(CollateArgs),
    /// Render an HTML report from a collated GUNC result tree
    Report(ReportArgs),
    /// Export all per-genome summary rows as a single TSV
    Export(ExportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SharedOptions {
    /// Number of threads to use for parallel processing
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    pub threads: usize,
}

#[derive(Args, Debug)]
pub struct DownloadDbArgs {
    /// Output directory for the database
    #[arg(short = 'o', long = "output", required = true)]
    pub output: PathBuf,

    /// Which reference database to download
    #[arg(long = "database", value_enum, default_value = "progenomes")]
    pub database: Database,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory of MAGs: either flat *.fasta files or one subdirectory per sample
    #[arg(required = true)]
    pub input: PathBuf,

    /// GUNC database directory (holding the *.dmnd file)
    #[arg(short = 'd', long = "db", required = true)]
    pub db: PathBuf,

    /// Output directory for the collated results
    #[arg(short = 'o', long = "output", required = true)]
    pub output: PathBuf,

    /// Run diamond in sensitive mode
    #[arg(long = "sensitive")]
    pub sensitive: bool,

    /// Use species-level clade assignments
    #[arg(long = "use-species-level")]
    pub use_species_level: bool,

    /// Minimum number of mapped genes required to score a genome
    #[arg(long = "min-mapped-genes", default_value_t = 11)]
    pub min_mapped_genes: u64,

    /// Shared options
    #[command(flatten)]
    pub shared: SharedOptions,
}

#[derive(Args, Debug)]
pub struct CollateArgs {
    /// Result trees to merge, in order (later inputs win on collisions)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory for the merged tree
    #[arg(short = 'o', long = "output", required = true)]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Collated GUNC result tree
    #[arg(required = true)]
    pub results: PathBuf,

    /// Output directory for the report
    #[arg(short = 'o', long = "output", required = true)]
    pub output: PathBuf,

    /// Shared options
    #[command(flatten)]
    pub shared: SharedOptions,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Collated GUNC result tree
    #[arg(required = true)]
    pub results: PathBuf,

    /// Output TSV path
    #[arg(short = 'o', long = "output", required = true)]
    pub output: PathBuf,
}

impl DownloadDbArgs {
    pub fn run(self) -> Result<()> {
        magqc::run::download_db(&self.output, self.database)
    }
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        use magqc::run::{run_gunc, GuncParams, InputLayout};

        // layout is resolved once here; everything downstream trusts it
        let layout = InputLayout::detect(&self.input)?;
        info!("Input layout: {:?}", layout);

        let params = GuncParams {
            threads: self.shared.threads,
            sensitive: self.sensitive,
            use_species_level: self.use_species_level,
            min_mapped_genes: self.min_mapped_genes,
        };

        let results = run_gunc(&self.input, layout, &self.db, &params, &self.output)?;
        info!(
            "GUNC results written to {} ({} sample(s))",
            results.root().display(),
            results.enumerate()?.len()
        );
        Ok(())
    }
}

impl CollateArgs {
    pub fn run(self) -> Result<()> {
        use magqc::collate::collate_results;
        use magqc::core::results::ResultDirectory;

        let inputs: Vec<ResultDirectory> =
            self.inputs.iter().map(|p| ResultDirectory::new(p)).collect();
        let merged = collate_results(&inputs, &self.output)?;
        info!(
            "Collated {} input(s) into {}",
            inputs.len(),
            merged.root().display()
        );
        Ok(())
    }
}

impl ReportArgs {
    pub fn run(self) -> Result<()> {
        use magqc::core::results::ResultDirectory;
        use magqc::report::{ReportAssets, ReportBuilder};

        let results = ResultDirectory::new(&self.results);
        let builder = ReportBuilder::new(ReportAssets::default(), self.shared.threads);
        let report = builder.build(&results, &self.output)?;
        info!(
            "Report written to {}: {} sample(s), {} summary record(s)",
            self.output.display(),
            report.samples.len(),
            report.records.len()
        );
        Ok(())
    }
}

impl ExportArgs {
    pub fn run(self) -> Result<()> {
        use magqc::core::results::ResultDirectory;
        use magqc::core::summary::write_summary_table;

        if let Some(parent) = self.output.parent() {
            std::fs::create_dir_all(parent).context(format!(
                "Failed to create output directory: {}",
                parent.display()
            ))?;
        }

        let results = ResultDirectory::new(&self.results);
        write_summary_table(&results, &self.output)?;
        info!("Summary table written to {}", self.output.display());
        Ok(())
    }
}

// Main entry point
pub fn main() -> Result<()> {
    use env_logger::Env;

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::DownloadDb(args) => args.run(),
        Commands::Run(args) => args.run(),
        Commands::Collate(args) => args.run(),
        Commands::Report(args) => args.run(),
        Commands::Export(args) => args.run(),
    }
}
