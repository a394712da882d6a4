//! Helpers for building fake GUNC result trees in tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::results::{
    ResultDirectory, DIAMOND_OUTPUT_DIR, GENE_CALLS_DIR, GUNC_OUTPUT_DIR, PLOTS_DIR,
};
use crate::core::summary::EXPECTED_COLUMNS;

pub struct FixtureTree {
    dir: TempDir,
}

impl FixtureTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn results(&self) -> ResultDirectory {
        ResultDirectory::new(self.dir.path())
    }

    /// Create the standard GUNC output layout for one sample and return its
    /// subtree path. Pass an empty id for an unpartitioned tree.
    pub fn sample(&self, sample_id: &str) -> PathBuf {
        let root = if sample_id.is_empty() {
            self.dir.path().to_path_buf()
        } else {
            self.dir.path().join(sample_id)
        };
        for sub in [GUNC_OUTPUT_DIR, DIAMOND_OUTPUT_DIR, GENE_CALLS_DIR] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }
        root
    }
}

/// One plausible all-levels row for `genome` at `level`, tab-separated.
pub fn summary_row(genome: &str, level: &str, pass: &str) -> String {
    format!(
        "{genome}\t2210\t2190\t105\t{level}\t0.98\t0.99\t0.45\t0.03\t1.2\t0.93\t0.87\t{pass}"
    )
}

/// Write an all-levels file for `genome` under the sample's `gunc_output`,
/// plus the matching `diamond_output` placeholder so the genome is
/// discoverable by the plot index scan.
pub fn write_summary_file(sample_path: &Path, genome: &str, rows: &[String]) {
    let mut contents = EXPECTED_COLUMNS.join("\t");
    contents.push('\n');
    for row in rows {
        contents.push_str(row);
        contents.push('\n');
    }
    std::fs::write(
        sample_path
            .join(GUNC_OUTPUT_DIR)
            .join(format!("{genome}.progenomes.all_levels.tsv")),
        contents,
    )
    .unwrap();
    std::fs::write(
        sample_path
            .join(DIAMOND_OUTPUT_DIR)
            .join(format!("{genome}.diamond.progenomes.out")),
        "",
    )
    .unwrap();
}

/// Pre-render a plot fragment for `genome` so report building doesn't need
/// the external plotting tool.
pub fn write_plot_fragment(sample_path: &Path, genome: &str) {
    let plots = sample_path.join(PLOTS_DIR);
    std::fs::create_dir_all(&plots).unwrap();
    std::fs::write(
        plots.join(format!("{genome}.viz.html")),
        format!("<html><body>plot for {genome}</body></html>"),
    )
    .unwrap();
}
