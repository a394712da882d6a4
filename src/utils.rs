use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use crate::errors::MagqcError;

/// Run an external command, failing on non-zero exit.
///
/// The full command line is logged before spawning; GUNC writes its own
/// progress to stdout/stderr and we let that through untouched.
pub fn run_command(program: &str, args: &[String]) -> Result<()> {
    info!("Running external command: {} {}", program, args.join(" "));

    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("Failed to spawn '{}'. Is it installed?", program))?;

    if !status.success() {
        return Err(MagqcError::Invocation {
            program: program.to_string(),
            status,
        }
        .into());
    }

    Ok(())
}

/// Locate the diamond database file inside a GUNC database directory.
pub fn find_db_file(db_dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(db_dir)
        .with_context(|| format!("Couldn't read database directory: {}", db_dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "dmnd") {
            return Ok(path);
        }
    }

    Err(MagqcError::Validation(format!(
        "No GUNC database file (*.dmnd) found in {}",
        db_dir.display()
    ))
    .into())
}

// Helper to create a consistent spinner
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Helper to create a consistent progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} samples ({per_sec}, {eta})")
            .unwrap()
            .progress_chars("#>-")
    );
    pb
}
