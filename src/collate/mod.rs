use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::core::results::ResultDirectory;

/// Merge partition-level result trees into one.
///
/// Inputs are processed in order; when two partitions carry the same sample
/// (which shouldn't happen, partitions are disjoint) the later one wins on a
/// per-file basis. An empty input slice just yields an empty output tree.
pub fn collate_results(inputs: &[ResultDirectory], output_root: &Path) -> Result<ResultDirectory> {
    std::fs::create_dir_all(output_root).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_root.display()
        )
    })?;

    for input in inputs {
        for (sample_id, sample_path) in input.enumerate()? {
            debug!("Collating sample '{}' from {}", sample_id, sample_path.display());
            let dest = if sample_id.is_empty() {
                output_root.to_path_buf()
            } else {
                output_root.join(&sample_id)
            };
            copy_tree(&sample_path, &dest)?;
        }
    }

    Ok(ResultDirectory::new(output_root))
}

/// Recursive copy with idempotent directory creation. Existing files at the
/// destination are overwritten (last writer wins) with a warning, since
/// overlapping partitions are unexpected.
fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create directory: {}", dest.display()))?;

    for entry in std::fs::read_dir(src)
        .with_context(|| format!("Couldn't read directory: {}", src.display()))?
    {
        let entry = entry?;
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if src_path.is_dir() {
            copy_tree(&src_path, &dest_path)?;
        } else {
            if dest_path.exists() {
                warn!(
                    "Overwriting existing file during collation: {}",
                    dest_path.display()
                );
            }
            std::fs::copy(&src_path, &dest_path).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    src_path.display(),
                    dest_path.display()
                )
            })?;
        }
    }

    Ok(())
}
