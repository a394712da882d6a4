use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

const COLUMNS: &str = "genome\tn_genes_called\tn_genes_mapped\tn_contigs\ttaxonomic_level\t\
proportion_genes_retained_in_major_clades\tgenes_retained_index\tclade_separation_score\t\
contamination_portion\tn_effective_surplus_clades\tmean_hit_identity\t\
reference_representation_score\tpass.GUNC";

/// Build a minimal GUNC output subtree for one sample.
fn make_sample(root: &Path, sample_id: &str, genomes: &[&str]) -> PathBuf {
    let sample = if sample_id.is_empty() {
        root.to_path_buf()
    } else {
        root.join(sample_id)
    };
    let gunc_output = sample.join("gunc_output");
    let diamond_output = sample.join("diamond_output");
    let plots = sample.join("plots");
    for dir in [&gunc_output, &diamond_output, &plots] {
        std::fs::create_dir_all(dir).unwrap();
    }

    for genome in genomes {
        let row = format!(
            "{genome}\t2210\t2190\t105\tspecies\t0.98\t0.99\t0.45\t0.03\t1.2\t0.93\t0.87\tTrue"
        );
        std::fs::write(
            gunc_output.join(format!("{genome}.progenomes.all_levels.tsv")),
            format!("{COLUMNS}\n{row}\n"),
        )
        .unwrap();
        std::fs::write(
            diamond_output.join(format!("{genome}.diamond.progenomes.out")),
            "",
        )
        .unwrap();
        std::fs::write(
            plots.join(format!("{genome}.viz.html")),
            "<html><body>plot</body></html>",
        )
        .unwrap();
    }

    sample
}

#[test]
fn test_collate_merges_disjoint_trees() -> Result<()> {
    let a = TempDir::new()?;
    make_sample(a.path(), "SRR1", &["bin1"]);
    let b = TempDir::new()?;
    make_sample(b.path(), "SRR2", &["bin2"]);
    let out = TempDir::new()?;
    let merged = out.path().join("merged");

    Command::cargo_bin("magqc")?
        .arg("collate")
        .arg(a.path())
        .arg(b.path())
        .arg("-o")
        .arg(&merged)
        .assert()
        .success();

    assert!(merged
        .join("SRR1/gunc_output/bin1.progenomes.all_levels.tsv")
        .is_file());
    assert!(merged
        .join("SRR2/gunc_output/bin2.progenomes.all_levels.tsv")
        .is_file());
    Ok(())
}

#[test]
fn test_export_writes_combined_table() -> Result<()> {
    let tree = TempDir::new()?;
    make_sample(tree.path(), "SRR1", &["bin1", "bin2"]);
    make_sample(tree.path(), "SRR2", &["bin3"]);
    let out = TempDir::new()?;
    let table = out.path().join("summary.tsv");

    Command::cargo_bin("magqc")?
        .arg("export")
        .arg(tree.path())
        .arg("-o")
        .arg(&table)
        .assert()
        .success();

    let contents = std::fs::read_to_string(&table)?;
    let mut lines = contents.lines();
    assert_eq!(lines.next().unwrap(), format!("{COLUMNS}\tsample_id"));
    assert_eq!(lines.count(), 3);
    Ok(())
}

#[test]
fn test_export_empty_tree_fails() -> Result<()> {
    let tree = TempDir::new()?;
    std::fs::create_dir_all(tree.path().join("SRR1/gunc_output"))?;
    let out = TempDir::new()?;

    Command::cargo_bin("magqc")?
        .arg("export")
        .arg(tree.path())
        .arg("-o")
        .arg(out.path().join("summary.tsv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No GUNC results"));
    Ok(())
}

#[test]
fn test_report_renders_html_and_plots() -> Result<()> {
    let tree = TempDir::new()?;
    make_sample(tree.path(), "SRR1", &["bin1"]);
    make_sample(tree.path(), "SRR2", &["bin2"]);
    let out = TempDir::new()?;
    let report_dir = out.path().join("report");

    Command::cargo_bin("magqc")?
        .arg("report")
        .arg(tree.path())
        .arg("-o")
        .arg(&report_dir)
        .args(["-t", "2"])
        .assert()
        .success();

    assert!(report_dir.join("index.html").is_file());
    assert!(report_dir.join("js/report.js").is_file());
    assert!(report_dir.join("css/report.css").is_file());
    assert!(report_dir.join("plots/SRR1/bin1.viz.html").is_file());
    assert!(report_dir.join("plots/SRR2/bin2.viz.html").is_file());

    let html = std::fs::read_to_string(report_dir.join("index.html"))?;
    assert!(html.contains("\"SRR1\""));
    assert!(html.contains("bin2"));

    // shipped stylesheet must have lost the checkbox/radio block
    let skeleton = std::fs::read_to_string(report_dir.join("css/skeleton.css"))?;
    assert!(!skeleton.contains("input[type=\"checkbox\"]"));
    Ok(())
}

/// Put a fake `gunc` executable on PATH that copies a canned all-levels
/// table into whatever `--out_dir` it is given.
#[cfg(unix)]
fn write_gunc_stub(dir: &Path, body: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("gunc");
    std::fs::write(&script, format!("#!/bin/sh\n{body}"))?;
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(unix)]
fn stub_path(stub_dir: &Path) -> String {
    format!(
        "{}:{}",
        stub_dir.display(),
        std::env::var("PATH").unwrap_or_default()
    )
}

#[test]
#[cfg(unix)]
fn test_run_invokes_gunc_per_sample() -> Result<()> {
    let input = TempDir::new()?;
    for sample in ["SRR1", "SRR2"] {
        std::fs::create_dir(input.path().join(sample))?;
        std::fs::write(input.path().join(sample).join("bin1.fasta"), ">c1\nACGT\n")?;
    }

    let db = TempDir::new()?;
    std::fs::write(db.path().join("progenomes_2.1.dmnd"), "db")?;

    let stub_dir = TempDir::new()?;
    let template = stub_dir.path().join("template.tsv");
    std::fs::write(
        &template,
        format!("{COLUMNS}\nbin1\t2210\t2190\t105\tspecies\t0.98\t0.99\t0.45\t0.03\t1.2\t0.93\t0.87\tTrue\n"),
    )?;
    write_gunc_stub(
        stub_dir.path(),
        &format!(
            concat!(
                "out=\"\"\nprev=\"\"\n",
                "for a in \"$@\"; do\n",
                "  if [ \"$prev\" = \"--out_dir\" ]; then out=\"$a\"; fi\n",
                "  prev=\"$a\"\n",
                "done\n",
                "mkdir -p \"$out/gunc_output\" \"$out/diamond_output\"\n",
                "cp {template} \"$out/gunc_output/bin1.progenomes.all_levels.tsv\"\n",
                "touch \"$out/diamond_output/bin1.diamond.progenomes.out\"\n"
            ),
            template = template.display()
        ),
    )?;

    let out = TempDir::new()?;
    let results = out.path().join("results");

    Command::cargo_bin("magqc")?
        .env("PATH", stub_path(stub_dir.path()))
        .arg("run")
        .arg(input.path())
        .arg("-d")
        .arg(db.path())
        .arg("-o")
        .arg(&results)
        .assert()
        .success();

    // one partition per sample, collated back into the output root
    for sample in ["SRR1", "SRR2"] {
        assert!(results
            .join(sample)
            .join("gunc_output/bin1.progenomes.all_levels.tsv")
            .is_file());
        assert!(results
            .join(sample)
            .join("diamond_output/bin1.diamond.progenomes.out")
            .is_file());
    }
    Ok(())
}

#[test]
#[cfg(unix)]
fn test_run_fails_fast_on_gunc_error() -> Result<()> {
    let input = TempDir::new()?;
    std::fs::create_dir(input.path().join("SRR1"))?;
    std::fs::write(input.path().join("SRR1").join("bin1.fasta"), ">c1\nACGT\n")?;

    let db = TempDir::new()?;
    std::fs::write(db.path().join("progenomes_2.1.dmnd"), "db")?;

    let stub_dir = TempDir::new()?;
    write_gunc_stub(stub_dir.path(), "exit 3\n")?;

    let out = TempDir::new()?;
    Command::cargo_bin("magqc")?
        .env("PATH", stub_path(stub_dir.path()))
        .arg("run")
        .arg(input.path())
        .arg("-d")
        .arg(db.path())
        .arg("-o")
        .arg(out.path().join("results"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("'gunc' failed"));
    Ok(())
}

#[test]
fn test_report_unpartitioned_tree() -> Result<()> {
    let tree = TempDir::new()?;
    make_sample(tree.path(), "", &["bin1"]);
    let out = TempDir::new()?;
    let report_dir = out.path().join("report");

    Command::cargo_bin("magqc")?
        .arg("report")
        .arg(tree.path())
        .arg("-o")
        .arg(&report_dir)
        .assert()
        .success();

    assert!(report_dir.join("plots/bin1.viz.html").is_file());
    Ok(())
}
