//! `protobuilder materialize`: write a project from a saved developer XML file.

use anyhow::{Result, bail};
use console::style;
use std::path::Path;

use protobuilder::project::{MaterializeReport, materialize_file};

pub fn cmd_materialize(project_dir: &Path, xml_file: &Path, out: Option<&Path>) -> Result<()> {
    let root = match out {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => project_dir.join(dir),
        None => project_dir.to_path_buf(),
    };

    let report = materialize_file(xml_file, &root)?;
    print_report(&report);
    if !report.is_complete() {
        bail!(
            "{} path(s) could not be written under {}",
            report.failures.len(),
            report.root.display()
        );
    }
    Ok(())
}

pub(crate) fn print_report(report: &MaterializeReport) {
    println!(
        "{} {} directories and {} files in {}",
        style("Created").green().bold(),
        report.dirs_created.len(),
        report.files_written.len(),
        report.root.display()
    );
    for (path, error) in &report.failures {
        println!("  {} {}: {}", style("✗").red(), path, error);
    }
    if let Some(command) = &report.creation_command {
        println!("{} {}", style("Suggested setup:").dim(), command);
    }
}
