use anyhow::{Result, bail};
use console::style;
use std::path::Path;

/// `protobuilder cleanup`: remove leftover containers.
///
/// Without flags the configured cleanup label and port are used.
pub async fn cmd_cleanup(project_dir: &Path, label: Option<&str>, port: Option<u16>) -> Result<()> {
    let runtime = super::docker_runtime(project_dir).await?;
    let (label, port) = if label.is_none() && port.is_none() {
        (
            runtime.config().cleanup_label.clone(),
            Some(runtime.config().cleanup_port),
        )
    } else {
        (
            label.unwrap_or(&runtime.config().cleanup_label).to_string(),
            port,
        )
    };

    let report = runtime.cleanup_stale(&label, port).await?;
    if report.removed.is_empty() && report.failed.is_empty() {
        println!("{}", style("Nothing to clean up.").dim());
        return Ok(());
    }
    for id in &report.removed {
        let short: String = id.chars().take(12).collect();
        println!("{} {}", style("Removed").green(), short);
    }
    for (id, error) in &report.failed {
        println!("{} {}: {}", style("Failed").red().bold(), id, error);
    }
    if !report.is_clean() {
        bail!("{} container(s) could not be removed", report.failed.len());
    }
    Ok(())
}
