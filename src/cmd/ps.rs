use anyhow::Result;
use console::style;
use protobuilder_common::{ContainerEngine, ContainerFilter, ContainerSummary};
use std::path::Path;

/// `protobuilder ps`: running containers, optionally narrowed to one image.
pub async fn cmd_ps(project_dir: &Path, image: Option<&str>) -> Result<()> {
    let runtime = super::docker_runtime(project_dir).await?;
    let containers = match image {
        Some(key) => runtime.find_by_image(key).await?,
        None => {
            runtime
                .engine()
                .list_containers(&ContainerFilter::running())
                .await?
        }
    };

    if containers.is_empty() {
        println!("{}", style("No running containers.").dim());
        return Ok(());
    }
    for line in format_rows(&containers) {
        println!("{}", line);
    }
    Ok(())
}

fn format_rows(containers: &[ContainerSummary]) -> Vec<String> {
    let mut rows = vec![format!("{:<14} {:<28} {:<24} {}", "ID", "NAME", "IMAGE", "PORTS")];
    for c in containers {
        let id: String = c.id.chars().take(12).collect();
        let ports = c
            .host_ports
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        rows.push(format!("{:<14} {:<28} {:<24} {}", id, c.name, c.image, ports));
    }
    rows
}
