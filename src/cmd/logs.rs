use anyhow::Result;
use protobuilder_common::ContainerHandle;
use std::path::Path;

/// `protobuilder logs`: print the tail of a container's run log.
pub async fn cmd_logs(
    project_dir: &Path,
    container: &str,
    lines: Option<usize>,
    workdir: Option<&str>,
) -> Result<()> {
    let runtime = super::docker_runtime(project_dir).await?;
    let workdir = workdir.unwrap_or(&runtime.config().workdir).to_string();
    let handle = ContainerHandle::adopt(container, workdir);
    let lines = lines.unwrap_or(runtime.config().log_lines);

    let log = runtime.fetch_log(&handle, lines).await?;
    print!("{}", log);
    Ok(())
}
