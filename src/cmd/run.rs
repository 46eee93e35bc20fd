//! `protobuilder run`: stage a source tree into a fresh container and run it.

use anyhow::{Context, Result, bail};
use console::style;
use protobuilder::pipeline::run_source;
use protobuilder_common::{CommandChain, ExecutionResult, ExecutionStatus, PortMapping};
use protobuilder_runtime::RunOptions;
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct RunArgs {
    pub source: PathBuf,
    pub commands: Vec<String>,
    pub image: Option<String>,
    pub tag: Option<String>,
    pub workdir: Option<String>,
    pub name: Option<String>,
    pub ports: Vec<PortMapping>,
    pub keep_going: bool,
    pub keep: bool,
    pub no_bootstrap: bool,
}

impl RunArgs {
    fn options(&self) -> RunOptions {
        RunOptions {
            image: self.image.clone(),
            tag: self.tag.clone(),
            name: self.name.clone(),
            workdir: self.workdir.clone(),
            ports: self.ports.clone(),
            skip_bootstrap: self.no_bootstrap,
            ..Default::default()
        }
    }

    fn chain(&self) -> CommandChain {
        if self.keep_going {
            CommandChain::Sequential
        } else {
            CommandChain::StopOnFailure
        }
    }
}

pub async fn cmd_run(project_dir: &Path, args: RunArgs) -> Result<()> {
    if !args.source.is_dir() {
        bail!("Source directory not found: {}", args.source.display());
    }

    let runtime = super::docker_runtime(project_dir).await?;
    println!("Starting container and running {} command(s)...", args.commands.len());

    let outcome = tokio::select! {
        result = run_source(
            &args.source,
            args.commands.clone(),
            args.chain(),
            &runtime,
            args.options(),
        ) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\n{}", style("Interrupted, removing containers...").yellow());
            let report = runtime.stop_all().await;
            for (id, error) in &report.failed {
                warn!(container = %id, %error, "container was not removed");
            }
            bail!("Interrupted");
        }
    };
    let (handle, result) = outcome.context("Run failed")?;

    if args.keep {
        println!(
            "Container {} left running. Remove it with `protobuilder cleanup`.",
            style(&handle.name).cyan()
        );
    } else if let Err(e) = runtime.stop_container(&handle).await {
        warn!(container = %handle.name, error = %e, "failed to remove container");
    }

    print_result(&result);
    if !result.is_success() {
        bail!("Run finished with status {}", result.status);
    }
    Ok(())
}

pub(crate) fn print_result(result: &ExecutionResult) {
    let status = match result.status {
        ExecutionStatus::Success => style("success").green().bold(),
        ExecutionStatus::Failure => style("failure").red().bold(),
        ExecutionStatus::Timeout => style("timeout").yellow().bold(),
    };
    println!();
    println!("Status: {}", status);
    if !result.log.trim().is_empty() {
        println!("{}", style("Log:").dim());
        println!("{}", result.log.trim_end());
    }
}
