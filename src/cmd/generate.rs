//! `protobuilder generate`: idea in, project on disk (and optionally running).

use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use protobuilder::config::AppConfig;
use protobuilder::llm::openai::OpenAiClient;
use protobuilder::pipeline::{Prototype, PrototypePipeline, deploy};
use protobuilder_runtime::RunOptions;

const EXIT_WORDS: [&str; 2] = ["exit", "quit"];

pub async fn cmd_generate(
    project_dir: &Path,
    idea: Option<&str>,
    out: Option<&Path>,
    run: bool,
    image: Option<&str>,
) -> Result<()> {
    let config = AppConfig::resolve(project_dir)?;
    let client = OpenAiClient::from_config(&config.llm)?;
    let output_dir = match out {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => project_dir.join(dir),
        None => config.output_dir(project_dir),
    };
    let session = Session {
        project_dir,
        client: &client,
        output_dir: &output_dir,
        run,
        image,
    };

    if let Some(idea) = idea {
        return session.build(idea).await;
    }

    println!("Describe the app you want. Type 'exit' to quit.");
    loop {
        let input: String = Input::new()
            .with_prompt("Idea")
            .allow_empty(false)
            .interact_text()
            .context("Failed to read user input")?;
        if is_exit(&input) {
            println!("Goodbye.");
            return Ok(());
        }
        if let Err(e) = session.build(input.trim()).await {
            println!("{} {:#}", style("Error:").red().bold(), e);
            println!("Try another idea, or type 'exit' to quit.");
        }
    }
}

fn is_exit(input: &str) -> bool {
    EXIT_WORDS.contains(&input.trim().to_lowercase().as_str())
}

struct Session<'a> {
    project_dir: &'a Path,
    client: &'a OpenAiClient,
    output_dir: &'a Path,
    run: bool,
    image: Option<&'a str>,
}

impl Session<'_> {
    /// Generate one prototype and, with `--run`, deploy it.
    async fn build(&self, idea: &str) -> Result<()> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .expect("progress bar template is a valid static string"),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        let progress = |message: &str| spinner.set_message(message.to_string());

        let generated = PrototypePipeline::new(self.client, self.output_dir)
            .with_progress(&progress)
            .generate(idea)
            .await;
        spinner.finish_and_clear();
        let prototype = generated?;
        print_prototype(&prototype);

        if self.run {
            run_prototype(self.project_dir, &prototype, self.image).await?;
        }
        Ok(())
    }
}

fn print_prototype(prototype: &Prototype) {
    println!("{}", style("Prototype ready").green().bold());
    println!("  {}", prototype.summary.trim());
    println!();
    for task in &prototype.plan.tasks {
        println!("  {} {}", style("•").cyan(), task.name);
    }
    println!();
    super::project::print_report(&prototype.report);
    let commands = prototype.output.commands();
    if !commands.is_empty() {
        println!("{}", style("Run steps:").dim());
        for command in commands {
            println!("  {}", command);
        }
    }
}

async fn run_prototype(project_dir: &Path, prototype: &Prototype, image: Option<&str>) -> Result<()> {
    let runtime = super::docker_runtime(project_dir).await?;
    let options = RunOptions {
        image: image.map(str::to_string),
        ..Default::default()
    };

    let deployed = tokio::select! {
        result = deploy(prototype, &runtime, options) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\n{}", style("Interrupted, removing containers...").yellow());
            let report = runtime.stop_all().await;
            for (id, error) in &report.failed {
                warn!(container = %id, %error, "container was not removed");
            }
            bail!("Interrupted");
        }
    };

    let (handle, result) = deployed?;
    super::run::print_result(&result);
    println!(
        "Container {} is still running. Remove it with `protobuilder cleanup`.",
        style(&handle.name).cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_words_end_the_session() {
        assert!(is_exit("exit"));
        assert!(is_exit("  QUIT \n"));
        assert!(!is_exit("an exit survey app"));
        assert!(!is_exit(""));
    }
}
