//! Idea-to-prototype pipeline: clarify, plan, develop, materialize, deploy.

use std::path::{Path, PathBuf};

use protobuilder_common::{CommandChain, ContainerEngine, ContainerHandle, ExecutionResult};
use protobuilder_runtime::{ContainerRuntime, RunOptions, RuntimeError};
use tracing::{error, info, warn};

use crate::agents::AgentTeam;
use crate::errors::PipelineError;
use crate::llm::ChatModel;
use crate::output::{DeveloperOutput, Plan};
use crate::project::{MaterializeReport, materialize};
use crate::util::slugify;

/// A generated project on disk.
#[derive(Debug, Clone)]
pub struct Prototype {
    pub root: PathBuf,
    pub summary: String,
    pub plan: Plan,
    pub output: DeveloperOutput,
    pub report: MaterializeReport,
}

/// Pipeline stage names, used for errors and progress.
pub mod stage {
    pub const CHATBOT: &str = "chatbot";
    pub const PLANNER: &str = "planner";
    pub const DEVELOPER: &str = "developer";
}

pub struct PrototypePipeline<'a> {
    team: AgentTeam<'a>,
    output_dir: PathBuf,
    progress: Option<&'a (dyn Fn(&str) + Sync)>,
}

impl<'a> PrototypePipeline<'a> {
    pub fn new(model: &'a dyn ChatModel, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            team: AgentTeam::new(model),
            output_dir: output_dir.into(),
            progress: None,
        }
    }

    /// Called with a short status line before each step.
    pub fn with_progress(mut self, progress: &'a (dyn Fn(&str) + Sync)) -> Self {
        self.progress = Some(progress);
        self
    }

    fn report(&self, message: &str) {
        if let Some(progress) = self.progress {
            progress(message);
        }
    }

    /// Turn `idea` into a project under the output directory.
    ///
    /// Every developer response is parsed before anything is written, so a
    /// malformed response leaves no partial project behind.
    pub async fn generate(&self, idea: &str) -> Result<Prototype, PipelineError> {
        self.report("Analyzing your idea...");
        let summary = self
            .team
            .clarify(idea)
            .await
            .map_err(|source| PipelineError::Llm {
                stage: stage::CHATBOT,
                source,
            })?;

        self.report("Breaking down tasks...");
        let raw_plan = self
            .team
            .plan(&summary)
            .await
            .map_err(|source| PipelineError::Llm {
                stage: stage::PLANNER,
                source,
            })?;
        let plan = match Plan::parse(&raw_plan) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "planner output is not a task list, using it as a single task");
                Plan::single_task(&raw_plan)
            }
        };
        info!(tasks = plan.tasks.len(), "plan ready");

        let plan_summary = if plan.summary.is_empty() {
            summary.as_str()
        } else {
            plan.summary.as_str()
        };

        let mut merged = DeveloperOutput::default();
        for task in &plan.tasks {
            self.report(&format!("Working on {}...", task.name));
            let response = self
                .team
                .develop(plan_summary, task)
                .await
                .map_err(|source| PipelineError::Llm {
                    stage: stage::DEVELOPER,
                    source,
                })?;
            let output = DeveloperOutput::parse(&response).map_err(|e| {
                error!(task = %task.name, error = %e, "developer output rejected");
                PipelineError::MalformedOutput {
                    task: task.name.clone(),
                    message: e.to_string(),
                }
            })?;
            info!(task = %task.name, files = output.files.len(), "task developed");
            merged.merge(output);
        }

        let root = self.project_root(plan_summary);
        self.report("Writing project files...");
        let report = materialize(&merged, &root)?;

        Ok(Prototype {
            root,
            summary,
            plan,
            output: merged,
            report,
        })
    }

    fn project_root(&self, summary: &str) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        self.output_dir
            .join(format!("{}-{}", slugify(summary, 32), stamp))
    }
}

/// Run `prototype` in a fresh container and report how it went.
///
/// On success the container is left running (and tracked by `runtime`) so
/// the caller decides when to stop it.
pub async fn deploy<E: ContainerEngine>(
    prototype: &Prototype,
    runtime: &ContainerRuntime<E>,
    options: RunOptions,
) -> Result<(ContainerHandle, ExecutionResult), PipelineError> {
    let commands = prototype.output.commands();
    if commands.is_empty() {
        return Err(PipelineError::NoRunSteps);
    }

    let deployed = run_source(
        &prototype.root,
        commands,
        CommandChain::StopOnFailure,
        runtime,
        options,
    )
    .await?;
    info!(container = %deployed.0.name, status = %deployed.1.status, "prototype deployed");
    Ok(deployed)
}

/// Start a container, stage `root` into its workdir and execute `commands`
/// there.
///
/// If any step fails, every container tracked by `runtime` is stopped and
/// removed before the error is returned, including one whose bootstrap
/// failed.
pub async fn run_source<E: ContainerEngine>(
    root: &Path,
    commands: Vec<String>,
    chain: CommandChain,
    runtime: &ContainerRuntime<E>,
    options: RunOptions,
) -> Result<(ContainerHandle, ExecutionResult), RuntimeError> {
    let outcome = start_and_execute(root, commands, chain, runtime, options).await;
    if let Err(e) = &outcome {
        error!(error = %e, "run failed, removing containers");
        let report = runtime.stop_all().await;
        for (id, failure) in &report.failed {
            warn!(container = %id, error = %failure, "container was not removed");
        }
    }
    outcome
}

async fn start_and_execute<E: ContainerEngine>(
    root: &Path,
    commands: Vec<String>,
    chain: CommandChain,
    runtime: &ContainerRuntime<E>,
    options: RunOptions,
) -> Result<(ContainerHandle, ExecutionResult), RuntimeError> {
    let handle = runtime.run_container(options).await?;
    runtime.stage(&handle, root, &handle.workdir).await?;
    let request = runtime.request_for(&handle, commands).with_chain(chain);
    let result = runtime.execute(&handle, &request).await?;
    Ok((handle, result))
}
