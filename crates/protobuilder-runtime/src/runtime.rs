//! `ContainerRuntime`: run, stage, execute, observe and clean up containers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use protobuilder_common::{
    ContainerEngine, ContainerFilter, ContainerHandle, ContainerSpec, ContainerSummary,
    ExecutionRequest, ExecutionResult, ExecutionStatus, PortMapping, VolumeBind,
};
use tracing::{error, info, warn};

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::logs::LogFetcher;
use crate::readiness::{Readiness, ReadinessPoller};
use crate::registry::{ContainerRegistry, StopReport, stop_and_remove};
use crate::runner::CommandRunner;
use crate::stager::CodeStager;

/// Options for [`ContainerRuntime::run_container`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Catalog key or image reference; `None` uses the catalog default.
    pub image: Option<String>,
    pub tag: Option<String>,
    pub name: Option<String>,
    pub workdir: Option<String>,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<VolumeBind>,
    pub labels: HashMap<String, String>,
    pub env: HashMap<String, String>,
    /// Skip the configured bootstrap commands.
    pub skip_bootstrap: bool,
}

impl RunOptions {
    pub fn image(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            ..Default::default()
        }
    }
}

pub struct ContainerRuntime<E: ContainerEngine> {
    engine: Arc<E>,
    config: RuntimeConfig,
    registry: ContainerRegistry,
    runner: CommandRunner,
    poller: ReadinessPoller,
    logs: LogFetcher,
}

impl<E: ContainerEngine> ContainerRuntime<E> {
    pub fn new(engine: Arc<E>, config: RuntimeConfig) -> Self {
        let runner = CommandRunner::new(config.log_dir.clone());
        let poller = ReadinessPoller::from_config(&config.probe);
        let logs = LogFetcher::new(config.log_dir.clone());
        Self {
            engine,
            config,
            registry: ContainerRegistry::new(),
            runner,
            poller,
            logs,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ContainerRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Request for `commands` in the container's own workdir, where code is
    /// staged and the run log is read from, with the configured dispatch
    /// timeout.
    pub fn request_for(&self, handle: &ContainerHandle, commands: Vec<String>) -> ExecutionRequest {
        ExecutionRequest::new(commands, handle.workdir.clone())
            .with_timeout(self.config.dispatch_timeout)
    }

    fn build_spec(&self, options: &RunOptions) -> ContainerSpec {
        let image = match options.image.as_deref() {
            Some(key) => self.config.images.resolve(key, options.tag.as_deref()),
            None => self.config.images.default_image(),
        };
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| ContainerSpec::generated_name("protobuilder"));

        let mut spec = ContainerSpec::new(name, image);
        spec.command = self.config.keep_alive_command.clone();
        spec.workdir = options
            .workdir
            .clone()
            .unwrap_or_else(|| self.config.workdir.clone());
        spec.labels
            .insert(self.config.cleanup_label.clone(), "protobuilder".to_string());
        spec.labels.extend(options.labels.clone());
        spec.env = options.env.clone();
        spec.ports = options.ports.clone();
        spec.volumes = options.volumes.clone();
        spec
    }

    /// Pull (if needed), create and start a container, then run the
    /// bootstrap commands. The container is tracked as soon as it starts, so
    /// a failed bootstrap still leaves it reachable by `stop_all`.
    pub async fn run_container(&self, options: RunOptions) -> Result<ContainerHandle, RuntimeError> {
        let spec = self.build_spec(&options);

        if let Err(e) = self.engine.ensure_image(&spec.image).await {
            error!(image = %spec.image, error = %e, "failed to pull image");
            return Err(e.into());
        }
        let id = match self.engine.create_and_start(&spec).await {
            Ok(id) => id,
            Err(e) => {
                error!(container = %spec.name, image = %spec.image, error = %e, "failed to run container");
                return Err(e.into());
            }
        };

        let handle = ContainerHandle::new(id, &spec.name, &spec.image, &spec.workdir);
        self.registry.track(handle.clone());
        info!(container = %handle.name, id = %handle.short_id(), image = %handle.image, "container started");

        if !options.skip_bootstrap {
            self.bootstrap(&handle).await?;
        }
        Ok(handle)
    }

    async fn bootstrap(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        for command in &self.config.bootstrap {
            info!(container = %handle.name, command = %command, "bootstrapping");
            let output = self
                .engine
                .exec(
                    &handle.id,
                    vec!["sh".into(), "-c".into(), command.clone()],
                    None,
                )
                .await?;
            if !output.is_success() {
                let message = format!("exit code {}: {}", output.exit_code, output.error_text());
                error!(container = %handle.name, command = %command, %message, "bootstrap failed");
                return Err(RuntimeError::Bootstrap {
                    container: handle.name.clone(),
                    command: command.clone(),
                    message,
                });
            }
        }
        Ok(())
    }

    pub async fn stage(
        &self,
        handle: &ContainerHandle,
        src: &Path,
        dest: &str,
    ) -> Result<(), RuntimeError> {
        CodeStager::stage(self.engine.as_ref(), handle, src, dest).await
    }

    /// Dispatch without waiting for the commands to finish.
    pub async fn dispatch(
        &self,
        handle: &ContainerHandle,
        request: &ExecutionRequest,
    ) -> Result<String, RuntimeError> {
        self.runner.dispatch(self.engine.as_ref(), handle, request).await
    }

    pub async fn wait_ready(&self, handle: &ContainerHandle) -> Readiness {
        self.poller.wait(self.engine.as_ref(), handle).await
    }

    pub async fn fetch_log(
        &self,
        handle: &ContainerHandle,
        lines: usize,
    ) -> Result<String, RuntimeError> {
        self.logs.fetch(self.engine.as_ref(), handle, lines).await
    }

    /// Dispatch, wait for readiness and collect the run log.
    ///
    /// Only an empty request or a daemon failure while dispatching is an
    /// `Err`; everything observed afterwards is folded into the result.
    pub async fn execute(
        &self,
        handle: &ContainerHandle,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, RuntimeError> {
        let dispatched =
            tokio::time::timeout(request.timeout, self.dispatch(handle, request)).await;
        match dispatched {
            Ok(result) => {
                result?;
            }
            Err(_) => {
                warn!(container = %handle.name, timeout = ?request.timeout, "dispatch timed out");
                return Ok(ExecutionResult {
                    status: ExecutionStatus::Timeout,
                    log: format!("Dispatch timed out after {}s", request.timeout.as_secs()),
                });
            }
        }

        let readiness = self.wait_ready(handle).await;
        let status = if readiness.is_ready() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failure
        };
        info!(container = %handle.name, %status, attempts = readiness.attempts(), "execution finished");

        let mut log = match self.fetch_log(handle, self.config.log_lines).await {
            Ok(log) => log,
            Err(e) => e.to_string(),
        };
        if let Readiness::Exited { exit_code, .. } = readiness {
            let code = exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
            log.push_str(&format!("\n[container exited with code {}]", code));
        }
        Ok(ExecutionResult { status, log })
    }

    /// Stop, force-remove and untrack one container.
    pub async fn stop_container(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        stop_and_remove(self.engine.as_ref(), &handle.id, &handle.name)
            .await
            .map_err(|message| {
                RuntimeError::Engine(protobuilder_common::EngineError::Daemon {
                    operation: "remove container",
                    message,
                })
            })?;
        self.registry.untrack(&handle.id);
        Ok(())
    }

    pub async fn stop_all(&self) -> StopReport {
        self.registry.stop_all(self.engine.as_ref()).await
    }

    /// Running containers whose image matches the catalog entry for `key`
    /// (or `key` itself when it is not a catalog key).
    pub async fn find_by_image(&self, key: &str) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let target = self.config.images.resolve(key, None);
        let containers = self
            .engine
            .list_containers(&ContainerFilter::running())
            .await?;
        Ok(containers
            .into_iter()
            .filter(|c| c.image.contains(&target))
            .collect())
    }

    /// Remove every container (running or not) that carries `label` or
    /// publishes `host_port`, including ones left behind by earlier
    /// processes.
    pub async fn cleanup_stale(
        &self,
        label: &str,
        host_port: Option<u16>,
    ) -> Result<StopReport, RuntimeError> {
        let containers = self
            .engine
            .list_containers(&ContainerFilter::everything())
            .await?;

        let mut report = StopReport::default();
        for container in containers {
            let matches_port = host_port.is_some_and(|p| container.binds_host_port(p));
            if !container.has_label(label) && !matches_port {
                continue;
            }
            info!(container = %container.name, id = %container.id, "cleaning container");
            match stop_and_remove(self.engine.as_ref(), &container.id, &container.name).await {
                Ok(()) => {
                    self.registry.untrack(&container.id);
                    report.removed.push(container.id);
                }
                Err(e) => report.failed.push((container.id, e)),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeEngine;
    use protobuilder_common::container::RUNTIME_LABEL;
    use std::time::Duration;

    fn runtime(engine: Arc<FakeEngine>) -> ContainerRuntime<FakeEngine> {
        let mut config = RuntimeConfig::default();
        config.probe.retries = 3;
        config.probe.delay = Duration::from_secs(1);
        ContainerRuntime::new(engine, config)
    }

    #[tokio::test]
    async fn run_container_resolves_image_and_tracks_handle() {
        let engine = Arc::new(FakeEngine::new());
        let rt = runtime(engine.clone());

        let handle = rt
            .run_container(RunOptions {
                image: Some("python".into()),
                name: Some("api".into()),
                ports: vec![PortMapping { host: 5000, container: 5000 }],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(handle.image, "python:3.9-slim");
        assert_eq!(handle.name, "api");
        assert_eq!(handle.workdir, "/workspace");
        assert!(rt.registry().contains(&handle.id));

        let state = engine.state();
        assert_eq!(state.pulled, vec!["python:3.9-slim"]);
        let spec = &state.created[0];
        assert_eq!(spec.command, vec!["tail", "-f", "/dev/null"]);
        assert_eq!(spec.labels.get(RUNTIME_LABEL).map(String::as_str), Some("protobuilder"));
        assert_eq!(spec.ports.len(), 1);
        // apt-get update + install procps
        assert_eq!(state.execs.len(), 2);
        assert!(state.execs[1].1[2].contains("procps"));
    }

    #[tokio::test]
    async fn run_container_defaults_to_catalog_default() {
        let engine = Arc::new(FakeEngine::new());
        let rt = runtime(engine.clone());

        let handle = rt
            .run_container(RunOptions {
                skip_bootstrap: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(handle.image, "node:14-slim");
        assert!(handle.name.starts_with("protobuilder-"));
        assert!(engine.state().execs.is_empty());
    }

    #[tokio::test]
    async fn failed_pull_aborts_before_create() {
        let engine = Arc::new(FakeEngine::new());
        engine.state().fail_pull = true;
        let rt = runtime(engine.clone());

        let err = rt.run_container(RunOptions::image("node")).await.unwrap_err();

        assert!(matches!(err, RuntimeError::Engine(_)));
        assert!(engine.state().created.is_empty());
        assert!(rt.registry().is_empty());
    }

    #[tokio::test]
    async fn failed_bootstrap_keeps_container_tracked() {
        let engine = Arc::new(FakeEngine::new());
        engine
            .state()
            .exec_exit
            .insert("apt-get install".into(), 100);
        let rt = runtime(engine.clone());

        let err = rt.run_container(RunOptions::image("node")).await.unwrap_err();

        match &err {
            RuntimeError::Bootstrap { command, message, .. } => {
                assert_eq!(command, "apt-get install -y procps");
                assert!(message.contains("100"));
            }
            other => panic!("expected Bootstrap, got {:?}", other),
        }
        assert_eq!(rt.registry().len(), 1);
        let report = rt.stop_all().await;
        assert_eq!(report.removed.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn execute_reports_success_with_log_tail() {
        let engine = Arc::new(FakeEngine::new());
        {
            let mut state = engine.state();
            state.probe_results.extend([7, 0]);
            state
                .files
                .insert("/workspace/logs/run.log".into(), "compiled\nlistening on 8080\n".into());
        }
        let rt = runtime(engine.clone());
        let handle = ContainerHandle::new("c9", "web", "node:14-slim", "/workspace");

        let result = rt
            .execute(&handle, &rt.request_for(&handle, vec!["npm run serve".into()]))
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.log, "compiled\nlistening on 8080\n");
        assert_eq!(engine.state().detached.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn execute_reports_failure_when_never_ready() {
        let engine = Arc::new(FakeEngine::new());
        engine.state().probe_default = 7;
        let rt = runtime(engine.clone());
        let handle = ContainerHandle::new("c9", "web", "node:14-slim", "/workspace");

        let result = rt
            .execute(&handle, &rt.request_for(&handle, vec!["npm run serve".into()]))
            .await
            .unwrap();

        assert_eq!(result.status, ExecutionStatus::Failure);
        assert!(result.log.starts_with("Error retrieving logs:"));
        assert_eq!(engine.state().probe_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn execute_times_out_slow_dispatch() {
        let engine = Arc::new(FakeEngine::new());
        engine.state().detached_delay = Some(Duration::from_secs(60));
        let rt = runtime(engine.clone());
        let handle = ContainerHandle::new("c9", "web", "node:14-slim", "/workspace");
        let request = rt
            .request_for(&handle, vec!["./run.sh".into()])
            .with_timeout(Duration::from_secs(5));

        let result = rt.execute(&handle, &request).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Timeout);
        assert_eq!(engine.state().probe_count, 0);
    }

    #[test]
    fn request_follows_handle_workdir() {
        let rt = runtime(Arc::new(FakeEngine::new()));
        let handle = ContainerHandle::new("c9", "web", "node:14-slim", "/app");

        let request = rt.request_for(&handle, vec!["npm start".into()]);

        assert_eq!(request.workdir, "/app");
        assert_eq!(request.timeout, rt.config().dispatch_timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_workdir_runs_and_logs_where_code_is_staged() {
        let engine = Arc::new(FakeEngine::new());
        {
            let mut state = engine.state();
            state.probe_results.push_back(0);
            state
                .files
                .insert("/app/logs/run.log".into(), "listening\n".into());
        }
        let rt = runtime(engine.clone());
        let handle = rt
            .run_container(RunOptions {
                workdir: Some("/app".into()),
                skip_bootstrap: true,
                ..Default::default()
            })
            .await
            .unwrap();

        let result = rt
            .execute(&handle, &rt.request_for(&handle, vec!["npm start".into()]))
            .await
            .unwrap();

        assert_eq!(handle.workdir, "/app");
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.log, "listening\n");
        let state = engine.state();
        assert!(state.detached[0].1.last().unwrap().starts_with("cd /app && "));
    }

    #[tokio::test]
    async fn execute_rejects_empty_commands() {
        let engine = Arc::new(FakeEngine::new());
        let rt = runtime(engine);
        let handle = ContainerHandle::new("c9", "web", "node:14-slim", "/workspace");

        let err = rt.execute(&handle, &rt.request_for(&handle, vec![])).await.unwrap_err();
        assert!(matches!(err, RuntimeError::EmptyCommand));
    }

    #[tokio::test]
    async fn stop_container_untracks() {
        let engine = Arc::new(FakeEngine::new());
        let rt = runtime(engine.clone());
        let handle = rt
            .run_container(RunOptions {
                skip_bootstrap: true,
                ..Default::default()
            })
            .await
            .unwrap();

        rt.stop_container(&handle).await.unwrap();

        assert!(rt.registry().is_empty());
        assert_eq!(engine.state().removed, vec![handle.id.clone()]);
    }

    #[tokio::test]
    async fn find_by_image_matches_resolved_catalog_image() {
        let engine = Arc::new(FakeEngine::new());
        engine.state().listing = vec![
            ContainerSummary {
                id: "1".into(),
                name: "a".into(),
                image: "node:14-slim".into(),
                state: "running".into(),
                ..Default::default()
            },
            ContainerSummary {
                id: "2".into(),
                name: "b".into(),
                image: "python:3.9-slim".into(),
                state: "running".into(),
                ..Default::default()
            },
        ];
        let rt = runtime(engine);

        let found = rt.find_by_image("node").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "1");
        assert!(rt.find_by_image("java").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleanup_removes_labelled_and_port_bound_containers() {
        let engine = Arc::new(FakeEngine::new());
        let mut labelled = ContainerSummary {
            id: "l".into(),
            name: "labelled".into(),
            ..Default::default()
        };
        labelled.labels.insert(RUNTIME_LABEL.into(), "proto-builder".into());
        let port_bound = ContainerSummary {
            id: "p".into(),
            name: "port".into(),
            host_ports: vec![5000],
            ..Default::default()
        };
        let unrelated = ContainerSummary {
            id: "u".into(),
            name: "unrelated".into(),
            host_ports: vec![8080],
            ..Default::default()
        };
        {
            let mut state = engine.state();
            state.listing = vec![labelled, port_bound, unrelated];
            state.fail_remove.insert("p".into());
        }
        let rt = runtime(engine.clone());

        let report = rt.cleanup_stale(RUNTIME_LABEL, Some(5000)).await.unwrap();

        assert_eq!(report.removed, vec!["l"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "p");
        assert!(!engine.state().stopped.contains(&"u".to_string()));
    }
}
